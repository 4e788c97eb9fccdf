// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Split the corrected data out into the final calibrated dataset.

use std::path::PathBuf;

use indexmap::IndexMap;
use log::info;

use super::StageError;
use crate::bookkeeping::{verify_table, BookkeepingError};
use crate::casa::{CasaTasks, TaskCall};
use crate::config::{ConfigDelta, ConfigStore, Value};

pub(crate) struct SplitParams {
    pub(crate) vis: PathBuf,
}

impl SplitParams {
    pub(crate) fn from_store(store: &ConfigStore) -> Result<Self, StageError> {
        Ok(SplitParams {
            vis: super::vis_from_store(store)?,
        })
    }

    pub(crate) fn output_vis(&self) -> Result<PathBuf, BookkeepingError> {
        let base = self
            .vis
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| BookkeepingError::BadDatasetPath(self.vis.clone()))?;
        Ok(super::sibling_path(
            &self.vis,
            &format!("{base}_calibrated.ms"),
        ))
    }

    pub(crate) fn run(&self, casa: &dyn CasaTasks) -> Result<Vec<ConfigDelta>, StageError> {
        let output_vis = self.output_vis()?;
        info!(
            "Splitting corrected data -> '{}'",
            output_vis.display()
        );
        casa.run_task(
            &TaskCall::new("split")
                .arg("vis", &self.vis)
                .arg("outputvis", &output_vis)
                .arg("datacolumn", "CORRECTED"),
        )?;
        verify_table(&output_vis)?;

        let mut run = IndexMap::new();
        run.insert("calibrated_vis".to_string(), Value::from(&output_vis));
        Ok(vec![ConfigDelta {
            section: "run",
            comment: Some("Internal variables for pipeline execution"),
            values: run,
        }])
    }
}
