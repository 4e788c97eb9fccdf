// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;
use itertools::Itertools;
use strum::IntoEnumIterator;

use super::common::{casa_from_store, display_warnings, InfoPrinter, StageArgs, Warn};
use super::CrosscalError;
use crate::pipeline::{run_pipeline, Stage};

#[derive(Debug, Parser)]
pub(super) struct RunArgs {
    #[clap(flatten)]
    stage: StageArgs,

    /// Resume the pipeline from this stage instead of the beginning, e.g.
    /// after fixing whatever made an earlier run fail.
    #[clap(long)]
    from: Option<String>,
}

impl RunArgs {
    pub(super) fn run(self, dry_run: bool) -> Result<(), CrosscalError> {
        let from = match &self.from {
            None => None,
            Some(name) => Some(name.parse::<Stage>().map_err(|_| {
                CrosscalError::Generic(format!(
                    "'{name}' is not a pipeline stage. Stages are: {}",
                    Stage::iter().join(", ")
                ))
            })?),
        };

        let mut store = self.stage.load()?;
        let dopol = store.get_bool_or("run", "dopol", false)?;
        if let Some(stage) = from {
            if stage.needs_pol() && !dopol {
                format!(
                    "The requested start stage {stage} is disabled because \
                     polarisation calibration is off; nothing before it will run"
                )
                .warn();
            }
        }

        let mut printer = InfoPrinter::new("Pipeline run".into());
        printer.push_line(format!("Config: {}", store.path().display()).into());
        printer.push_line(format!("Dataset: {}", store.get_str("data", "vis")?).into());
        printer.push_block(
            Stage::iter()
                .map(|s| {
                    let note = if s.needs_pol() && !dopol {
                        " (skipped: dopol is off)"
                    } else {
                        ""
                    };
                    format!("{s}{note}").into()
                })
                .collect(),
        );
        printer.display();
        display_warnings();
        if dry_run {
            return Ok(());
        }

        let casa = casa_from_store(&store)?;
        run_pipeline(&mut store, &casa, from)?;
        Ok(())
    }
}
