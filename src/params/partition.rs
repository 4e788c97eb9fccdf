// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Partition the input dataset into the working dataset.

use std::path::PathBuf;

use indexmap::IndexMap;
use log::info;

use super::StageError;
use crate::bookkeeping::{verify_table, BookkeepingError};
use crate::casa::{CasaTasks, TaskCall};
use crate::config::{fmt_mhz, parse_spw, ConfigDelta, ConfigStore, Value};
use crate::ms::MsMeta;

pub(crate) struct PartitionParams {
    pub(crate) vis: PathBuf,
    pub(crate) spw: String,

    /// Goes into the working dataset's filename, e.g. `880~1680MHz`.
    pub(crate) spw_label: String,

    /// Channel-averaging factor; 1 means no averaging.
    pub(crate) chanbin: i64,

    /// Keep the cross-hand correlations? Only wanted when polarisation
    /// calibration is on.
    pub(crate) include_crosshand: bool,

    /// Write a multi-MS partitioned over scans instead of a plain MS.
    pub(crate) createmms: bool,

    pub(crate) num_scans: usize,
}

impl PartitionParams {
    pub(crate) fn from_store(store: &ConfigStore, ms: &MsMeta) -> Result<Self, StageError> {
        let vis = super::vis_from_store(store)?;
        let spw = store.get_str("crosscal", "spw")?.to_string();

        // A comma-joined multi-window selection gets a collective label
        // spanning the full range; a single window is its own label.
        let spw_label = if spw.contains(',') {
            let ranges = parse_spw(&spw)?;
            let lows: Vec<f64> = ranges.iter().filter_map(|r| r.low_mhz()).collect();
            let highs: Vec<f64> = ranges.iter().filter_map(|r| r.high_mhz()).collect();
            match (
                lows.iter().copied().reduce(f64::min),
                highs.iter().copied().reduce(f64::max),
            ) {
                (Some(low), Some(high)) => {
                    format!("{}~{}MHz", fmt_mhz(low.round()), fmt_mhz(high.round()))
                }
                _ => spw.replace("*:", "").replace(',', "_"),
            }
        } else {
            spw.trim_start_matches("*:").to_string()
        };

        Ok(PartitionParams {
            vis,
            spw,
            spw_label,
            chanbin: store.get_int_or("crosscal", "chanbin", 1)?,
            include_crosshand: store.get_bool_or("run", "dopol", false)?,
            createmms: store.get_bool_or("crosscal", "createmms", true)?,
            num_scans: ms.num_scans,
        })
    }

    /// The working dataset this partition produces, next to the input.
    pub(crate) fn output_vis(&self) -> Result<PathBuf, BookkeepingError> {
        let base = self
            .vis
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| BookkeepingError::BadDatasetPath(self.vis.clone()))?;
        let extension = if self.createmms { "mms" } else { "ms" };
        Ok(super::sibling_path(
            &self.vis,
            &format!("{base}.{}.{extension}", self.spw_label),
        ))
    }

    pub(crate) fn run(&self, casa: &dyn CasaTasks) -> Result<Vec<ConfigDelta>, StageError> {
        let output_vis = self.output_vis()?;
        // One sub-MS per scan, unless we're not making a multi-MS at all.
        let num_subms = if self.createmms {
            self.num_scans.max(1)
        } else {
            1
        };
        let correlation = if self.include_crosshand { "" } else { "XX,YY" };

        info!(
            "Partitioning '{}' -> '{}'",
            self.vis.display(),
            output_vis.display()
        );
        let call = TaskCall::new("mstransform")
            .arg("vis", &self.vis)
            .arg("outputvis", &output_vis)
            .arg("spw", self.spw.as_str())
            .arg("createmms", self.createmms)
            .arg("datacolumn", "DATA")
            .arg("chanaverage", self.chanbin > 1)
            .arg("chanbin", self.chanbin)
            .arg("numsubms", num_subms as i64)
            .arg("separationaxis", "scan")
            .arg("keepflags", true)
            .arg("usewtspectrum", true)
            .arg("antenna", "*&")
            .arg("correlation", correlation);
        casa.run_task(&call)?;
        verify_table(&output_vis)?;

        let mut data = IndexMap::new();
        data.insert("vis".to_string(), Value::from(&output_vis));
        let mut run = IndexMap::new();
        run.insert("orig_vis".to_string(), Value::from(&self.vis));
        Ok(vec![
            ConfigDelta {
                section: "data",
                comment: None,
                values: data,
            },
            ConfigDelta {
                section: "run",
                comment: Some("Internal variables for pipeline execution"),
                values: run,
            },
        ])
    }
}
