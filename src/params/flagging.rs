// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The two flagging rounds: round 1 on raw data before any calibration,
//! round 2 on corrected data after the parallel-hand solutions are applied.

use std::path::PathBuf;

use itertools::Itertools;
use log::info;

use super::StageError;
use crate::bookkeeping::FieldRoles;
use crate::casa::{CasaTasks, TaskCall};
use crate::config::{ConfigDelta, ConfigStore, Value};

/// Amplitude clip window for the pre-calibration clip [Jy].
const CLIP_MINMAX: [f64; 2] = [0.0, 50.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlagRound {
    One,
    Two,
}

impl FlagRound {
    pub(crate) fn number(self) -> u8 {
        match self {
            FlagRound::One => 1,
            FlagRound::Two => 2,
        }
    }
}

pub(crate) struct FlagParams {
    pub(crate) vis: PathBuf,
    pub(crate) round: FlagRound,

    /// Every field the pipeline touches, comma-joined.
    pub(crate) all_fields: String,

    /// The calibrator fields, comma-joined.
    pub(crate) cal_fields: String,

    /// The target fields, comma-joined.
    pub(crate) target_fields: String,

    /// Known-bad frequency ranges, e.g. `944~947MHz`.
    pub(crate) bad_freq_ranges: Vec<String>,

    /// Known-bad antennas by name.
    pub(crate) bad_ants: Vec<String>,
}

impl FlagParams {
    pub(crate) fn from_store(store: &ConfigStore, round: FlagRound) -> Result<Self, StageError> {
        let roles = FieldRoles::from_config(store)?;
        Ok(FlagParams {
            vis: super::vis_from_store(store)?,
            round,
            all_fields: roles.all_fields(),
            cal_fields: roles.cal_fields(),
            target_fields: roles.target_fields(),
            bad_freq_ranges: store.get_str_list_or_empty("crosscal", "badfreqranges")?,
            bad_ants: store.get_str_list_or_empty("crosscal", "badants")?,
        })
    }

    pub(crate) fn run(&self, casa: &dyn CasaTasks) -> Result<Vec<ConfigDelta>, StageError> {
        info!(
            "Flagging round {} on '{}'",
            self.round.number(),
            self.vis.display()
        );
        match self.round {
            FlagRound::One => self.run_round_1(casa)?,
            FlagRound::Two => self.run_round_2(casa)?,
        }
        Ok(vec![])
    }

    /// Pre-calibration flags on the raw DATA column.
    fn run_round_1(&self, casa: &dyn CasaTasks) -> Result<(), StageError> {
        if !self.bad_freq_ranges.is_empty() {
            let spw = format!(
                "*:{}",
                self.bad_freq_ranges.iter().join(",*:")
            );
            casa.run_task(
                &TaskCall::new("flagdata")
                    .arg("vis", &self.vis)
                    .arg("mode", "manual")
                    .arg("spw", spw),
            )?;
        }

        if !self.bad_ants.is_empty() {
            casa.run_task(
                &TaskCall::new("flagdata")
                    .arg("vis", &self.vis)
                    .arg("mode", "manual")
                    .arg("antenna", self.bad_ants.iter().join(",")),
            )?;
        }

        casa.run_task(
            &TaskCall::new("flagdata")
                .arg("vis", &self.vis)
                .arg("mode", "manual")
                .arg("autocorr", true)
                .arg("action", "apply")
                .arg("flagbackup", true)
                .arg("savepars", false)
                .arg("writeflags", true),
        )?;

        // Manually clip everything the pipeline will touch.
        casa.run_task(
            &TaskCall::new("flagdata")
                .arg("vis", &self.vis)
                .arg("mode", "clip")
                .arg("field", self.all_fields.as_str())
                .arg(
                    "clipminmax",
                    Value::List(CLIP_MINMAX.iter().map(|&x| Value::Float(x)).collect()),
                )
                .arg("datacolumn", "DATA")
                .arg("clipoutside", true)
                .arg("clipzeros", true)
                .arg("extendpols", true)
                .arg("action", "apply")
                .arg("flagbackup", true)
                .arg("savepars", false)
                .arg("overwrite", true)
                .arg("writeflags", true),
        )?;

        // tfcrop the calibrators and the targets with different fits: the
        // calibrators are bright and flat enough for a line.
        casa.run_task(&self.tfcrop(&self.cal_fields, "line", 5.0, "DATA"))?;
        casa.run_task(&self.tfcrop(&self.target_fields, "poly", 6.0, "DATA"))?;

        // Conservatively extend whatever the above found.
        casa.run_task(&self.extend(&self.all_fields))?;

        casa.run_task(&self.summary(""))?;
        Ok(())
    }

    /// Post-calibration flags on the CORRECTED column, where RFI stands out
    /// against the calibrated bandpass.
    fn run_round_2(&self, casa: &dyn CasaTasks) -> Result<(), StageError> {
        casa.run_task(&self.tfcrop(&self.cal_fields, "line", 5.0, "corrected"))?;
        casa.run_task(&self.tfcrop(&self.target_fields, "poly", 6.0, "corrected"))?;

        casa.run_task(
            &TaskCall::new("flagdata")
                .arg("vis", &self.vis)
                .arg("mode", "rflag")
                .arg("field", self.all_fields.as_str())
                .arg("datacolumn", "corrected")
                .arg("timedevscale", 5.0)
                .arg("freqdevscale", 5.0)
                .arg("action", "apply")
                .arg("flagbackup", true)
                .arg("writeflags", true),
        )?;

        casa.run_task(&self.extend(&self.all_fields))?;
        casa.run_task(&self.summary(".round2"))?;
        Ok(())
    }

    fn tfcrop(&self, fields: &str, fit: &'static str, cutoff: f64, column: &'static str) -> TaskCall {
        TaskCall::new("flagdata")
            .arg("vis", &self.vis)
            .arg("mode", "tfcrop")
            .arg("field", fields)
            .arg("ntime", "scan")
            .arg("timecutoff", cutoff)
            .arg("freqcutoff", cutoff)
            .arg("timefit", fit)
            .arg("freqfit", fit)
            .arg("extendflags", false)
            .arg("timedevscale", 5.0)
            .arg("freqdevscale", 5.0)
            .arg("extendpols", true)
            .arg("growaround", false)
            .arg("action", "apply")
            .arg("flagbackup", true)
            .arg("overwrite", true)
            .arg("writeflags", true)
            .arg("datacolumn", column)
    }

    fn extend(&self, fields: &str) -> TaskCall {
        TaskCall::new("flagdata")
            .arg("vis", &self.vis)
            .arg("mode", "extend")
            .arg("field", fields)
            .arg("datacolumn", "data")
            .arg("clipzeros", true)
            .arg("ntime", "scan")
            .arg("extendflags", false)
            .arg("extendpols", true)
            .arg("growtime", 80.0)
            .arg("growfreq", 80.0)
            .arg("growaround", false)
            .arg("flagneartime", false)
            .arg("flagnearfreq", false)
            .arg("action", "apply")
            .arg("flagbackup", true)
            .arg("overwrite", true)
            .arg("writeflags", true)
    }

    fn summary(&self, suffix: &str) -> TaskCall {
        TaskCall::new("flagdata")
            .arg("vis", &self.vis)
            .arg("mode", "summary")
            .arg("datacolumn", "DATA")
            .arg(
                "name",
                format!("{}.flag.summary{suffix}", self.vis.display()),
            )
    }
}
