// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;

use super::common::{apply_deltas, casa_from_store, display_warnings, InfoPrinter, StageArgs};
use super::CrosscalError;
use crate::params::{FlagParams, FlagRound};

#[derive(Debug, Parser)]
pub(super) struct FlagArgs {
    #[clap(flatten)]
    stage: StageArgs,

    /// Which flagging round: 1 flags raw data before calibration, 2 flags
    /// corrected data after the parallel-hand solutions are applied.
    #[clap(short, long, default_value = "1")]
    round: u8,
}

impl FlagArgs {
    pub(super) fn run(self, dry_run: bool) -> Result<(), CrosscalError> {
        let round = match self.round {
            1 => FlagRound::One,
            2 => FlagRound::Two,
            other => {
                return Err(CrosscalError::Generic(format!(
                    "There is no flagging round {other}; use 1 or 2"
                )))
            }
        };

        let mut store = self.stage.load()?;
        let params = FlagParams::from_store(&store, round)?;

        let mut printer = InfoPrinter::new(format!("Flagging round {}", self.round).into());
        printer.push_line(format!("Dataset: {}", params.vis.display()).into());
        printer.push_line(format!("Fields: {}", params.all_fields).into());
        if !params.bad_ants.is_empty() {
            printer.push_line(format!("Bad antennas: {}", params.bad_ants.join(", ")).into());
        }
        if !params.bad_freq_ranges.is_empty() {
            printer.push_line(
                format!("Bad frequency ranges: {}", params.bad_freq_ranges.join(", ")).into(),
            );
        }
        printer.display();
        display_warnings();
        if dry_run {
            return Ok(());
        }

        let casa = casa_from_store(&store)?;
        let deltas = params.run(&casa)?;
        apply_deltas(&mut store, deltas)
    }
}
