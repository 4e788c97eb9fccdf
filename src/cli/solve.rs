// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;

use super::common::{apply_deltas, casa_from_store, display_warnings, InfoPrinter, StageArgs};
use super::CrosscalError;
use crate::params::SolveParams;

#[derive(Debug, Parser)]
pub(super) struct SolveArgs {
    #[clap(flatten)]
    stage: StageArgs,
}

impl SolveArgs {
    pub(super) fn run(self, dry_run: bool) -> Result<(), CrosscalError> {
        let mut store = self.stage.load()?;
        let params = SolveParams::from_store(&store)?;

        let mut printer = InfoPrinter::new("Parallel-hand solving".into());
        printer.push_line(format!("Dataset: {}", params.vis.display()).into());
        printer.push_block(vec![
            format!("Delay table:      {}", params.tables.kcorr.display()).into(),
            format!("Bandpass table:   {}", params.tables.bpass.display()).into(),
            format!("Gain table:       {}", params.tables.gain.display()).into(),
            format!("Flux-scale table: {}", params.tables.flux.display()).into(),
        ]);
        printer.push_line(format!("Reference antenna: {}", params.refant).into());
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
