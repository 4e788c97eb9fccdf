// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;

use super::common::{apply_deltas, casa_from_store, display_warnings, InfoPrinter, StageArgs};
use super::CrosscalError;
use crate::params::SplitParams;

#[derive(Debug, Parser)]
pub(super) struct SplitArgs {
    #[clap(flatten)]
    stage: StageArgs,
}

impl SplitArgs {
    pub(super) fn run(self, dry_run: bool) -> Result<(), CrosscalError> {
        let mut store = self.stage.load()?;
        let params = SplitParams::from_store(&store)?;

        let mut printer = InfoPrinter::new("Splitting".into());
        printer.push_line(format!("Input dataset: {}", params.vis.display()).into());
        printer.push_line(format!("Output dataset: {}", params.output_vis()?.display()).into());
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
