// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;

use super::common::{apply_deltas, casa_from_store, display_warnings, InfoPrinter, StageArgs};
use super::CrosscalError;
use crate::ms::MsMeta;
use crate::params::PolSolveParams;

#[derive(Debug, Parser)]
pub(super) struct PolSolveArgs {
    #[clap(flatten)]
    stage: StageArgs,
}

impl PolSolveArgs {
    pub(super) fn run(self, dry_run: bool) -> Result<(), CrosscalError> {
        let mut store = self.stage.load()?;
        let ms = MsMeta::open(store.get_str("data", "vis")?)?;
        let params = PolSolveParams::from_store(&store, &ms)?;

        let mut printer = InfoPrinter::new("Cross-hand solving".into());
        printer.push_line(format!("Dataset: {}", params.vis.display()).into());
        printer.push_block(vec![
            format!("D-term table:   {}", params.tables.dpol.display()).into(),
            format!("X-Y phase table: {}", params.tables.xy.display()).into(),
        ]);
        match params.known_pol {
            Some(cal) => printer.push_line(
                format!(
                    "Polarisation calibrator: {} ({cal}, ambiguity resolvable)",
                    params.pol_field
                )
                .into(),
            ),
            None => printer.push_line(
                format!(
                    "Polarisation calibrator: {} (no known model; ambiguity stays)",
                    params.pol_field
                )
                .into(),
            ),
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
