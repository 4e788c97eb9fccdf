// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;

use super::common::{apply_deltas, casa_from_store, display_warnings, InfoPrinter, StageArgs};
use super::CrosscalError;
use crate::ms::MsMeta;
use crate::params::FluxScaleParams;

#[derive(Debug, Parser)]
pub(super) struct FluxScaleArgs {
    #[clap(flatten)]
    stage: StageArgs,
}

impl FluxScaleArgs {
    pub(super) fn run(self, dry_run: bool) -> Result<(), CrosscalError> {
        let mut store = self.stage.load()?;
        let ms = MsMeta::open(store.get_str("data", "vis")?)?;
        let params = FluxScaleParams::from_store(&store, &ms)?;

        let mut printer = InfoPrinter::new("Flux-scale setting".into());
        printer.push_line(format!("Dataset: {}", params.vis.display()).into());
        printer.push_block(vec![
            format!("Flux calibrator: {}", params.flux_field).into(),
            format!("Standard: {}", params.standard).into(),
            format!("Mean frequency: {:.4} GHz", params.mean_freq_ghz).into(),
        ]);
        printer.push_line(format!("Polarised models: {}", params.dopol).into());
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
