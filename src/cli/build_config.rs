// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use super::common::{display_warnings, unpack_arg_file, InfoPrinter, Warn, ARG_FILE_HELP};
use super::CrosscalError;
use crate::constants::{
    DEFAULT_CONFIG, DEFAULT_MINBASELINES, DEFAULT_REFANT, DEFAULT_SPW, DEFAULT_STANDARD,
};
use crate::params::BuildConfigParams;

#[derive(Debug, Default, Parser, Serialize, Deserialize)]
pub(super) struct BuildConfigArgs {
    /// Path to the input measurement set.
    #[clap(short = 'd', long = "data")]
    data: Option<PathBuf>,

    /// Where to write the pipeline config.
    #[clap(short = 'C', long, default_value = DEFAULT_CONFIG)]
    #[serde(skip)]
    config: PathBuf,

    /// The reference antenna, by name or index.
    #[clap(long)]
    refant: Option<String>,

    /// The flux-density standard passed to setjy.
    #[clap(long)]
    standard: Option<String>,

    /// The minimum number of baselines per antenna for a solution.
    #[clap(long)]
    minbaselines: Option<i64>,

    /// Channel-averaging factor for partitioning; 1 averages nothing.
    #[clap(long)]
    chanbin: Option<i64>,

    /// The spectral-window selection, e.g. '*:880~1680MHz'. Clamped to the
    /// dataset's observed range.
    #[clap(long)]
    spw: Option<String>,

    /// Partition into a plain MS instead of a scan-partitioned multi-MS.
    #[clap(long)]
    #[serde(default)]
    no_mms: bool,

    /// Attempt polarisation calibration. Downgraded automatically when the
    /// data can't support it.
    #[clap(long)]
    #[serde(default)]
    dopol: bool,

    /// Known-bad antennas to flag, by name.
    #[clap(long, multiple_values(true))]
    badants: Option<Vec<String>>,

    /// Known-bad frequency ranges to flag, e.g. 944~947MHz.
    #[clap(long, multiple_values(true))]
    badfreqranges: Option<Vec<String>>,

    #[clap(name = "ARG_FILE", help = ARG_FILE_HELP.as_str())]
    #[serde(skip)]
    args_file: Option<PathBuf>,
}

impl BuildConfigArgs {
    /// Merge an argument file under the CLI arguments: anything specified on
    /// the command line wins.
    fn merge(self) -> Result<BuildConfigArgs, CrosscalError> {
        let file: BuildConfigArgs = match &self.args_file {
            None => return Ok(self),
            Some(path) => unpack_arg_file(path)?,
        };
        Ok(BuildConfigArgs {
            data: self.data.or(file.data),
            config: self.config,
            refant: self.refant.or(file.refant),
            standard: self.standard.or(file.standard),
            minbaselines: self.minbaselines.or(file.minbaselines),
            chanbin: self.chanbin.or(file.chanbin),
            spw: self.spw.or(file.spw),
            no_mms: self.no_mms || file.no_mms,
            dopol: self.dopol || file.dopol,
            badants: self.badants.or(file.badants),
            badfreqranges: self.badfreqranges.or(file.badfreqranges),
            args_file: None,
        })
    }

    fn into_params(self) -> Result<BuildConfigParams, CrosscalError> {
        let vis = self.data.ok_or_else(|| {
            CrosscalError::Generic(
                "No input data; specify a measurement set with -d or an argument file"
                    .to_string(),
            )
        })?;
        Ok(BuildConfigParams {
            config_path: self.config,
            vis,
            refant: self.refant.unwrap_or_else(|| DEFAULT_REFANT.to_string()),
            standard: self.standard.unwrap_or_else(|| DEFAULT_STANDARD.to_string()),
            minbaselines: self.minbaselines.unwrap_or(DEFAULT_MINBASELINES),
            chanbin: self.chanbin.unwrap_or(1),
            spw: self.spw.unwrap_or_else(|| DEFAULT_SPW.to_string()),
            createmms: !self.no_mms,
            dopol: self.dopol,
            bad_ants: self.badants.unwrap_or_default(),
            bad_freq_ranges: self.badfreqranges.unwrap_or_default(),
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), CrosscalError> {
        let params = self.merge()?.into_params()?;

        if params.config_path.exists() {
            format!(
                "Config file '{}' already exists and will be overwritten",
                params.config_path.display()
            )
            .warn();
        }

        let mut printer = InfoPrinter::new("Config building".into());
        printer.push_line(format!("Dataset: {}", params.vis.display()).into());
        printer.push_line(format!("Config: {}", params.config_path.display()).into());
        printer.push_block(vec![
            format!("Reference antenna: {}", params.refant).into(),
            format!("Flux standard:     {}", params.standard).into(),
            format!("Spectral window:   {}", params.spw).into(),
            format!("Polarisation:      {}", params.dopol).into(),
        ]);
        printer.display();
        display_warnings();
        if dry_run {
            return Ok(());
        }

        params.run()?;
        Ok(())
    }
}
