// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code. More specific options for `crosscal`
//! subcommands are contained in modules.
//!
//! Only 3 things should be public in this module: `Crosscal`,
//! `Crosscal::run`, and `CrosscalError`.

mod apply;
mod build_config;
mod common;
mod error;
mod flag;
mod flux_scale;
mod partition;
mod pol_apply;
mod pol_solve;
mod run;
mod solve;
mod split;

pub use error::CrosscalError;

use clap::{AppSettings, Args, Parser, Subcommand};
use log::info;

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = "Cross-calibration pipeline orchestration for MeerKAT and ATA measurement sets"
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct Crosscal {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    /// Only verify that arguments and the config were correctly ingested and
    /// print out high-level information; don't invoke CASA.
    #[clap(long)]
    #[clap(global = true)]
    dry_run: bool,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(about = "Build the pipeline config from a measurement set's metadata.")]
    BuildConfig(build_config::BuildConfigArgs),

    #[clap(about = "Partition the input dataset into the working dataset.")]
    Partition(partition::PartitionArgs),

    #[clap(about = "Flag the data (round 1 on raw data, round 2 on corrected data).")]
    Flag(flag::FlagArgs),

    #[clap(about = "Set the flux-density scale of the flux calibrator.")]
    SetFluxScale(flux_scale::FluxScaleArgs),

    #[clap(about = "Solve the parallel-hand calibration tables (K, B, G, flux scale).")]
    Solve(solve::SolveArgs),

    #[clap(about = "Apply the parallel-hand solutions to all fields.")]
    Apply(apply::ApplyArgs),

    #[clap(about = "Solve the cross-hand calibration tables (D-terms, X-Y phase).")]
    SolvePol(pol_solve::PolSolveArgs),

    #[clap(about = "Apply the cross-hand solutions to all fields.")]
    ApplyPol(pol_apply::PolApplyArgs),

    #[clap(about = "Split the corrected data into the final calibrated dataset.")]
    Split(split::SplitArgs),

    #[clap(about = "Run the whole pipeline in order against one config.")]
    Run(run::RunArgs),
}

impl Crosscal {
    pub fn run(self) -> Result<(), CrosscalError> {
        let GlobalArgs { verbosity, dry_run } = self.global_opts;
        setup_logging(verbosity).expect("Failed to initialise logging.");

        let sub_command = match &self.command {
            Command::BuildConfig(_) => "build-config",
            Command::Partition(_) => "partition",
            Command::Flag(_) => "flag",
            Command::SetFluxScale(_) => "set-flux-scale",
            Command::Solve(_) => "solve",
            Command::Apply(_) => "apply",
            Command::SolvePol(_) => "solve-pol",
            Command::ApplyPol(_) => "apply-pol",
            Command::Split(_) => "split",
            Command::Run(_) => "run",
        };
        info!("crosscal {} {}", sub_command, env!("CARGO_PKG_VERSION"));
        display_build_info();

        match self.command {
            Command::BuildConfig(args) => args.run(dry_run)?,
            Command::Partition(args) => args.run(dry_run)?,
            Command::Flag(args) => args.run(dry_run)?,
            Command::SetFluxScale(args) => args.run(dry_run)?,
            Command::Solve(args) => args.run(dry_run)?,
            Command::Apply(args) => args.run(dry_run)?,
            Command::SolvePol(args) => args.run(dry_run)?,
            Command::ApplyPol(args) => args.run(dry_run)?,
            Command::Split(args) => args.run(dry_run)?,
            Command::Run(args) => args.run(dry_run)?,
        }

        info!("crosscal {} complete.", sub_command);
        Ok(())
    }
}

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// automatically only uses colours and fancy symbols if we're on a tty (e.g. a
/// terminal); piped output will be formatted sensibly. Source code lines are
/// displayed in log messages when verbosity >= 3.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.init();

    Ok(())
}

/// Write many info-level log lines of how this executable was compiled.
fn display_build_info() {
    let dirty = match GIT_DIRTY {
        Some(true) => " (dirty)",
        _ => "",
    };
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => {
            info!("Compiled on git commit hash: {hash}{dirty}");
        }
        None => info!("Compiled on git commit hash: <no git info>"),
    }
    if let Some(hr) = GIT_HEAD_REF {
        info!("            git head ref: {}", hr);
    }
    info!("            {}", BUILT_TIME_UTC);
    info!("         with compiler {}", RUSTC_VERSION);
    info!("");
}
