// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parameters for each pipeline stage.
//!
//! Each stage follows the same shape: its params are derived from a config
//! snapshot (plus dataset metadata where needed), `run` invokes the CASA
//! calls in sequence, verifying each expected product, and returns the config
//! deltas to persist. Nothing here retries; any unexpected condition is fatal
//! to the stage and the operator reruns it after fixing the cause.

mod apply;
mod build_config;
mod error;
mod flagging;
mod flux_scale;
mod partition;
mod pol_apply;
mod pol_solve;
mod solve;
mod split;
#[cfg(test)]
mod tests;

pub(crate) use apply::ApplyParams;
pub(crate) use build_config::BuildConfigParams;
pub(crate) use error::StageError;
pub(crate) use flagging::{FlagParams, FlagRound};
pub(crate) use flux_scale::FluxScaleParams;
pub(crate) use partition::PartitionParams;
pub(crate) use pol_apply::PolApplyParams;
pub(crate) use pol_solve::PolSolveParams;
pub(crate) use solve::SolveParams;
pub(crate) use split::SplitParams;

use std::path::{Path, PathBuf};

use crate::bookkeeping::CalTables;
use crate::config::ConfigStore;
use crate::constants::CALDIR_NAME;

/// The calibration-table paths for the configured working dataset. The
/// calibration directory sits next to the dataset.
fn caltables_for(vis: &Path) -> Result<CalTables, StageError> {
    Ok(CalTables::new(vis, &sibling_path(vis, CALDIR_NAME))?)
}

/// A path alongside `vis` with the given file name.
fn sibling_path(vis: &Path, name: &str) -> PathBuf {
    match vis.parent() {
        Some(p) if p != Path::new("") => p.join(name),
        _ => PathBuf::from(name),
    }
}

/// The working dataset path from the config.
fn vis_from_store(store: &ConfigStore) -> Result<PathBuf, StageError> {
    Ok(PathBuf::from(store.get_str("data", "vis")?))
}
