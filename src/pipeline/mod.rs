// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The fixed stage order, and the in-process driver that walks it.
//!
//! Every stage can equally be run as its own subcommand (its own process);
//! the driver just strings them together against one owned config store,
//! re-deriving roles and table paths from the config before each stage, the
//! way freshly-started stage processes would.


use log::{debug, info};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::casa::CasaTasks;
use crate::config::{ConfigDelta, ConfigStore};
use crate::ms::MsMeta;
use crate::params::{
    ApplyParams, FlagParams, FlagRound, FluxScaleParams, PartitionParams, PolApplyParams,
    PolSolveParams, SolveParams, SplitParams, StageError,
};

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
pub(crate) enum Stage {
    #[strum(serialize = "partition")]
    Partition,

    #[strum(serialize = "flag-round-1")]
    FlagRound1,

    #[strum(serialize = "set-flux-scale")]
    SetFluxScale,

    #[strum(serialize = "solve")]
    Solve,

    #[strum(serialize = "apply")]
    Apply,

    #[strum(serialize = "flag-round-2")]
    FlagRound2,

    #[strum(serialize = "solve-pol")]
    SolvePol,

    #[strum(serialize = "apply-pol")]
    ApplyPol,

    #[strum(serialize = "split")]
    Split,
}

impl Stage {
    /// Stages that only make sense when polarisation calibration is on.
    pub(crate) fn needs_pol(self) -> bool {
        matches!(self, Stage::SolvePol | Stage::ApplyPol)
    }

    /// Run the stage against a config snapshot, returning the deltas to
    /// persist.
    pub(crate) fn execute(
        self,
        store: &ConfigStore,
        casa: &dyn CasaTasks,
    ) -> Result<Vec<ConfigDelta>, StageError> {
        match self {
            Stage::Partition => {
                let ms = MsMeta::open(store.get_str("data", "vis")?)?;
                PartitionParams::from_store(store, &ms)?.run(casa)
            }
            Stage::FlagRound1 => FlagParams::from_store(store, FlagRound::One)?.run(casa),
            Stage::SetFluxScale => {
                let ms = MsMeta::open(store.get_str("data", "vis")?)?;
                FluxScaleParams::from_store(store, &ms)?.run(casa)
            }
            Stage::Solve => SolveParams::from_store(store)?.run(casa),
            Stage::Apply => ApplyParams::from_store(store)?.run(casa),
            Stage::FlagRound2 => FlagParams::from_store(store, FlagRound::Two)?.run(casa),
            Stage::SolvePol => {
                let ms = MsMeta::open(store.get_str("data", "vis")?)?;
                PolSolveParams::from_store(store, &ms)?.run(casa)
            }
            Stage::ApplyPol => {
                let ms = MsMeta::open(store.get_str("data", "vis")?)?;
                PolApplyParams::from_store(store, &ms)?.run(casa)
            }
            Stage::Split => SplitParams::from_store(store)?.run(casa),
        }
    }
}

/// Run the stages in order, optionally resuming from a later stage. Deltas
/// are applied and persisted after each stage, so an interrupted run can be
/// resumed where it stopped.
pub(crate) fn run_pipeline(
    store: &mut ConfigStore,
    casa: &dyn CasaTasks,
    from: Option<Stage>,
) -> Result<(), StageError> {
    let mut started = from.is_none();
    for stage in Stage::iter() {
        if !started {
            if from == Some(stage) {
                started = true;
            } else {
                debug!("Skipping {stage}: before the requested start stage");
                continue;
            }
        }

        // dopol is read fresh each time; build-config or the operator may
        // have downgraded it.
        let dopol = store.get_bool_or("run", "dopol", false)?;
        if stage.needs_pol() && !dopol {
            info!("Skipping {stage}: polarisation calibration is disabled");
            continue;
        }

        info!("Running stage {stage}");
        let deltas = stage.execute(store, casa)?;
        for delta in deltas {
            store.apply(delta)?;
        }
        info!("Stage {stage} complete");
    }
    Ok(())
}
