// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parallel-hand calibration solving: delays, bandpass, gains and the
//! bootstrapped flux scale.

use std::path::PathBuf;

use log::info;

use super::StageError;
use crate::bookkeeping::{prepare_caldir, verify_table, CalTables, CaldirState, FieldRoles};
use crate::casa::{CasaTasks, TaskCall};
use crate::config::{ConfigDelta, ConfigStore, Value};
use crate::constants::DEFAULT_MINBASELINES;

pub(crate) struct SolveParams {
    pub(crate) vis: PathBuf,
    pub(crate) roles: FieldRoles,
    pub(crate) tables: CalTables,
    pub(crate) refant: String,
    pub(crate) minbaselines: i64,
}

impl SolveParams {
    pub(crate) fn from_store(store: &ConfigStore) -> Result<Self, StageError> {
        let vis = super::vis_from_store(store)?;
        let tables = super::caltables_for(&vis)?;
        Ok(SolveParams {
            vis,
            roles: FieldRoles::from_config(store)?,
            tables,
            refant: store.get_str("crosscal", "refant")?.to_string(),
            minbaselines: store.get_int_or("crosscal", "minbaselines", DEFAULT_MINBASELINES)?,
        })
    }

    pub(crate) fn run(&self, casa: &dyn CasaTasks) -> Result<Vec<ConfigDelta>, StageError> {
        match prepare_caldir(&self.tables.caldir)? {
            CaldirState::Created => (),
            CaldirState::Rotated => info!(
                "Rotated the previous run's '{}' aside with a _round1 suffix",
                self.tables.caldir.display()
            ),
            CaldirState::Reused => info!(
                "Both '{}' and its _round1 sibling exist; reusing the directory",
                self.tables.caldir.display()
            ),
        }

        info!(
            "Solving antenna-based delays (K) -> {}",
            self.tables.kcorr.display()
        );
        casa.run_task(
            &TaskCall::new("gaincal")
                .arg("vis", &self.vis)
                .arg("caltable", &self.tables.kcorr)
                .arg("field", self.roles.flux.as_str())
                .arg("refant", self.refant.as_str())
                .arg("minblperant", self.minbaselines)
                .arg("solnorm", false)
                .arg("gaintype", "K")
                .arg("solint", "inf")
                .arg("combine", "")
                .arg("parang", false)
                .arg("append", false),
        )?;
        verify_table(&self.tables.kcorr)?;

        info!("Solving bandpass (B) -> {}", self.tables.bpass.display());
        casa.run_task(
            &TaskCall::new("bandpass")
                .arg("vis", &self.vis)
                .arg("caltable", &self.tables.bpass)
                .arg("field", self.roles.bandpass.as_str())
                .arg("refant", self.refant.as_str())
                .arg("minblperant", self.minbaselines)
                .arg("solnorm", false)
                .arg("solint", "inf")
                .arg("combine", "scan")
                .arg("bandtype", "B")
                .arg("fillgaps", 8_i64)
                .arg("gaintable", &self.tables.kcorr)
                .arg("gainfield", self.roles.flux.as_str())
                .arg("parang", false)
                .arg("append", false),
        )?;
        verify_table(&self.tables.bpass)?;

        info!("Solving gains (G) -> {}", self.tables.gain.display());
        casa.run_task(
            &TaskCall::new("gaincal")
                .arg("vis", &self.vis)
                .arg("caltable", &self.tables.gain)
                .arg("field", self.roles.gainfields())
                .arg("refant", self.refant.as_str())
                .arg("minblperant", self.minbaselines)
                .arg("solnorm", false)
                .arg("gaintype", "G")
                .arg("solint", "inf")
                .arg("combine", "")
                .arg("calmode", "ap")
                .arg(
                    "gaintable",
                    Value::List(vec![
                        Value::from(&self.tables.kcorr),
                        Value::from(&self.tables.bpass),
                    ]),
                )
                .arg(
                    "gainfield",
                    Value::List(vec![
                        Value::from(self.roles.flux.as_str()),
                        Value::from(self.roles.bandpass.as_str()),
                    ]),
                )
                .arg("parang", false)
                .arg("append", false),
        )?;
        verify_table(&self.tables.gain)?;

        // Only bootstrap the flux scale when the secondary is a different
        // field.
        if self.roles.bootstrap_fluxscale() {
            info!(
                "Bootstrapping the flux scale -> {}",
                self.tables.flux.display()
            );
            casa.run_task(
                &TaskCall::new("fluxscale")
                    .arg("vis", &self.vis)
                    .arg("caltable", &self.tables.gain)
                    .arg(
                        "reference",
                        Value::List(vec![Value::from(self.roles.flux.as_str())]),
                    )
                    .arg("transfer", "")
                    .arg("fluxtable", &self.tables.flux)
                    .arg("append", false)
                    .arg(
                        "listfile",
                        Value::from(&self.tables.caldir.join("fluxscale_xx_yy.txt")),
                    ),
            )?;
            verify_table(&self.tables.flux)?;
        }

        Ok(vec![])
    }
}
