// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Cross-hand calibration solving: leakage D-terms and the X-Y phase,
//! including the resolution of the X-Y phase ambiguity against a calibrator
//! with a known polarisation model.

use std::path::{Path, PathBuf};

use log::info;

use super::StageError;
use crate::bookkeeping::{
    pol_calibrator, prepare_caldir, verify_table, CalTables, CaldirState, FieldRoles,
};
use crate::casa::{CasaTasks, TaskCall};
use crate::config::{ConfigDelta, ConfigStore, Value};
use crate::constants::DEFAULT_MINBASELINES;
use crate::ms::MsMeta;
use crate::polmodel::PolCalibrator;

pub(crate) struct PolSolveParams {
    pub(crate) vis: PathBuf,
    pub(crate) roles: FieldRoles,
    pub(crate) tables: CalTables,
    pub(crate) refant: String,
    pub(crate) minbaselines: i64,

    /// The field the X-Y phase is solved on.
    pub(crate) pol_field: String,

    /// Set when the X-Y field has a known polarisation model; the ambiguity
    /// can only be resolved then.
    pub(crate) known_pol: Option<PolCalibrator>,

    pub(crate) mean_freq_ghz: f64,
}

impl PolSolveParams {
    pub(crate) fn from_store(store: &ConfigStore, ms: &MsMeta) -> Result<Self, StageError> {
        let vis = super::vis_from_store(store)?;
        let tables = super::caltables_for(&vis)?;
        let roles = FieldRoles::from_config(store)?;

        // Prefer a calibrator with a known polarisation model; otherwise the
        // secondary has to stand in and the ambiguity stays.
        let (pol_field, known_pol) = match pol_calibrator(ms.field_names()) {
            Some((cal, name)) => (name.to_string(), Some(cal)),
            None => (roles.secondary.clone(), None),
        };

        Ok(PolSolveParams {
            vis,
            roles,
            tables,
            refant: store.get_str("crosscal", "refant")?.to_string(),
            minbaselines: store.get_int_or("crosscal", "minbaselines", DEFAULT_MINBASELINES)?,
            pol_field,
            known_pol,
            mean_freq_ghz: ms.mean_freq_ghz(),
        })
    }

    /// Whether the X-Y phase ambiguity can be resolved with a model.
    pub(crate) fn resolves_ambiguity(&self) -> bool {
        self.known_pol.is_some() && self.pol_field != self.roles.secondary
    }

    /// rflag a calibration table's solutions.
    fn rflag_table(&self, casa: &dyn CasaTasks, table: &Path) -> Result<(), StageError> {
        casa.run_task(
            &TaskCall::new("flagdata")
                .arg("vis", table)
                .arg("datacolumn", "CPARAM")
                .arg("mode", "rflag")
                .arg("timedevscale", 5.0)
                .arg("freqdevscale", 5.0)
                .arg("action", "apply"),
        )?;
        Ok(())
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
            "Solving bandpass for cross hands -> {}",
            self.tables.bpass.display()
        );
        casa.run_task(
            &TaskCall::new("bandpass")
                .arg("vis", &self.vis)
                .arg("caltable", &self.tables.bpass)
                .arg("field", self.roles.bandpass.as_str())
                .arg("refant", self.refant.as_str())
                .arg("minblperant", self.minbaselines)
                .arg("solnorm", false)
                .arg("solint", "10min")
                .arg("combine", "scan")
                .arg("bandtype", "B")
                .arg("fillgaps", 8_i64)
                .arg("parang", false)
                .arg("append", false),
        )?;
        verify_table(&self.tables.bpass)?;
        self.rflag_table(casa, &self.tables.bpass)?;

        info!(
            "Solving leakage D-terms (Dflls) -> {}",
            self.tables.dpol.display()
        );
        casa.run_task(
            &TaskCall::new("polcal")
                .arg("vis", &self.vis)
                .arg("caltable", &self.tables.dpol)
                .arg("field", self.roles.bandpass.as_str())
                .arg("refant", "")
                .arg("solint", "inf")
                .arg("combine", "scan")
                .arg("poltype", "Dflls")
                .arg("preavg", 200.0)
                .arg("gaintable", Value::List(vec![Value::from(&self.tables.bpass)]))
                .arg(
                    "gainfield",
                    Value::List(vec![Value::from(self.roles.bandpass.as_str())]),
                )
                .arg("append", false),
        )?;
        verify_table(&self.tables.dpol)?;
        self.rflag_table(casa, &self.tables.dpol)?;

        info!("Solving gains (T) -> {}", self.tables.gain.display());
        let gain_gaintable = Value::List(vec![
            Value::from(&self.tables.bpass),
            Value::from(&self.tables.dpol),
        ]);
        let gain_gainfield = Value::List(vec![
            Value::from(self.roles.bandpass.as_str()),
            Value::from(self.roles.bandpass.as_str()),
        ]);
        casa.run_task(
            &TaskCall::new("gaincal")
                .arg("vis", &self.vis)
                .arg("caltable", &self.tables.gain)
                .arg("field", self.roles.gainfields())
                .arg("refant", self.refant.as_str())
                .arg("minblperant", self.minbaselines)
                .arg("solnorm", false)
                .arg("gaintype", "T")
                .arg("solint", "inf")
                .arg("combine", "")
                .arg("calmode", "ap")
                .arg("gaintable", gain_gaintable.clone())
                .arg("gainfield", gain_gainfield.clone())
                .arg("parang", false)
                .arg("append", false),
        )?;
        verify_table(&self.tables.gain)?;

        if self.resolves_ambiguity() {
            info!("Appending gains for the polarisation calibrator {}", self.pol_field);
            casa.run_task(
                &TaskCall::new("gaincal")
                    .arg("vis", &self.vis)
                    .arg("caltable", &self.tables.gain)
                    .arg("field", self.pol_field.as_str())
                    .arg("refant", self.refant.as_str())
                    .arg("minblperant", self.minbaselines)
                    .arg("solnorm", false)
                    .arg("gaintype", "T")
                    .arg("solint", "inf")
                    .arg("combine", "")
                    .arg("calmode", "ap")
                    .arg("gaintable", gain_gaintable)
                    .arg("gainfield", gain_gainfield)
                    .arg("parang", false)
                    .arg("append", true),
            )?;
            verify_table(&self.tables.gain)?;
        }
        self.rflag_table(casa, &self.tables.gain)?;

        if self.roles.bootstrap_fluxscale() {
            info!(
                "Bootstrapping the flux scale -> {}",
                self.tables.flux.display()
            );
            // The previous round's fluxscale table would make this append.
            casa.run_task(&TaskCall::new("rmtables").arg("tablenames", &self.tables.flux))?;
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
                        Value::from(&self.tables.caldir.join("fluxscale_xy_yx.txt")),
                    ),
            )?;
            verify_table(&self.tables.flux)?;
        }

        // When the ambiguity can't be resolved, the solve goes straight into
        // the final table.
        let xy_table = if self.resolves_ambiguity() {
            &self.tables.xy_amb
        } else {
            &self.tables.xy
        };
        info!("Solving X-Y phase (XYf+QU) -> {}", xy_table.display());
        casa.run_task(
            &TaskCall::new("gaincal")
                .arg("vis", &self.vis)
                .arg("caltable", xy_table)
                .arg("field", self.pol_field.as_str())
                .arg("refant", self.refant.as_str())
                .arg("solint", "inf")
                .arg("combine", "scan")
                .arg("gaintype", "XYf+QU")
                .arg("minblperant", self.minbaselines)
                .arg("preavg", 120.0)
                .arg(
                    "gaintable",
                    Value::List(vec![
                        Value::from(&self.tables.bpass),
                        Value::from(&self.tables.dpol),
                        Value::from(&self.tables.gain),
                    ]),
                )
                .arg(
                    "gainfield",
                    Value::List(vec![
                        Value::from(self.roles.bandpass.as_str()),
                        Value::from(self.roles.bandpass.as_str()),
                        Value::from(self.pol_field.as_str()),
                    ]),
                )
                .arg("append", false),
        )?;
        verify_table(xy_table)?;

        if let Some(cal) = self.known_pol.filter(|_| self.resolves_ambiguity()) {
            let (q, u) = cal.predicted_qu(self.mean_freq_ghz);
            info!(
                "Resolving the X-Y phase ambiguity against {cal}: \
                 predicted (Q, U) = ({q:.4}, {u:.4}) at {:.4} GHz",
                self.mean_freq_ghz
            );
            casa.run_task(
                &TaskCall::new("xyamb")
                    .import("casarecipes.almapolhelpers")
                    .arg("xytab", &self.tables.xy_amb)
                    .arg(
                        "qu",
                        Value::List(vec![Value::Float(q), Value::Float(u)]),
                    )
                    .arg("xyout", &self.tables.xy),
            )?;
            verify_table(&self.tables.xy)?;
            self.rflag_table(casa, &self.tables.xy)?;
        } else {
            info!(
                "No calibrator with a known polarisation model; the X-Y \
                 phase ambiguity cannot be resolved"
            );
            self.rflag_table(casa, xy_table)?;
        }

        Ok(vec![])
    }
}
