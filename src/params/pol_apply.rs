// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Apply the cross-hand solutions to every field, with parallactic-angle
//! correction on.

use std::path::PathBuf;

use log::info;

use super::StageError;
use crate::bookkeeping::{pol_calibrator, CalTables, FieldRoles};
use crate::casa::{CasaTasks, TaskCall};
use crate::config::{ConfigDelta, ConfigStore, Value};
use crate::ms::MsMeta;

pub(crate) struct PolApplyParams {
    pub(crate) vis: PathBuf,
    pub(crate) roles: FieldRoles,
    pub(crate) tables: CalTables,

    /// The field the X-Y phase was solved on.
    pub(crate) pol_field: String,
}

impl PolApplyParams {
    pub(crate) fn from_store(store: &ConfigStore, ms: &MsMeta) -> Result<Self, StageError> {
        let vis = super::vis_from_store(store)?;
        let tables = super::caltables_for(&vis)?;
        let roles = FieldRoles::from_config(store)?;
        let pol_field = match pol_calibrator(ms.field_names()) {
            Some((_, name)) => name.to_string(),
            None => roles.secondary.clone(),
        };
        Ok(PolApplyParams {
            vis,
            roles,
            tables,
            pol_field,
        })
    }

    fn applycal(&self, field: &str, gainfield: Vec<Value>, interp: &'static str) -> TaskCall {
        TaskCall::new("applycal")
            .arg("vis", &self.vis)
            .arg("field", field)
            .arg("selectdata", false)
            .arg("calwt", false)
            .arg(
                "gaintable",
                Value::List(vec![
                    Value::from(&self.tables.bpass),
                    Value::from(self.tables.fluxscale_or_gain(&self.roles)),
                    Value::from(&self.tables.dpol),
                    Value::from(&self.tables.xy),
                ]),
            )
            .arg("gainfield", Value::List(gainfield))
            .arg("parang", true)
            .arg("interp", interp)
    }

    pub(crate) fn run(&self, casa: &dyn CasaTasks) -> Result<Vec<ConfigDelta>, StageError> {
        let bandpass = Value::from(self.roles.bandpass.as_str());
        let pol = Value::from(self.pol_field.as_str());

        info!("Applying calibration -> flux calibrator");
        casa.run_task(&self.applycal(
            &self.roles.flux,
            vec![
                bandpass.clone(),
                Value::from(self.roles.flux.as_str()),
                bandpass.clone(),
                pol.clone(),
            ],
            "nearest,linearflag,nearest,nearest",
        ))?;

        if self.pol_field != self.roles.secondary {
            info!("Applying calibration -> polarisation calibrator");
            casa.run_task(&self.applycal(
                &self.pol_field,
                vec![bandpass.clone(), pol.clone(), bandpass.clone(), pol.clone()],
                "nearest,linearflag,nearest,nearest",
            ))?;
        }

        info!("Applying calibration -> phase calibrator, targets and extra fields");
        casa.run_task(&self.applycal(
            &self.roles.secondary_and_targets(),
            vec![
                bandpass.clone(),
                Value::from(self.roles.secondary.as_str()),
                bandpass,
                pol,
            ],
            "nearest,nearest,nearest,nearest",
        ))?;

        Ok(vec![])
    }
}
