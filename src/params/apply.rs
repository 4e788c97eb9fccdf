// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Apply the parallel-hand solutions to every field.

use std::path::PathBuf;

use log::info;

use super::StageError;
use crate::bookkeeping::{CalTables, FieldRoles};
use crate::casa::{CasaTasks, TaskCall};
use crate::config::{ConfigDelta, ConfigStore, Value};

pub(crate) struct ApplyParams {
    pub(crate) vis: PathBuf,
    pub(crate) roles: FieldRoles,
    pub(crate) tables: CalTables,
}

impl ApplyParams {
    pub(crate) fn from_store(store: &ConfigStore) -> Result<Self, StageError> {
        let vis = super::vis_from_store(store)?;
        let tables = super::caltables_for(&vis)?;
        Ok(ApplyParams {
            vis,
            roles: FieldRoles::from_config(store)?,
            tables,
        })
    }

    pub(crate) fn run(&self, casa: &dyn CasaTasks) -> Result<Vec<ConfigDelta>, StageError> {
        let fluxtable = self.tables.fluxscale_or_gain(&self.roles);
        let gaintable = Value::List(vec![
            Value::from(&self.tables.kcorr),
            Value::from(&self.tables.bpass),
            Value::from(fluxtable),
        ]);

        info!("Applying calibration -> flux calibrator");
        casa.run_task(
            &TaskCall::new("applycal")
                .arg("vis", &self.vis)
                .arg("field", self.roles.flux.as_str())
                .arg("selectdata", false)
                .arg("calwt", false)
                .arg("gaintable", gaintable.clone())
                .arg(
                    "gainfield",
                    Value::List(vec![
                        Value::from(self.roles.flux.as_str()),
                        Value::from(self.roles.bandpass.as_str()),
                        Value::from(self.roles.flux.as_str()),
                    ]),
                )
                .arg("parang", false)
                .arg("interp", "linear,linearflag"),
        )?;

        info!("Applying calibration -> phase calibrator, targets and extra fields");
        casa.run_task(
            &TaskCall::new("applycal")
                .arg("vis", &self.vis)
                .arg("field", self.roles.secondary_and_targets())
                .arg("selectdata", false)
                .arg("calwt", false)
                .arg("gaintable", gaintable)
                .arg(
                    "gainfield",
                    Value::List(vec![
                        Value::from(self.roles.flux.as_str()),
                        Value::from(self.roles.bandpass.as_str()),
                        Value::from(self.roles.secondary.as_str()),
                    ]),
                )
                .arg("parang", false)
                .arg("interp", "linear,linearflag"),
        )?;

        Ok(vec![])
    }
}
