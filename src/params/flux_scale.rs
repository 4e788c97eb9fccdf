// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Set the flux-density scale of the flux calibrator (and, when doing
//! polarisation, the manual polarised models of 3C286/3C138).

use std::path::PathBuf;

use log::info;

use super::StageError;
use crate::bookkeeping::FieldRoles;
use crate::casa::{CasaTasks, TaskCall};
use crate::config::{ConfigDelta, ConfigStore, Value};
use crate::constants::{J0408_NAMES, J0408_SPIX, J0408_STOKES_I_JY};
use crate::ms::MsMeta;
use crate::polmodel::PolCalibrator;

// Stokes I flux densities of the manual polarised models, matched to the
// NRAO flux-density scale at L band.
const THREE_C286_STOKES_I_JY: f64 = -14.6;
const THREE_C138_STOKES_I_JY: f64 = -8.26;

pub(crate) struct FluxScaleParams {
    pub(crate) vis: PathBuf,
    pub(crate) spw: String,
    pub(crate) standard: String,
    pub(crate) dopol: bool,
    pub(crate) flux_field: String,
    pub(crate) field_names: Vec<String>,
    pub(crate) mean_freq_ghz: f64,
}

impl FluxScaleParams {
    pub(crate) fn from_store(store: &ConfigStore, ms: &MsMeta) -> Result<Self, StageError> {
        let roles = FieldRoles::from_config(store)?;
        Ok(FluxScaleParams {
            vis: super::vis_from_store(store)?,
            spw: store.get_str("crosscal", "spw")?.to_string(),
            standard: store.get_str("crosscal", "standard")?.to_string(),
            dopol: store.get_bool_or("run", "dopol", false)?,
            flux_field: roles.flux,
            field_names: ms.field_names().map(|s| s.to_string()).collect(),
            mean_freq_ghz: ms.mean_freq_ghz(),
        })
    }

    /// The flux calibrator's name, resolving an index to a name when the
    /// config carries a field index instead.
    fn flux_field_name(&self) -> &str {
        self.flux_field
            .parse::<usize>()
            .ok()
            .and_then(|i| self.field_names.get(i))
            .map(|s| s.as_str())
            .unwrap_or(&self.flux_field)
    }

    pub(crate) fn run(&self, casa: &dyn CasaTasks) -> Result<Vec<ConfigDelta>, StageError> {
        // Without this, setjy can finish with a nonzero exit code even when
        // it worked.
        casa.run_task(&TaskCall::new("delmod").arg("vis", &self.vis))?;

        let reffreq = format!("{}GHz", self.mean_freq_ghz);
        let flux_name = self.flux_field_name();

        if J0408_NAMES.contains(&flux_name) {
            info!(
                "Using the manual flux model for {flux_name}: {J0408_STOKES_I_JY} Jy, \
                 spix {J0408_SPIX}, at {reffreq}"
            );
            casa.run_task(
                &TaskCall::new("setjy")
                    .arg("vis", &self.vis)
                    .arg("field", flux_name)
                    .arg("scalebychan", true)
                    .arg("standard", "manual")
                    .arg(
                        "fluxdensity",
                        Value::List(vec![
                            Value::Float(J0408_STOKES_I_JY),
                            Value::Float(0.0),
                            Value::Float(0.0),
                            Value::Float(0.0),
                        ]),
                    )
                    .arg("spix", Value::List(vec![Value::Float(J0408_SPIX)]))
                    .arg("reffreq", reffreq.as_str()),
            )?;
        } else {
            info!("Setting the flux scale of {flux_name} from the {} standard", self.standard);
            casa.run_task(
                &TaskCall::new("setjy")
                    .arg("vis", &self.vis)
                    .arg("field", flux_name)
                    .arg("spw", self.spw.as_str())
                    .arg("scalebychan", true)
                    .arg("standard", self.standard.as_str()),
            )?;
        }

        if self.dopol {
            self.set_polarised_models(casa, &reffreq)?;
        }

        Ok(vec![])
    }

    /// Manual polarised models for any of 3C286/3C138 present in the data,
    /// with the polarisation index and angle predicted by linear fits to the
    /// Perley & Butler tables at the mean observing frequency.
    fn set_polarised_models(
        &self,
        casa: &dyn CasaTasks,
        reffreq: &str,
    ) -> Result<(), StageError> {
        for (cal, stokes_i) in [
            (PolCalibrator::ThreeC286, THREE_C286_STOKES_I_JY),
            (PolCalibrator::ThreeC138, THREE_C138_STOKES_I_JY),
        ] {
            let name = match self
                .field_names
                .iter()
                .find(|n| cal.aliases().contains(&n.as_str()))
            {
                Some(n) => n,
                None => continue,
            };

            let (polindex, polangle) = cal.linear_pol_model(self.mean_freq_ghz);
            info!("Detected polarisation calibrator {name} ({cal})");
            info!(
                "Predicted polindex {polindex:.4} and pol angle {polangle:.2} deg \
                 at {:.4} GHz (linear fit to Perley & Butler 2013)",
                self.mean_freq_ghz
            );
            casa.run_task(
                &TaskCall::new("setjy")
                    .arg("vis", &self.vis)
                    .arg("field", name.as_str())
                    .arg("scalebychan", true)
                    .arg("standard", "manual")
                    .arg(
                        "fluxdensity",
                        Value::List(vec![
                            Value::Float(stokes_i),
                            Value::Float(0.0),
                            Value::Float(0.0),
                            Value::Float(0.0),
                        ]),
                    )
                    .arg("reffreq", reffreq)
                    .arg("polindex", Value::List(vec![Value::Float(polindex)]))
                    .arg("polangle", Value::List(vec![Value::Float(polangle)]))
                    .arg("rotmeas", 0_i64),
            )?;
        }
        Ok(())
    }
}
