// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Build the pipeline config: defaults plus everything derived from the
//! dataset's metadata (field roles from scan intents, the clamped spectral
//! window, and the polarisation go/no-go gates).

use std::path::PathBuf;

use indexmap::IndexMap;
use itertools::Itertools;
use log::{info, warn};

use super::StageError;
use crate::config::{clamp_spw_mhz, parse_spw, ConfigStore, Value};
use crate::constants::MIN_POL_CORRELATIONS;
use crate::ms::MsMeta;
use crate::parang;

pub(crate) struct BuildConfigParams {
    pub(crate) config_path: PathBuf,
    pub(crate) vis: PathBuf,
    pub(crate) refant: String,
    pub(crate) standard: String,
    pub(crate) minbaselines: i64,
    pub(crate) chanbin: i64,
    pub(crate) spw: String,
    pub(crate) createmms: bool,
    pub(crate) dopol: bool,
    pub(crate) bad_ants: Vec<String>,
    pub(crate) bad_freq_ranges: Vec<String>,
}

/// Field names assigned to each role from the dataset's scan intents.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IntentFields {
    pub(crate) flux: String,
    pub(crate) bandpass: String,
    pub(crate) phasecal: String,
    /// Comma-joined; the target role is the only one allowed several fields.
    pub(crate) targets: String,
    pub(crate) extras: Vec<String>,
}

/// Pick the field for a role. Several fields with the same intent keep only
/// the one with the most scans (unless the role allows several); the rest go
/// into the extras.
fn select_field(
    ms: &MsMeta,
    intent: &str,
    key: &str,
    default: &str,
    multiple: bool,
    extras: &mut Vec<String>,
) -> String {
    let fields = ms.fields_for_intent(intent);
    match fields.as_slice() {
        [] => {
            warn!(
                "Intent '{intent}' not found in dataset '{}'. Setting {key} to '{default}'",
                ms.path.display()
            );
            default.to_string()
        }
        [only] => only.name.clone(),
        several => {
            info!(
                "Multiple fields found with intent '{intent}' in dataset '{}': {}",
                ms.path.display(),
                several.iter().map(|f| f.name.as_str()).join(", ")
            );
            if multiple {
                info!("Will use all of them for '{key}'");
                several.iter().map(|f| f.name.as_str()).join(",")
            } else {
                // Keep the best-covered field for the role itself.
                let best = several
                    .iter()
                    .max_by_key(|f| f.num_scans)
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| default.to_string());
                warn!(
                    "Only using field '{best}' for '{key}', which has the most scans"
                );
                let leftover: Vec<&str> = several
                    .iter()
                    .map(|f| f.name.as_str())
                    .filter(|n| *n != best)
                    .collect();
                if !leftover.is_empty() {
                    warn!(
                        "Putting extra fields with intent '{intent}' in 'extrafields': {}",
                        leftover.iter().join(", ")
                    );
                    extras.extend(leftover.iter().map(|n| n.to_string()));
                }
                best
            }
        }
    }
}

/// Assign field roles from scan intents. A field with intent CALIBRATE_FLUX
/// is mandatory; every other role falls back to it.
pub(crate) fn resolve_intent_fields(ms: &MsMeta) -> Result<IntentFields, StageError> {
    let flux_fields = ms.fields_for_intent("CALIBRATE_FLUX");
    let default = match flux_fields.first() {
        Some(f) => f.name.clone(),
        None => {
            return Err(StageError::NoFluxIntent {
                vis: ms.path.display().to_string(),
                intents: ms.all_intents().into_iter().join(", "),
            })
        }
    };

    let mut extras = vec![];
    let flux = select_field(ms, "CALIBRATE_FLUX", "fluxfield", &default, false, &mut extras);
    let bandpass = select_field(
        ms,
        "CALIBRATE_BANDPASS",
        "bpassfield",
        &default,
        false,
        &mut extras,
    );
    // MeerKAT data sometimes labels the phase calibrator with the older
    // AMPLI intent.
    let phase_intent = if ms.has_intent("CALIBRATE_PHASE") {
        "CALIBRATE_PHASE"
    } else {
        "CALIBRATE_AMPLI"
    };
    let phasecal = select_field(ms, phase_intent, "phasecalfield", &default, false, &mut extras);
    let targets = select_field(ms, "TARGET", "targetfields", &default, true, &mut extras);

    // Fields with UNKNOWN intent (bogus labelling during conversion) are
    // carried as extras so they still get calibrated.
    for f in ms.fields_for_intent("UNKNOWN") {
        warn!(
            "Field '{}' has intent UNKNOWN; appending it to 'extrafields'",
            f.name
        );
        extras.push(f.name.clone());
    }

    let taken: Vec<&str> = [flux.as_str(), bandpass.as_str(), phasecal.as_str()]
        .into_iter()
        .chain(targets.split(','))
        .collect();
    let extras = extras
        .into_iter()
        .filter(|e| !taken.contains(&e.as_str()))
        .unique()
        .collect();

    Ok(IntentFields {
        flux,
        bandpass,
        phasecal,
        targets,
        extras,
    })
}

impl BuildConfigParams {
    pub(crate) fn run(&self) -> Result<ConfigStore, StageError> {
        let ms = MsMeta::open(&self.vis)?;
        let fields = resolve_intent_fields(&ms)?;
        info!(
            "[fields] section will be written to '{}'. Edit it if you need to \
             change field IDs (comma-separated for multiple IDs, not supported \
             for calibrators).",
            self.config_path.display()
        );

        // Clamp the requested spectral window to what was actually observed.
        let ranges = parse_spw(&self.spw)?;
        let first_chans = &ms.spw_chan_freqs_hz[0];
        let last_chans = &ms.spw_chan_freqs_hz[ms.num_spws() - 1];
        let mut low_mhz = f64::INFINITY;
        let mut high_mhz = f64::NEG_INFINITY;
        for range in &ranges {
            let (low, _) = range.bounds_mhz(first_chans)?;
            let (_, high) = range.bounds_mhz(last_chans)?;
            low_mhz = low_mhz.min(low);
            high_mhz = high_mhz.max(high);
        }
        let (ms_low, ms_high) = ms.freq_range_mhz();
        let (spw, clamped) = clamp_spw_mhz(low_mhz, high_mhz, ms_low, ms_high);
        if clamped {
            warn!(
                "Default SPW outside the observed range ({ms_low:.1}~{ms_high:.1} MHz). \
                 Forcing spw = '{spw}'"
            );
        }

        // The reference antenna being absent isn't fatal; the operator may
        // know better. Warn and keep it.
        if ms.has_antenna(&self.refant) {
            info!("Using reference antenna '{}'", self.refant);
        } else {
            warn!(
                "Reference antenna '{}' isn't present in input dataset '{}'. \
                 Antennas present are: {}",
                self.refant,
                self.vis.display(),
                ms.antenna_names.iter().join(", ")
            );
        }

        // Polarisation gates: enough correlations, enough feed rotation.
        let mut dopol = self.dopol;
        if dopol && ms.num_correlations < MIN_POL_CORRELATIONS {
            warn!(
                "Only {} correlation(s) present in '{}'. Any attempted polarisation \
                 calibration would fail, so setting dopol=False",
                ms.num_correlations,
                self.vis.display()
            );
            dopol = false;
        } else if dopol {
            let coverage = parang::coverage_deg(&ms, &fields.phasecal)?;
            info!(
                "Parallactic-angle coverage of '{}': {coverage:.1} degrees",
                fields.phasecal
            );
            if coverage > 0.0 && !parang::coverage_permits_polcal(coverage) {
                warn!(
                    "Parallactic-angle coverage is < 30 deg. Polarisation calibration \
                     would most likely fail, so setting dopol=False"
                );
                dopol = false;
            }
        }

        // All checks done; write the config.
        let mut store = ConfigStore::create(&self.config_path)?;

        let mut data = IndexMap::new();
        data.insert("vis".to_string(), Value::from(&self.vis));
        store.write_section("data", data, None)?;

        let mut f = IndexMap::new();
        f.insert("fluxfield".to_string(), Value::from(fields.flux.as_str()));
        f.insert(
            "bpassfield".to_string(),
            Value::from(fields.bandpass.as_str()),
        );
        f.insert(
            "phasecalfield".to_string(),
            Value::from(fields.phasecal.as_str()),
        );
        f.insert(
            "targetfields".to_string(),
            Value::from(fields.targets.as_str()),
        );
        f.insert(
            "extrafields".to_string(),
            Value::from(fields.extras.iter().join(",")),
        );
        store.write_section("fields", f, None)?;

        let mut crosscal = IndexMap::new();
        crosscal.insert("refant".to_string(), Value::from(self.refant.as_str()));
        crosscal.insert("standard".to_string(), Value::from(self.standard.as_str()));
        crosscal.insert("minbaselines".to_string(), Value::from(self.minbaselines));
        crosscal.insert("chanbin".to_string(), Value::from(self.chanbin));
        crosscal.insert("spw".to_string(), Value::from(spw));
        crosscal.insert("createmms".to_string(), Value::from(self.createmms));
        crosscal.insert(
            "badants".to_string(),
            Value::List(self.bad_ants.iter().map(|a| Value::from(a.as_str())).collect()),
        );
        crosscal.insert(
            "badfreqranges".to_string(),
            Value::List(
                self.bad_freq_ranges
                    .iter()
                    .map(|r| Value::from(r.as_str()))
                    .collect(),
            ),
        );
        store.write_section("crosscal", crosscal, None)?;

        let mut run = IndexMap::new();
        run.insert("dopol".to_string(), Value::from(dopol));
        store.write_section("run", run, None)?;

        Ok(store)
    }
}
