// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Bookkeeping between stages: which field plays which calibration role, and
//! where the calibration tables for a dataset live.

mod error;
#[cfg(test)]
mod tests;

pub(crate) use error::BookkeepingError;

use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::warn;
use vec1::Vec1;

use crate::config::ConfigStore;
use crate::constants::ROUND1_SUFFIX;
use crate::polmodel::PolCalibrator;

/// The keys a [fields] section is expected to carry. Anything else draws a
/// warning.
const FIELDS_KEYS: [&str; 5] = [
    "fluxfield",
    "bpassfield",
    "phasecalfield",
    "targetfields",
    "extrafields",
];

/// The fixed field-role record every stage works from. Built once per stage
/// from the [fields] section; read-only thereafter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldRoles {
    /// The flux calibrator. Always exactly one field; also the delay
    /// calibrator.
    pub(crate) flux: String,

    /// The bandpass calibrator.
    pub(crate) bandpass: String,

    /// The phase/gain ("secondary") calibrator.
    pub(crate) secondary: String,

    /// The science targets.
    pub(crate) targets: Vec1<String>,

    /// Any further fields to carry along, deduplicated against all other
    /// roles.
    pub(crate) extras: Vec<String>,
}

impl FieldRoles {
    pub(crate) fn from_config(store: &ConfigStore) -> Result<FieldRoles, BookkeepingError> {
        let unknown = store.unknown_keys("fields", &FIELDS_KEYS);
        if !unknown.is_empty() {
            warn!(
                "Unknown keys {} present in section [fields] of '{}'",
                unknown.iter().join(", "),
                store.path().display()
            );
        }

        let flux = store.get_str("fields", "fluxfield")?.to_string();
        if flux.is_empty() {
            return Err(BookkeepingError::EmptyRole { key: "fluxfield" });
        }
        if flux.contains(',') {
            return Err(BookkeepingError::MultipleFields {
                key: "fluxfield",
                value: flux,
            });
        }

        // An empty bandpass or phase calibrator falls back to the flux
        // calibrator, as when building the config from intents.
        let bandpass = match store.get_str("fields", "bpassfield")? {
            "" => flux.clone(),
            s => s.to_string(),
        };
        let secondary = match store.get_str("fields", "phasecalfield")? {
            "" => flux.clone(),
            s => s.to_string(),
        };

        let targets: Vec<String> = store
            .get_str("fields", "targetfields")?
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        let targets = Vec1::try_from_vec(targets)
            .map_err(|_| BookkeepingError::EmptyRole { key: "targetfields" })?;

        let others: Vec<&String> = [&flux, &bandpass, &secondary]
            .into_iter()
            .chain(targets.iter())
            .collect();
        let extras = store
            .get_str_or("fields", "extrafields", "")?
            .split(',')
            .filter(|s| !s.is_empty() && !others.iter().any(|o| o.as_str() == *s))
            .map(|s| s.to_string())
            .unique()
            .collect();

        Ok(FieldRoles {
            flux,
            bandpass,
            secondary,
            targets,
            extras,
        })
    }

    /// The fields gains are solved on: the flux and secondary calibrators,
    /// deduplicated, comma-joined for CASA field selection.
    pub(crate) fn gainfields(&self) -> String {
        [self.flux.as_str(), self.secondary.as_str()]
            .into_iter()
            .unique()
            .join(",")
    }

    /// Whether the flux scale needs bootstrapping from the flux calibrator to
    /// a distinct secondary.
    pub(crate) fn bootstrap_fluxscale(&self) -> bool {
        self.secondary != self.flux
    }

    /// Everything that receives the secondary's gains when applying:
    /// secondary, targets and extras, deduplicated, comma-joined.
    pub(crate) fn secondary_and_targets(&self) -> String {
        std::iter::once(self.secondary.as_str())
            .chain(self.targets.iter().map(|s| s.as_str()))
            .chain(self.extras.iter().map(|s| s.as_str()))
            .filter(|s| !s.is_empty())
            .unique()
            .join(",")
    }

    /// All fields the pipeline touches, deduplicated, comma-joined.
    pub(crate) fn all_fields(&self) -> String {
        [self.flux.as_str(), self.bandpass.as_str()]
            .into_iter()
            .chain(std::iter::once(self.secondary.as_str()))
            .chain(self.targets.iter().map(|s| s.as_str()))
            .chain(self.extras.iter().map(|s| s.as_str()))
            .filter(|s| !s.is_empty())
            .unique()
            .join(",")
    }

    /// The calibrator fields (everything except the targets), deduplicated,
    /// comma-joined.
    pub(crate) fn cal_fields(&self) -> String {
        [self.flux.as_str(), self.bandpass.as_str()]
            .into_iter()
            .chain(std::iter::once(self.secondary.as_str()))
            .chain(self.extras.iter().map(|s| s.as_str()))
            .filter(|s| !s.is_empty())
            .unique()
            .join(",")
    }

    pub(crate) fn target_fields(&self) -> String {
        self.targets.iter().unique().join(",")
    }
}

/// Pick the field to use for X-Y-phase calibration from the dataset's field
/// names: 3C286 if present, then 3C138, then any other calibrator with a known
/// polarisation model. `None` means the secondary has to be used and the X-Y
/// phase ambiguity can't be resolved.
pub(crate) fn pol_calibrator<'a, I>(field_names: I) -> Option<(PolCalibrator, &'a str)>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    PolCalibrator::PREFERENCE.into_iter().find_map(|cal| {
        field_names
            .clone()
            .into_iter()
            .find(|name| cal.aliases().contains(name))
            .map(|name| (cal, name))
    })
}

/// The immutable-per-run set of calibration-table paths for a dataset, all
/// derived from the dataset's base filename under the calibration directory.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CalTables {
    pub(crate) caldir: PathBuf,

    /// Antenna-based delays (K).
    pub(crate) kcorr: PathBuf,

    /// Bandpass (B).
    pub(crate) bpass: PathBuf,

    /// Gains (G or T).
    pub(crate) gain: PathBuf,

    /// Bootstrapped flux scale.
    pub(crate) flux: PathBuf,

    /// Polarisation leakage D-terms.
    pub(crate) dpol: PathBuf,

    /// Cross-hand X-Y phase, before the ambiguity is resolved.
    pub(crate) xy_amb: PathBuf,

    /// Cross-hand X-Y phase, final.
    pub(crate) xy: PathBuf,
}

impl CalTables {
    pub(crate) fn new(vis: &Path, caldir: &Path) -> Result<CalTables, BookkeepingError> {
        let base = vis
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| BookkeepingError::BadDatasetPath(vis.to_path_buf()))?;
        let table = |ext: &str| caldir.join(format!("{base}.{ext}"));
        Ok(CalTables {
            caldir: caldir.to_path_buf(),
            kcorr: table("kcal"),
            bpass: table("bcal"),
            gain: table("gcal"),
            flux: table("fluxscale"),
            dpol: table("dcal"),
            xy_amb: table("xyambcal"),
            xy: table("xycal"),
        })
    }

    /// The table that carries the absolute flux scale: the bootstrapped
    /// fluxscale table when one was made, else the gain table itself.
    pub(crate) fn fluxscale_or_gain(&self, roles: &FieldRoles) -> &Path {
        if roles.bootstrap_fluxscale() {
            &self.flux
        } else {
            &self.gain
        }
    }
}

/// What [`prepare_caldir`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CaldirState {
    /// The directory didn't exist and was created.
    Created,

    /// A previous run's directory was renamed with the round-1 suffix and a
    /// fresh one created.
    Rotated,

    /// The directory and its rotated sibling both already exist; nothing was
    /// touched. At most two generations of tables are ever kept.
    Reused,
}

/// Make the calibration directory available for a solving stage. An existing
/// directory from a prior run is rotated aside exactly once.
pub(crate) fn prepare_caldir(caldir: &Path) -> Result<CaldirState, BookkeepingError> {
    let io_err = |err| BookkeepingError::CaldirIo {
        path: caldir.to_path_buf(),
        err,
    };
    if !caldir.is_dir() {
        fs::create_dir_all(caldir).map_err(io_err)?;
        return Ok(CaldirState::Created);
    }

    let name = caldir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| BookkeepingError::BadDatasetPath(caldir.to_path_buf()))?;
    let round1 = caldir.with_file_name(format!("{name}{ROUND1_SUFFIX}"));
    if round1.is_dir() {
        return Ok(CaldirState::Reused);
    }
    fs::rename(caldir, &round1).map_err(io_err)?;
    fs::create_dir_all(caldir).map_err(io_err)?;
    Ok(CaldirState::Rotated)
}

/// Fail if an expected calibration product is absent. CASA tasks don't
/// uniformly raise on internal failure, so this is the pipeline's only
/// between-steps failure detection.
pub(crate) fn verify_table(path: &Path) -> Result<(), BookkeepingError> {
    if path.exists() {
        Ok(())
    } else {
        Err(BookkeepingError::MissingTable(path.to_path_buf()))
    }
}
