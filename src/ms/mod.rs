// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Metadata read out of CASA measurement sets.
//!
//! The pipeline never touches visibility data itself; it only needs enough
//! metadata to derive stage parameters: which fields carry which scan
//! intents, the channel frequencies, the antenna layout and the integration
//! times of each field. All of that is read once up front into an [`MsMeta`].
//!
//! More info on the format: <https://casa.nrao.edu/Memos/229.html>

mod error;
mod helpers;

pub(crate) use error::MsMetaError;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use hifitime::Epoch;
use itertools::Itertools;
use log::{debug, trace};
use marlu::{RADec, XyzGeocentric};

use helpers::{casacore_utc_to_epoch, read_table};

/// Per-field aggregates from the main and FIELD tables.
#[derive(Debug, Clone)]
pub(crate) struct FieldMeta {
    pub(crate) name: String,

    /// The delay-tracking direction of the field.
    pub(crate) delay_dir: RADec,

    /// The raw OBS_MODE strings of the states this field was observed in,
    /// e.g. `CALIBRATE_FLUX#ON_SOURCE`.
    pub(crate) intents: BTreeSet<String>,

    pub(crate) num_scans: usize,

    /// First and last integration timestamps of the field, when it has data.
    pub(crate) time_range: Option<(Epoch, Epoch)>,
}

impl FieldMeta {
    /// Does any of this field's states carry the given intent? CASA OBS_MODE
    /// strings compound intents, so this is a substring test, as in msmd.
    pub(crate) fn has_intent(&self, intent: &str) -> bool {
        self.intents.iter().any(|m| m.contains(intent))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MsMeta {
    pub(crate) path: PathBuf,

    pub(crate) fields: Vec<FieldMeta>,

    pub(crate) antenna_names: Vec<String>,

    /// The mean of the antenna ITRF positions; good enough as the array
    /// reference position for parallactic-angle work.
    pub(crate) mean_antenna_position: XyzGeocentric,

    /// The number of correlation products (2 for XX,YY; 4 with cross hands).
    pub(crate) num_correlations: usize,

    /// Channel frequencies [Hz] of each spectral window, in table order.
    pub(crate) spw_chan_freqs_hz: Vec<Vec<f64>>,

    /// The number of distinct scans in the dataset.
    pub(crate) num_scans: usize,
}

impl MsMeta {
    /// Read the metadata of a measurement set.
    pub(crate) fn open<P: AsRef<Path>>(ms: P) -> Result<MsMeta, MsMetaError> {
        let ms = ms.as_ref();
        if !ms.exists() {
            return Err(MsMetaError::BadFile(ms.to_path_buf()));
        }
        trace!("Reading metadata from '{}'", ms.display());

        let mut main_table = read_table(ms, None)?;
        if main_table.n_rows() == 0 {
            return Err(MsMetaError::MainTableEmpty);
        }

        // The STATE table maps a row's STATE_ID to an OBS_MODE string. Some
        // writers omit the table entirely; then there are no intents.
        let obs_modes: Vec<String> = if ms.join("STATE").exists() {
            read_table(ms, Some("STATE"))?.get_col_as_vec("OBS_MODE")?
        } else {
            vec![]
        };
        debug!("OBS_MODEs present: {:?}", obs_modes);

        // Field names and delay directions.
        let mut field_table = read_table(ms, Some("FIELD"))?;
        let field_names: Vec<String> = field_table.get_col_as_vec("NAME")?;
        let mut delay_dirs = Vec::with_capacity(field_names.len());
        for (i, name) in field_names.iter().enumerate() {
            let dir: Vec<f64> = field_table.get_cell_as_vec("DELAY_DIR", i as u64)?;
            match dir.as_slice() {
                [ra, dec, ..] => delay_dirs.push(RADec::from_radians(*ra, *dec)),
                _ => {
                    return Err(MsMetaError::BadDelayDir {
                        name: name.clone(),
                    })
                }
            }
        }

        // Walk the main table once, accumulating per-field aggregates.
        let field_ids: Vec<i32> = main_table.get_col_as_vec("FIELD_ID")?;
        let state_ids: Vec<i32> = main_table.get_col_as_vec("STATE_ID")?;
        let scan_numbers: Vec<i32> = main_table.get_col_as_vec("SCAN_NUMBER")?;
        let times: Vec<f64> = main_table.get_col_as_vec("TIME")?;

        let mut intents: Vec<BTreeSet<String>> = vec![BTreeSet::new(); field_names.len()];
        let mut scans: Vec<BTreeSet<i32>> = vec![BTreeSet::new(); field_names.len()];
        let mut time_ranges: Vec<Option<(f64, f64)>> = vec![None; field_names.len()];
        let mut all_scans: BTreeSet<i32> = BTreeSet::new();
        for (row, (&field_id, (&state_id, (&scan, &time)))) in field_ids
            .iter()
            .zip(state_ids.iter().zip(scan_numbers.iter().zip(times.iter())))
            .enumerate()
        {
            let i = usize::try_from(field_id).map_err(|_| MsMetaError::BadFieldId {
                row,
                field_id,
                num_fields: field_names.len(),
            })?;
            if i >= field_names.len() {
                return Err(MsMetaError::BadFieldId {
                    row,
                    field_id,
                    num_fields: field_names.len(),
                });
            }
            if let Some(mode) = usize::try_from(state_id)
                .ok()
                .and_then(|s| obs_modes.get(s))
            {
                intents[i].insert(mode.clone());
            }
            scans[i].insert(scan);
            all_scans.insert(scan);
            time_ranges[i] = Some(match time_ranges[i] {
                None => (time, time),
                Some((t0, t1)) => (t0.min(time), t1.max(time)),
            });
        }

        let fields = field_names
            .into_iter()
            .zip(delay_dirs)
            .zip(intents.into_iter().zip(scans.into_iter().zip(time_ranges)))
            .map(|((name, delay_dir), (intents, (scans, time_range)))| FieldMeta {
                name,
                delay_dir,
                intents,
                num_scans: scans.len(),
                time_range: time_range
                    .map(|(t0, t1)| (casacore_utc_to_epoch(t0), casacore_utc_to_epoch(t1))),
            })
            .collect::<Vec<_>>();

        // Antenna names and the mean array position.
        let mut antenna_table = read_table(ms, Some("ANTENNA"))?;
        let antenna_names: Vec<String> = antenna_table.get_col_as_vec("NAME")?;
        if antenna_names.is_empty() {
            return Err(MsMetaError::AntennaTableEmpty);
        }
        let mut position_sum = [0.0; 3];
        let mut num_positions = 0usize;
        antenna_table.for_each_row(|row| {
            let pos: Vec<f64> = row.get_cell("POSITION")?;
            if let [x, y, z, ..] = pos.as_slice() {
                position_sum[0] += x;
                position_sum[1] += y;
                position_sum[2] += z;
                num_positions += 1;
            }
            Ok(())
        })?;
        let n = num_positions.max(1) as f64;
        let mean_antenna_position = XyzGeocentric {
            x: position_sum[0] / n,
            y: position_sum[1] / n,
            z: position_sum[2] / n,
        };

        // Channel frequencies per spectral window.
        let mut spw_table = read_table(ms, Some("SPECTRAL_WINDOW"))?;
        let num_spws = spw_table.n_rows();
        let mut spw_chan_freqs_hz = Vec::with_capacity(num_spws as usize);
        for i in 0..num_spws {
            let freqs: Vec<f64> = spw_table.get_cell_as_vec("CHAN_FREQ", i)?;
            if freqs.is_empty() {
                return Err(MsMetaError::NoChannelFreqs);
            }
            spw_chan_freqs_hz.push(freqs);
        }
        if spw_chan_freqs_hz.is_empty() {
            return Err(MsMetaError::NoChannelFreqs);
        }

        // Correlation products.
        let mut pol_table = read_table(ms, Some("POLARIZATION"))?;
        let corr_types: Vec<i32> = pol_table.get_cell_as_vec("CORR_TYPE", 0)?;
        if corr_types.is_empty() {
            return Err(MsMetaError::NoCorrTypes);
        }

        Ok(MsMeta {
            path: ms.to_path_buf(),
            fields,
            antenna_names,
            mean_antenna_position,
            num_correlations: corr_types.len(),
            spw_chan_freqs_hz,
            num_scans: all_scans.len(),
        })
    }

    pub(crate) fn field_names(&self) -> impl Iterator<Item = &str> + Clone {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub(crate) fn field(&self, name: &str) -> Result<&FieldMeta, MsMetaError> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| MsMetaError::UnknownField {
                field: name.to_string(),
                vis: self.path.display().to_string(),
                available: self.field_names().join(", "),
            })
    }

    pub(crate) fn fields_for_intent(&self, intent: &str) -> Vec<&FieldMeta> {
        self.fields.iter().filter(|f| f.has_intent(intent)).collect()
    }

    pub(crate) fn has_intent(&self, intent: &str) -> bool {
        self.fields.iter().any(|f| f.has_intent(intent))
    }

    /// All distinct OBS_MODE strings in the dataset, for error messages.
    pub(crate) fn all_intents(&self) -> BTreeSet<&str> {
        self.fields
            .iter()
            .flat_map(|f| f.intents.iter().map(|s| s.as_str()))
            .collect()
    }

    pub(crate) fn num_spws(&self) -> usize {
        self.spw_chan_freqs_hz.len()
    }

    /// The mean frequency of the first spectral window [GHz].
    pub(crate) fn mean_freq_ghz(&self) -> f64 {
        let freqs = &self.spw_chan_freqs_hz[0];
        freqs.iter().sum::<f64>() / freqs.len() as f64 / 1e9
    }

    /// The observed frequency range [MHz]: the first channel of the first
    /// window to the last channel of the last window.
    pub(crate) fn freq_range_mhz(&self) -> (f64, f64) {
        let first = &self.spw_chan_freqs_hz[0];
        let last = &self.spw_chan_freqs_hz[self.spw_chan_freqs_hz.len() - 1];
        (first[0] / 1e6, last[last.len() - 1] / 1e6)
    }

    /// Is the reference antenna present? Accepts an antenna name or an
    /// antenna index as digits.
    pub(crate) fn has_antenna(&self, refant: &str) -> bool {
        match refant.parse::<usize>() {
            Ok(i) => i < self.antenna_names.len(),
            Err(_) => self.antenna_names.iter().any(|n| n == refant),
        }
    }
}
