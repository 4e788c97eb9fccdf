// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parsing of CASA spectral-window selection strings, e.g. `*:880~1680MHz` or
//! a comma-joined list of per-window ranges. A range without a unit selects
//! channel indices.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref SPW_RANGE: Regex =
        Regex::new(r"^(?:[^:]*:)?([0-9]+\.?[0-9]*)~([0-9]+\.?[0-9]*)([a-zA-Z]*)$")
            .expect("valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FreqUnit {
    Hz,
    KHz,
    MHz,
    GHz,
    /// No unit annotated; the bounds are channel indices.
    Channel,
}

impl FreqUnit {
    fn from_suffix(s: &str) -> Option<FreqUnit> {
        match s.to_ascii_lowercase().as_str() {
            "" => Some(FreqUnit::Channel),
            "hz" => Some(FreqUnit::Hz),
            "khz" => Some(FreqUnit::KHz),
            "mhz" => Some(FreqUnit::MHz),
            "ghz" => Some(FreqUnit::GHz),
            _ => None,
        }
    }

    fn to_mhz_factor(self) -> Option<f64> {
        match self {
            FreqUnit::Hz => Some(1e-6),
            FreqUnit::KHz => Some(1e-3),
            FreqUnit::MHz => Some(1.0),
            FreqUnit::GHz => Some(1e3),
            FreqUnit::Channel => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SpwRange {
    pub(crate) low: f64,
    pub(crate) high: f64,
    pub(crate) unit: FreqUnit,
}

impl SpwRange {
    pub(crate) fn low_mhz(&self) -> Option<f64> {
        Some(self.low * self.unit.to_mhz_factor()?)
    }

    pub(crate) fn high_mhz(&self) -> Option<f64> {
        Some(self.high * self.unit.to_mhz_factor()?)
    }

    /// Convert the bounds to MHz, resolving channel-index bounds against the
    /// supplied channel frequencies [Hz].
    pub(crate) fn bounds_mhz(&self, chan_freqs_hz: &[f64]) -> Result<(f64, f64), SpwError> {
        match self.unit.to_mhz_factor() {
            Some(factor) => Ok((self.low * factor, self.high * factor)),
            None => {
                let chan = |x: f64| -> Result<f64, SpwError> {
                    let i = x as usize;
                    chan_freqs_hz
                        .get(i)
                        .map(|f| f / 1e6)
                        .ok_or(SpwError::ChannelOutOfRange {
                            channel: i,
                            num_channels: chan_freqs_hz.len(),
                        })
                };
                Ok((chan(self.low)?, chan(self.high)?))
            }
        }
    }
}

#[derive(Error, Debug)]
pub(crate) enum SpwError {
    #[error("Couldn't parse '{0}' as a spectral-window range like '*:880~1680MHz'")]
    BadRange(String),

    #[error("Unrecognised frequency unit '{unit}' in spectral-window range '{raw}'")]
    BadUnit { raw: String, unit: String },

    #[error("Channel {channel} is outside the dataset's {num_channels} channels")]
    ChannelOutOfRange {
        channel: usize,
        num_channels: usize,
    },
}

/// Parse a (possibly comma-joined) spectral-window selection string.
pub(crate) fn parse_spw(spw: &str) -> Result<Vec<SpwRange>, SpwError> {
    spw.split(',')
        .map(|part| {
            let part = part.trim();
            let caps = SPW_RANGE
                .captures(part)
                .ok_or_else(|| SpwError::BadRange(part.to_string()))?;
            let low: f64 = caps[1]
                .parse()
                .map_err(|_| SpwError::BadRange(part.to_string()))?;
            let high: f64 = caps[2]
                .parse()
                .map_err(|_| SpwError::BadRange(part.to_string()))?;
            let unit = FreqUnit::from_suffix(&caps[3]).ok_or_else(|| SpwError::BadUnit {
                raw: part.to_string(),
                unit: caps[3].to_string(),
            })?;
            Ok(SpwRange { low, high, unit })
        })
        .collect()
}

/// Clamp a frequency range [MHz] to the dataset's observed range [MHz],
/// with 1 MHz of slack at either end. Returns the (possibly updated) CASA
/// selection string and whether anything was clamped.
pub(crate) fn clamp_spw_mhz(
    mut low_mhz: f64,
    mut high_mhz: f64,
    ms_low_mhz: f64,
    ms_high_mhz: f64,
) -> (String, bool) {
    let mut updated = false;
    if low_mhz < ms_low_mhz - 1.0 {
        low_mhz = ms_low_mhz.trunc();
        updated = true;
    }
    if high_mhz > ms_high_mhz + 1.0 {
        high_mhz = (ms_high_mhz + 0.5).round();
        updated = true;
    }
    (
        format!("*:{}~{}MHz", fmt_mhz(low_mhz), fmt_mhz(high_mhz)),
        updated,
    )
}

/// Format a frequency without a trailing ".0" when it's integral.
pub(crate) fn fmt_mhz(x: f64) -> String {
    if x.fract() == 0.0 {
        format!("{x:.0}")
    } else {
        format!("{x}")
    }
}
