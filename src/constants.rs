// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.
 */

/// The default name of the pipeline config file.
pub(crate) const DEFAULT_CONFIG: &str = "crosscal.ini";

/// The name of the per-run calibration-table directory.
pub(crate) const CALDIR_NAME: &str = "caltables";

/// Appended to the calibration-table directory when it is rotated out of the
/// way by a later run.
pub(crate) const ROUND1_SUFFIX: &str = "_round1";

/// Where CASA log files are written.
pub(crate) const LOG_DIR: &str = "logs";

/// The minimum parallactic-angle swing of the phase calibrator needed for
/// polarisation calibration to have a chance of succeeding [degrees].
pub(crate) const MIN_PARANG_COVERAGE_DEG: f64 = 30.0;

/// Polarisation calibration needs all four correlation products.
pub(crate) const MIN_POL_CORRELATIONS: usize = 4;

/// The default reference antenna (a typically-healthy MeerKAT antenna).
pub(crate) const DEFAULT_REFANT: &str = "m005";

/// The default flux-density standard passed to setjy.
pub(crate) const DEFAULT_STANDARD: &str = "Stevens-Reynolds 2016";

/// The default spectral-window selection (the usable MeerKAT L band).
pub(crate) const DEFAULT_SPW: &str = "*:880~1680MHz";

/// The default minimum number of baselines per antenna for a solution.
pub(crate) const DEFAULT_MINBASELINES: i64 = 4;

/// Names under which the southern flux calibrator J0408-6545 appears. It is
/// not in the CASA flux-density standards, so it gets a manual model.
pub(crate) const J0408_NAMES: [&str; 2] = ["J0408-6545", "0408-6545"];

/// Stokes I flux density of the J0408-6545 manual model [Jy].
pub(crate) const J0408_STOKES_I_JY: f64 = 17.066;

/// Spectral index of the J0408-6545 manual model.
pub(crate) const J0408_SPIX: f64 = -1.179;
