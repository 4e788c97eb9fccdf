// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Cross-calibration pipeline orchestration for MeerKAT and ATA measurement sets.

The numerically hard work (gain solving, bandpass fitting, flagging) is
delegated to the CASA tasks; this crate owns the bookkeeping around them: the
pipeline config file, field-role and calibration-table derivation, the fixed
stage order, and the small geometry/model helpers the stages need.
 */

mod bookkeeping;
mod casa;
mod cli;
mod config;
mod constants;
mod math;
mod ms;
mod parang;
mod params;
mod pipeline;
mod polmodel;

pub use cli::{Crosscal, CrosscalError};
