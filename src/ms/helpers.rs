// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to help interface with CASA measurement sets.

use std::path::Path;

use hifitime::Epoch;
use marlu::rubbl_casatables;
use rubbl_casatables::{Table, TableOpenMode};

use super::error::MsMetaError;

/// Open a measurement set table read only. If `table` is `None`, then open the
/// base table.
pub(super) fn read_table(ms: &Path, table: Option<&str>) -> Result<Table, MsMetaError> {
    let t = Table::open(
        format!("{}/{}", ms.display(), table.unwrap_or("")),
        TableOpenMode::Read,
    )?;
    Ok(t)
}

/// Convert a casacore time to a `hifitime` [`Epoch`]. casacore stores times as
/// UTC seconds, but counted from the MJD epoch rather than hifitime's 1900.
pub(super) fn casacore_utc_to_epoch(utc_seconds: f64) -> Epoch {
    Epoch::from_utc_seconds(utc_seconds - hifitime::J1900_OFFSET * hifitime::SECONDS_PER_DAY)
}
