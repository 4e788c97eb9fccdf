// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading metadata out of CASA measurement sets.

use std::path::PathBuf;

use marlu::rubbl_casatables;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum MsMetaError {
    #[error("Supplied file path {0} does not exist or is not readable!")]
    BadFile(PathBuf),

    #[error("The main table of the measurement set contains no rows!")]
    MainTableEmpty,

    #[error("The antenna table of the measurement set contains no rows!")]
    AntennaTableEmpty,

    #[error("The SPECTRAL_WINDOW table contained no channel frequencies")]
    NoChannelFreqs,

    #[error("The POLARIZATION table contained no correlation types")]
    NoCorrTypes,

    #[error("Field {name} has a malformed DELAY_DIR entry")]
    BadDelayDir { name: String },

    #[error("Row {row} of the main table points at field {field_id}, but the FIELD table only has {num_fields} rows")]
    BadFieldId {
        row: usize,
        field_id: i32,
        num_fields: usize,
    },

    #[error("No field is named '{field}' in dataset '{vis}'. Fields present are: {available}")]
    UnknownField {
        field: String,
        vis: String,
        available: String,
    },

    #[error("Error when trying to interface with measurement set: {0}")]
    Table(#[from] rubbl_casatables::TableError),

    #[error("Error from casacore: {0}")]
    Casacore(#[from] rubbl_casatables::CasacoreError),
}
