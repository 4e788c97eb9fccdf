// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all crosscal-related errors. This should be the *only*
//! error enum that is publicly visible.

use thiserror::Error;

use crate::bookkeeping::BookkeepingError;
use crate::casa::CasaError;
use crate::config::ConfigError;
use crate::ms::MsMetaError;
use crate::params::StageError;

/// The *only* publicly visible error from crosscal.
#[derive(Error, Debug)]
pub enum CrosscalError {
    /// An error related to the pipeline config file.
    #[error("{0}")]
    Config(String),

    /// An error related to field-role or calibration-table bookkeeping.
    #[error("{0}")]
    Bookkeeping(String),

    /// An error related to measurement-set metadata.
    #[error("{0}")]
    Ms(String),

    /// An error related to invoking CASA.
    #[error("{0}")]
    Casa(String),

    /// An error related to argument files.
    #[error("{0}")]
    ArgFile(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

impl From<ConfigError> for CrosscalError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<BookkeepingError> for CrosscalError {
    fn from(e: BookkeepingError) -> Self {
        let s = e.to_string();
        match e {
            BookkeepingError::Config(_) => Self::Config(s),
            _ => Self::Bookkeeping(s),
        }
    }
}

impl From<MsMetaError> for CrosscalError {
    fn from(e: MsMetaError) -> Self {
        Self::Ms(e.to_string())
    }
}

impl From<CasaError> for CrosscalError {
    fn from(e: CasaError) -> Self {
        Self::Casa(e.to_string())
    }
}

impl From<StageError> for CrosscalError {
    fn from(e: StageError) -> Self {
        let s = e.to_string();
        match e {
            StageError::Config(_) | StageError::Spw(_) => Self::Config(s),
            StageError::Bookkeeping(BookkeepingError::Config(_)) => Self::Config(s),
            StageError::Bookkeeping(_) => Self::Bookkeeping(s),
            StageError::Ms(_) | StageError::NoFluxIntent { .. } => Self::Ms(s),
            StageError::Casa(_) => Self::Casa(s),
        }
    }
}

impl From<std::io::Error> for CrosscalError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
