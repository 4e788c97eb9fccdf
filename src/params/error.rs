// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::bookkeeping::BookkeepingError;
use crate::casa::CasaError;
use crate::config::{ConfigError, SpwError};
use crate::ms::MsMetaError;

#[derive(Error, Debug)]
pub(crate) enum StageError {
    #[error("You must have a field with intent CALIBRATE_FLUX. Only found intents [{intents}] in dataset '{vis}'.")]
    NoFluxIntent { vis: String, intents: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bookkeeping(#[from] BookkeepingError),

    #[error(transparent)]
    Ms(#[from] MsMetaError),

    #[error(transparent)]
    Casa(#[from] CasaError),

    #[error(transparent)]
    Spw(#[from] SpwError),
}
