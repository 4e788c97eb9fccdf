// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub(crate) enum BookkeepingError {
    #[error("Key '{key}' in section [fields] is empty. Edit the config or run build-config again to set it from the dataset's scan intents.")]
    EmptyRole { key: &'static str },

    #[error("Key '{key}' in section [fields] must name exactly one field, but is set to '{value}'")]
    MultipleFields { key: &'static str, value: String },

    #[error("Couldn't derive a base name from dataset path '{0}'")]
    BadDatasetPath(PathBuf),

    #[error("Expected calibration table '{0}' does not exist. The calibration call that should have produced it has most likely failed; check the CASA logs under logs/ before rerunning this stage.")]
    MissingTable(PathBuf),

    #[error("When preparing calibration directory '{path}': {err}")]
    CaldirIo { path: PathBuf, err: std::io::Error },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
