// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum CasaError {
    #[error("Couldn't run CASA executable '{exe}': {err}. Set the 'casa' key in the [run] section if it isn't on your PATH.")]
    Spawn { exe: PathBuf, err: std::io::Error },

    #[error("CASA task {task} exited unsuccessfully{}. Check the CASA logs under logs/.", code.map(|c| format!(" (exit code {c})")).unwrap_or_default())]
    TaskFailed { task: &'static str, code: Option<i32> },

    #[error("IO error at '{path}': {err}")]
    Io { path: PathBuf, err: std::io::Error },
}
