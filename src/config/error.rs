// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum ConfigError {
    #[error("Couldn't read config file '{path}': {err}. Run build-config to create one.")]
    Read { path: PathBuf, err: std::io::Error },

    #[error("Config file '{path}' is already owned by another process (lock file '{lock}' exists). Only one stage may run against a config file at a time; if no other stage is running, remove the lock file.")]
    Locked { path: PathBuf, lock: PathBuf },

    #[error("Cannot parse the value of key '{key}' in section [{section}] of '{path}', which is currently set to {raw}. Ensure strings are in 'quotes'.")]
    BadLiteral {
        section: String,
        key: String,
        raw: String,
        path: PathBuf,
    },

    #[error("Line {line} of '{path}' is neither a [section] header nor a 'key = value' line: {raw}")]
    BadLine {
        line: usize,
        raw: String,
        path: PathBuf,
    },

    #[error("Section [{section}] appears more than once in '{path}'")]
    DuplicateSection { section: String, path: PathBuf },

    #[error("Key '{key}' appears more than once in section [{section}] of '{path}'")]
    DuplicateKey {
        section: String,
        key: String,
        path: PathBuf,
    },

    #[error("Config file '{path}' has no section [{section}]. Run build-config again to rebuild it.")]
    MissingSection { section: String, path: PathBuf },

    #[error("Section [{section}] of '{path}' has no key '{key}'. Run build-config again to rebuild it.")]
    MissingKey {
        section: String,
        key: String,
        path: PathBuf,
    },

    #[error("Expected key '{key}' in section [{section}] to be {expected}, but it is set to {value}")]
    Coerce {
        section: String,
        key: String,
        expected: String,
        value: String,
    },

    #[error("Couldn't write config file '{path}': {err}")]
    Write { path: PathBuf, err: std::io::Error },
}
