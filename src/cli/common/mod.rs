// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Arguments and helpers shared by the stage subcommands. Every stage reads
//! the same config file, owns it for the duration of the stage, and applies
//! whatever deltas its run produced.

mod printers;

pub(crate) use printers::{display_warnings, InfoPrinter, Warn};

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Args;
use itertools::Itertools;
use log::debug;
use serde::de::DeserializeOwned;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::CrosscalError;
use crate::casa::CasaExe;
use crate::config::{ConfigDelta, ConfigStore};
use crate::constants::DEFAULT_CONFIG;

lazy_static::lazy_static! {
    pub(super) static ref ARG_FILE_TYPES_COMMA_SEPARATED: String = ArgFileTypes::iter().join(", ");

    pub(super) static ref ARG_FILE_HELP: String =
        format!("All of the arguments may be specified in a file. Any CLI arguments override arguments set in the file. Supported formats: {}", *ARG_FILE_TYPES_COMMA_SEPARATED);
}

#[derive(Debug, Display, EnumIter, EnumString)]
pub(super) enum ArgFileTypes {
    #[strum(serialize = "toml")]
    Toml,

    #[strum(serialize = "json")]
    Json,
}

/// The one argument every stage takes: which config file to work against.
#[derive(Debug, Args)]
pub(super) struct StageArgs {
    /// Path to the pipeline config file.
    #[clap(short = 'C', long, default_value = DEFAULT_CONFIG)]
    pub(super) config: PathBuf,
}

impl StageArgs {
    /// Load and take ownership of the config file.
    pub(super) fn load(&self) -> Result<ConfigStore, CrosscalError> {
        Ok(ConfigStore::load(&self.config)?)
    }
}

/// The CASA invoker, with the executable name taken from the config when the
/// operator has set one.
pub(super) fn casa_from_store(store: &ConfigStore) -> Result<CasaExe, CrosscalError> {
    let exe = store.get_str_or("run", "casa", "casa")?;
    Ok(CasaExe::new(exe))
}

pub(super) fn apply_deltas(
    store: &mut ConfigStore,
    deltas: Vec<ConfigDelta>,
) -> Result<(), CrosscalError> {
    for delta in deltas {
        store.apply(delta)?;
    }
    Ok(())
}

/// Parse an argument file by its extension.
pub(super) fn unpack_arg_file<T: DeserializeOwned>(path: &Path) -> Result<T, CrosscalError> {
    debug!("Attempting to parse argument file {}", path.display());
    let arg_file_type = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .and_then(|e| e.parse::<ArgFileTypes>().ok());

    let mut contents = String::new();
    match arg_file_type {
        Some(ArgFileTypes::Toml) => {
            debug!("Parsing toml file...");
            let mut fh = File::open(path)?;
            fh.read_to_string(&mut contents)?;
            toml::from_str(&contents).map_err(|err| {
                CrosscalError::ArgFile(format!(
                    "Couldn't decode toml structure from {:?}:\n{err}",
                    path
                ))
            })
        }
        Some(ArgFileTypes::Json) => {
            debug!("Parsing json file...");
            let mut fh = File::open(path)?;
            fh.read_to_string(&mut contents)?;
            serde_json::from_str(&contents).map_err(|err| {
                CrosscalError::ArgFile(format!(
                    "Couldn't decode json structure from {:?}:\n{err}",
                    path
                ))
            })
        }
        None => Err(CrosscalError::ArgFile(format!(
            "Argument file '{:?}' doesn't have a recognised file extension! Valid extensions are: {}",
            path, *ARG_FILE_TYPES_COMMA_SEPARATED
        ))),
    }
}
