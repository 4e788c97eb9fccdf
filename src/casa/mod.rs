// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The seam to the CASA tasks.
//!
//! The numerical behaviour of the tasks is entirely CASA's business; this
//! module only knows how to describe a task call (a name plus literal keyword
//! arguments) and how to hand it to a CASA interpreter. Stages build
//! [`TaskCall`]s and run them through the [`CasaTasks`] trait, so tests can
//! substitute a recorder for the real interpreter.

mod error;
#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
mod tests;

pub(crate) use error::CasaError;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use itertools::Itertools;
use log::{debug, trace};

use crate::config::Value;
use crate::constants::LOG_DIR;

/// One CASA task invocation: the task name and its keyword arguments, in the
/// order they were supplied.
#[derive(Debug, Clone)]
pub(crate) struct TaskCall {
    pub(crate) task: &'static str,
    /// Import the task from this module instead of `casatasks` (e.g. xyamb
    /// lives in `casarecipes.almapolhelpers`).
    import: Option<&'static str>,
    args: Vec<(&'static str, Value)>,
}

impl TaskCall {
    pub(crate) fn new(task: &'static str) -> TaskCall {
        TaskCall {
            task,
            import: None,
            args: vec![],
        }
    }

    pub(crate) fn import(mut self, module: &'static str) -> TaskCall {
        self.import = Some(module);
        self
    }

    pub(crate) fn arg<V: Into<Value>>(mut self, key: &'static str, value: V) -> TaskCall {
        self.args.push((key, value.into()));
        self
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.args
            .iter()
            .find_map(|(k, v)| (*k == key).then_some(v))
    }

    /// The call as a line of Python. Config literals render identically in
    /// Python, so the [`Value`] display does all the work.
    pub(crate) fn python(&self) -> String {
        format!(
            "{}({})",
            self.task,
            self.args.iter().map(|(k, v)| format!("{k}={v}")).join(", ")
        )
    }
}

/// How a stage invokes CASA.
pub(crate) trait CasaTasks {
    fn run_task(&self, call: &TaskCall) -> Result<(), CasaError>;
}

/// Runs each task call in a fresh CASA interpreter process, the way the
/// pipeline's stages are batch-scheduled. The CASA log file is named from the
/// scheduler's environment variables so parallel jobs don't clobber each
/// other's logs.
#[derive(Debug)]
pub(crate) struct CasaExe {
    exe: PathBuf,
    casa_log: PathBuf,
}

impl CasaExe {
    pub(crate) fn new<P: Into<PathBuf>>(exe: P) -> CasaExe {
        CasaExe {
            exe: exe.into(),
            casa_log: job_log_path(),
        }
    }

    fn script_for(&self, call: &TaskCall) -> String {
        let mut script = String::from("from casatasks import *\n");
        script.push_str(&format!(
            "casalog.setlogfile('{}')\n",
            self.casa_log.display()
        ));
        if let Some(module) = call.import {
            script.push_str(&format!("from {module} import {}\n", call.task));
        }
        script.push_str(&call.python());
        script.push('\n');
        script
    }
}

/// `logs/<job-name>-<job-id>.casa`, with the names coming from the scheduler
/// when it provides them.
fn job_log_path() -> PathBuf {
    let name = env::var("SLURM_JOB_NAME").unwrap_or_else(|_| "crosscal".to_string());
    let id = env::var("SLURM_JOB_ID").unwrap_or_else(|_| std::process::id().to_string());
    Path::new(LOG_DIR).join(format!("{name}-{id}.casa"))
}

impl CasaTasks for CasaExe {
    fn run_task(&self, call: &TaskCall) -> Result<(), CasaError> {
        fs::create_dir_all(LOG_DIR).map_err(|err| CasaError::Io {
            path: PathBuf::from(LOG_DIR),
            err,
        })?;

        let script = self.script_for(call);
        trace!("CASA script:\n{script}");
        let script_path = env::temp_dir().join(format!(
            "crosscal-{}-{}.py",
            call.task,
            std::process::id()
        ));
        fs::write(&script_path, &script).map_err(|err| CasaError::Io {
            path: script_path.clone(),
            err,
        })?;

        debug!("Running {} via '{}'", call.task, self.exe.display());
        let status = Command::new(&self.exe)
            .args(["--nologger", "--nogui", "--agg", "-c"])
            .arg(&script_path)
            .status()
            .map_err(|err| CasaError::Spawn {
                exe: self.exe.clone(),
                err,
            })?;
        let _ = fs::remove_file(&script_path);

        if status.success() {
            Ok(())
        } else {
            Err(CasaError::TaskFailed {
                task: call.task,
                code: status.code(),
            })
        }
    }
}
