// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A recording stand-in for CASA, for testing stage logic.

use std::fs;
use std::sync::Mutex;

use crate::config::Value;

use super::{CasaError, CasaTasks, TaskCall};

/// Argument names whose values are paths the task is expected to produce. The
/// recorder creates them as empty directories (CASA tables are directories)
/// so the stages' artifact checks behave as they would after a real run.
const OUTPUT_KEYS: [&str; 4] = ["caltable", "fluxtable", "outputvis", "xyout"];

#[derive(Debug, Default)]
pub(crate) struct RecordingCasa {
    pub(crate) calls: Mutex<Vec<TaskCall>>,
}

impl RecordingCasa {
    pub(crate) fn new() -> RecordingCasa {
        RecordingCasa::default()
    }

    pub(crate) fn task_names(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|c| c.task).collect()
    }

    pub(crate) fn call(&self, index: usize) -> TaskCall {
        self.calls.lock().unwrap()[index].clone()
    }

    pub(crate) fn find(&self, task: &str) -> Option<TaskCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.task == task)
            .cloned()
    }
}

impl CasaTasks for RecordingCasa {
    fn run_task(&self, call: &TaskCall) -> Result<(), CasaError> {
        for key in OUTPUT_KEYS {
            if let Some(Value::Str(path)) = call.get(key) {
                let _ = fs::create_dir_all(path);
            }
        }
        self.calls.lock().unwrap().push(call.clone());
        Ok(())
    }
}
