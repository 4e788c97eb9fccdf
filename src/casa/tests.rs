// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serial_test::serial;

use super::*;
use crate::config::Value;

#[test]
fn task_calls_render_as_python() {
    let call = TaskCall::new("gaincal")
        .arg("vis", "raw.ms")
        .arg("caltable", "caltables/raw.kcal")
        .arg("gaintype", "K")
        .arg("solint", "inf")
        .arg("minblperant", 4_i64)
        .arg("solnorm", false)
        .arg("parang", false);
    assert_eq!(
        call.python(),
        "gaincal(vis='raw.ms', caltable='caltables/raw.kcal', gaintype='K', solint='inf', \
         minblperant=4, solnorm=False, parang=False)"
    );
}

#[test]
fn list_arguments_render_as_python_lists() {
    let call = TaskCall::new("flagdata")
        .arg("vis", "raw.ms")
        .arg(
            "clipminmax",
            Value::List(vec![Value::Float(0.0), Value::Float(50.0)]),
        )
        .arg(
            "gaintable",
            Value::List(vec![Value::from("a.kcal"), Value::from("b.bcal")]),
        );
    assert_eq!(
        call.python(),
        "flagdata(vis='raw.ms', clipminmax=[0.0, 50.0], gaintable=['a.kcal', 'b.bcal'])"
    );
}

#[test]
fn imported_tasks_get_their_import_line() {
    let exe = CasaExe::new("casa");
    let call = TaskCall::new("xyamb")
        .import("casarecipes.almapolhelpers")
        .arg("xytab", "raw.xyambcal")
        .arg("xyout", "raw.xycal");
    let script = exe.script_for(&call);
    assert!(script.starts_with("from casatasks import *\n"));
    assert!(script.contains("from casarecipes.almapolhelpers import xyamb\n"));
    assert!(script.ends_with("xyamb(xytab='raw.xyambcal', xyout='raw.xycal')\n"));
}

#[test]
fn get_returns_the_last_relevant_argument() {
    let call = TaskCall::new("setjy").arg("field", "1934-638");
    assert_eq!(call.get("field"), Some(&Value::from("1934-638")));
    assert_eq!(call.get("spw"), None);
}

#[test]
#[serial]
fn casa_log_files_are_named_from_scheduler_variables() {
    std::env::set_var("SLURM_JOB_NAME", "xx_yy_solve");
    std::env::set_var("SLURM_JOB_ID", "123456");
    let path = job_log_path();
    assert_eq!(path, Path::new("logs/xx_yy_solve-123456.casa"));
    std::env::remove_var("SLURM_JOB_NAME");
    std::env::remove_var("SLURM_JOB_ID");

    // Without the scheduler, fall back to something process-unique.
    let path = job_log_path();
    let s = path.display().to_string();
    assert!(s.starts_with("logs/crosscal-"));
    assert!(s.ends_with(".casa"));
}

#[test]
fn the_recorder_creates_expected_outputs() {
    let dir = tempfile::TempDir::new().unwrap();
    let caltable = dir.path().join("raw.kcal");
    let casa = mock::RecordingCasa::new();
    casa.run_task(
        &TaskCall::new("gaincal")
            .arg("vis", "raw.ms")
            .arg("caltable", &caltable),
    )
    .unwrap();
    assert!(caltable.is_dir());
    assert_eq!(casa.task_names(), ["gaincal"]);
}
