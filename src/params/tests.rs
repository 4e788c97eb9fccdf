// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use indoc::formatdoc;
use tempfile::TempDir;
use vec1::vec1;

use super::*;
use crate::bookkeeping::FieldRoles;
use crate::casa::mock::RecordingCasa;
use crate::config::Value;
use crate::polmodel::PolCalibrator;

/// A config file for a dataset living in `dir`, as build-config would write
/// it.
fn write_store(dir: &TempDir, dopol: bool) -> ConfigStore {
    let vis = dir.path().join("1538856059.ms");
    let path = dir.path().join("crosscal.ini");
    std::fs::write(
        &path,
        formatdoc! {"
            [data]
            vis = '{vis}'

            [fields]
            fluxfield = '1934-638'
            bpassfield = '1934-638'
            phasecalfield = 'J0240-2309'
            targetfields = 'NGC1365'
            extrafields = ''

            [crosscal]
            refant = 'm005'
            standard = 'Stevens-Reynolds 2016'
            minbaselines = 4
            chanbin = 1
            spw = '*:880~1680MHz'
            createmms = True
            badants = ['m035']
            badfreqranges = ['944~947MHz', '1160~1310MHz']

            [run]
            dopol = {dopol}
            ",
            vis = vis.display(),
            dopol = if dopol { "True" } else { "False" },
        },
    )
    .unwrap();
    ConfigStore::load(&path).unwrap()
}

fn test_roles() -> FieldRoles {
    FieldRoles {
        flux: "1934-638".to_string(),
        bandpass: "1934-638".to_string(),
        secondary: "J0240-2309".to_string(),
        targets: vec1!["NGC1365".to_string()],
        extras: vec![],
    }
}

#[test]
fn partition_writes_the_new_dataset_paths_back() {
    let dir = TempDir::new().unwrap();
    let vis = dir.path().join("1538856059.ms");
    let params = PartitionParams {
        vis: vis.clone(),
        spw: "*:880~1680MHz".to_string(),
        spw_label: "880~1680MHz".to_string(),
        chanbin: 1,
        include_crosshand: false,
        createmms: true,
        num_scans: 12,
    };
    let casa = RecordingCasa::new();
    let deltas = params.run(&casa).unwrap();

    assert_eq!(casa.task_names(), ["mstransform"]);
    let call = casa.call(0);
    let expected_out = dir.path().join("1538856059.880~1680MHz.mms");
    assert_eq!(call.get("outputvis"), Some(&Value::from(&expected_out)));
    assert_eq!(call.get("correlation"), Some(&Value::from("XX,YY")));
    assert_eq!(call.get("numsubms"), Some(&Value::Int(12)));
    assert_eq!(call.get("chanaverage"), Some(&Value::Bool(false)));

    assert_eq!(deltas.len(), 2);
    assert_eq!(deltas[0].section, "data");
    assert_eq!(deltas[0].values["vis"], Value::from(&expected_out));
    assert_eq!(deltas[1].section, "run");
    assert_eq!(deltas[1].values["orig_vis"], Value::from(&vis));
}

#[test]
fn partition_keeps_cross_hands_only_for_polarisation() {
    let dir = TempDir::new().unwrap();
    let params = PartitionParams {
        vis: dir.path().join("raw.ms"),
        spw: "*:880~1680MHz".to_string(),
        spw_label: "880~1680MHz".to_string(),
        chanbin: 4,
        include_crosshand: true,
        createmms: false,
        num_scans: 12,
    };
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();
    let call = casa.call(0);
    assert_eq!(call.get("correlation"), Some(&Value::from("")));
    assert_eq!(call.get("chanaverage"), Some(&Value::Bool(true)));
    // A plain MS keeps a single sub-MS.
    assert_eq!(call.get("numsubms"), Some(&Value::Int(1)));
    let out = dir.path().join("raw.880~1680MHz.ms");
    assert_eq!(call.get("outputvis"), Some(&Value::from(&out)));
}

#[test]
fn flag_round_1_runs_the_full_sequence() {
    let dir = TempDir::new().unwrap();
    let store = write_store(&dir, false);
    let params = FlagParams::from_store(&store, FlagRound::One).unwrap();
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();

    // Bad freqs, bad ants, autocorrelations, clip, two tfcrops, extend,
    // summary.
    assert_eq!(casa.task_names().len(), 8);
    assert!(casa.task_names().iter().all(|t| *t == "flagdata"));

    let badfreq = casa.call(0);
    assert_eq!(
        badfreq.get("spw"),
        Some(&Value::from("*:944~947MHz,*:1160~1310MHz"))
    );
    let badants = casa.call(1);
    assert_eq!(badants.get("antenna"), Some(&Value::from("m035")));

    let clip = casa.call(3);
    assert_eq!(clip.get("mode"), Some(&Value::from("clip")));
    assert_eq!(
        clip.get("field"),
        Some(&Value::from("1934-638,J0240-2309,NGC1365"))
    );

    let cal_tfcrop = casa.call(4);
    assert_eq!(cal_tfcrop.get("timefit"), Some(&Value::from("line")));
    assert_eq!(cal_tfcrop.get("field"), Some(&Value::from("1934-638,J0240-2309")));
    let target_tfcrop = casa.call(5);
    assert_eq!(target_tfcrop.get("timefit"), Some(&Value::from("poly")));
    assert_eq!(target_tfcrop.get("field"), Some(&Value::from("NGC1365")));
}

#[test]
fn flag_round_1_skips_absent_manual_flags() {
    let dir = TempDir::new().unwrap();
    let vis = dir.path().join("raw.ms");
    let params = FlagParams {
        vis,
        round: FlagRound::One,
        all_fields: "a,b".to_string(),
        cal_fields: "a".to_string(),
        target_fields: "b".to_string(),
        bad_freq_ranges: vec![],
        bad_ants: vec![],
    };
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();
    assert_eq!(casa.task_names().len(), 6);
}

#[test]
fn flag_round_2_works_on_corrected_data() {
    let dir = TempDir::new().unwrap();
    let store = write_store(&dir, false);
    let params = FlagParams::from_store(&store, FlagRound::Two).unwrap();
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();

    // Two tfcrops, rflag, extend, summary.
    assert_eq!(casa.task_names().len(), 5);
    let tfcrop = casa.call(0);
    assert_eq!(tfcrop.get("datacolumn"), Some(&Value::from("corrected")));
    let rflag = casa.call(2);
    assert_eq!(rflag.get("mode"), Some(&Value::from("rflag")));
    assert_eq!(rflag.get("datacolumn"), Some(&Value::from("corrected")));
}

#[test]
fn flux_scale_uses_the_configured_standard() {
    let dir = TempDir::new().unwrap();
    let params = FluxScaleParams {
        vis: dir.path().join("raw.ms"),
        spw: "*:880~1680MHz".to_string(),
        standard: "Stevens-Reynolds 2016".to_string(),
        dopol: false,
        flux_field: "1934-638".to_string(),
        field_names: vec!["1934-638".to_string(), "NGC1365".to_string()],
        mean_freq_ghz: 1.28,
    };
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();
    assert_eq!(casa.task_names(), ["delmod", "setjy"]);
    let setjy = casa.call(1);
    assert_eq!(
        setjy.get("standard"),
        Some(&Value::from("Stevens-Reynolds 2016"))
    );
    assert_eq!(setjy.get("field"), Some(&Value::from("1934-638")));
}

#[test]
fn flux_scale_uses_the_manual_model_for_j0408() {
    let dir = TempDir::new().unwrap();
    let params = FluxScaleParams {
        vis: dir.path().join("raw.ms"),
        spw: "*:880~1680MHz".to_string(),
        standard: "Stevens-Reynolds 2016".to_string(),
        dopol: false,
        // A field index referring to J0408-6545.
        flux_field: "0".to_string(),
        field_names: vec!["J0408-6545".to_string(), "NGC1365".to_string()],
        mean_freq_ghz: 1.28,
    };
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();
    let setjy = casa.call(1);
    assert_eq!(setjy.get("standard"), Some(&Value::from("manual")));
    assert_eq!(setjy.get("field"), Some(&Value::from("J0408-6545")));
    match setjy.get("fluxdensity") {
        Some(Value::List(elems)) => assert_eq!(elems[0], Value::Float(17.066)),
        other => panic!("unexpected fluxdensity {other:?}"),
    }
}

#[test]
fn flux_scale_sets_polarised_models_when_dopol() {
    let dir = TempDir::new().unwrap();
    let params = FluxScaleParams {
        vis: dir.path().join("raw.ms"),
        spw: "*:880~1680MHz".to_string(),
        standard: "Stevens-Reynolds 2016".to_string(),
        dopol: true,
        flux_field: "1934-638".to_string(),
        field_names: vec![
            "1934-638".to_string(),
            "J1331+3030".to_string(),
            "NGC1365".to_string(),
        ],
        mean_freq_ghz: 1.28,
    };
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();
    assert_eq!(casa.task_names(), ["delmod", "setjy", "setjy"]);
    let pol_setjy = casa.call(2);
    assert_eq!(pol_setjy.get("field"), Some(&Value::from("J1331+3030")));
    let polindex = match pol_setjy.get("polindex") {
        Some(Value::List(elems)) => match elems[0] {
            Value::Float(f) => f,
            _ => panic!("polindex not a float"),
        },
        other => panic!("unexpected polindex {other:?}"),
    };
    let (expected, _) = PolCalibrator::ThreeC286.linear_pol_model(1.28);
    assert_abs_diff_eq!(polindex, expected, epsilon = 1e-12);
    assert!((0.05..0.12).contains(&polindex));
}

#[test]
fn solve_produces_all_parallel_hand_tables() {
    let dir = TempDir::new().unwrap();
    let store = write_store(&dir, false);
    let params = SolveParams::from_store(&store).unwrap();
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();

    assert_eq!(
        casa.task_names(),
        ["gaincal", "bandpass", "gaincal", "fluxscale"]
    );
    let kcorr = casa.call(0);
    assert_eq!(kcorr.get("gaintype"), Some(&Value::from("K")));
    let expected_kcal = dir.path().join("caltables/1538856059.kcal");
    assert_eq!(kcorr.get("caltable"), Some(&Value::from(&expected_kcal)));
    assert!(expected_kcal.is_dir(), "the recorder creates the product");

    let gains = casa.call(2);
    assert_eq!(gains.get("field"), Some(&Value::from("1934-638,J0240-2309")));

    let fluxscale = casa.call(3);
    assert_eq!(
        fluxscale.get("fluxtable"),
        Some(&Value::from(&dir.path().join("caltables/1538856059.fluxscale")))
    );
}

#[test]
fn solve_skips_fluxscale_without_a_distinct_secondary() {
    let dir = TempDir::new().unwrap();
    let vis = dir.path().join("raw.ms");
    let mut roles = test_roles();
    roles.secondary = roles.flux.clone();
    let params = SolveParams {
        vis: vis.clone(),
        roles,
        tables: caltables_for(&vis).unwrap(),
        refant: "m005".to_string(),
        minbaselines: 4,
    };
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();
    assert_eq!(casa.task_names(), ["gaincal", "bandpass", "gaincal"]);
}

#[test]
fn apply_uses_the_fluxscale_table_when_bootstrapping() {
    let dir = TempDir::new().unwrap();
    let vis = dir.path().join("raw.ms");
    let params = ApplyParams {
        vis: vis.clone(),
        roles: test_roles(),
        tables: caltables_for(&vis).unwrap(),
    };
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();

    assert_eq!(casa.task_names(), ["applycal", "applycal"]);
    let flux_apply = casa.call(0);
    match flux_apply.get("gaintable") {
        Some(Value::List(tables)) => {
            assert_eq!(tables.len(), 3);
            assert_eq!(
                tables[2],
                Value::from(&dir.path().join("caltables/raw.fluxscale"))
            );
        }
        other => panic!("unexpected gaintable {other:?}"),
    }
    let rest_apply = casa.call(1);
    assert_eq!(
        rest_apply.get("field"),
        Some(&Value::from("J0240-2309,NGC1365"))
    );
}

#[test]
fn pol_solve_resolves_the_ambiguity_with_a_known_calibrator() {
    let dir = TempDir::new().unwrap();
    let vis = dir.path().join("raw.ms");
    let params = PolSolveParams {
        vis: vis.clone(),
        roles: test_roles(),
        tables: caltables_for(&vis).unwrap(),
        refant: "m005".to_string(),
        minbaselines: 4,
        pol_field: "J1331+3030".to_string(),
        known_pol: Some(PolCalibrator::ThreeC286),
        mean_freq_ghz: 1.28,
    };
    assert!(params.resolves_ambiguity());
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();

    let names = casa.task_names();
    // bandpass, rflag, polcal, rflag, gaincal, gaincal (pol append), rflag,
    // rmtables, fluxscale, gaincal (XYf+QU), xyamb, rflag.
    assert_eq!(
        names,
        [
            "bandpass", "flagdata", "polcal", "flagdata", "gaincal", "gaincal", "flagdata",
            "rmtables", "fluxscale", "gaincal", "xyamb", "flagdata",
        ]
    );

    let polcal = casa.find("polcal").unwrap();
    assert_eq!(polcal.get("poltype"), Some(&Value::from("Dflls")));

    let xy_solve = casa.call(9);
    assert_eq!(xy_solve.get("gaintype"), Some(&Value::from("XYf+QU")));
    assert_eq!(
        xy_solve.get("caltable"),
        Some(&Value::from(&dir.path().join("caltables/raw.xyambcal")))
    );

    let xyamb = casa.find("xyamb").unwrap();
    assert_eq!(
        xyamb.get("xyout"),
        Some(&Value::from(&dir.path().join("caltables/raw.xycal")))
    );
    let (q, u) = PolCalibrator::ThreeC286.predicted_qu(1.28);
    match xyamb.get("qu") {
        Some(Value::List(qu)) => {
            assert_eq!(qu[0], Value::Float(q));
            assert_eq!(qu[1], Value::Float(u));
        }
        other => panic!("unexpected qu {other:?}"),
    }
}

#[test]
fn pol_solve_without_a_known_calibrator_cannot_resolve_the_ambiguity() {
    let dir = TempDir::new().unwrap();
    let vis = dir.path().join("raw.ms");
    let params = PolSolveParams {
        vis: vis.clone(),
        roles: test_roles(),
        tables: caltables_for(&vis).unwrap(),
        refant: "m005".to_string(),
        minbaselines: 4,
        pol_field: "J0240-2309".to_string(),
        known_pol: None,
        mean_freq_ghz: 1.28,
    };
    assert!(!params.resolves_ambiguity());
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();

    let names = casa.task_names();
    assert!(!names.contains(&"xyamb"));
    // Without the known calibrator there's also no appended gain solve.
    assert_eq!(names.iter().filter(|n| **n == "gaincal").count(), 2);

    // The solve goes straight into the final table.
    let xy_solve = casa
        .calls
        .lock()
        .unwrap()
        .iter()
        .find(|c| c.get("gaintype") == Some(&Value::from("XYf+QU")))
        .cloned()
        .unwrap();
    assert_eq!(
        xy_solve.get("caltable"),
        Some(&Value::from(&dir.path().join("caltables/raw.xycal")))
    );
}

#[test]
fn pol_apply_includes_the_pol_calibrator_when_distinct() {
    let dir = TempDir::new().unwrap();
    let vis = dir.path().join("raw.ms");
    let params = PolApplyParams {
        vis: vis.clone(),
        roles: test_roles(),
        tables: caltables_for(&vis).unwrap(),
        pol_field: "J1331+3030".to_string(),
    };
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();
    assert_eq!(casa.task_names(), ["applycal", "applycal", "applycal"]);
    let pol_apply = casa.call(1);
    assert_eq!(pol_apply.get("field"), Some(&Value::from("J1331+3030")));
    assert_eq!(pol_apply.get("parang"), Some(&Value::Bool(true)));

    // With the secondary standing in as pol calibrator, only two applies.
    let params = PolApplyParams {
        vis: vis.clone(),
        roles: test_roles(),
        tables: caltables_for(&vis).unwrap(),
        pol_field: "J0240-2309".to_string(),
    };
    let casa = RecordingCasa::new();
    params.run(&casa).unwrap();
    assert_eq!(casa.task_names(), ["applycal", "applycal"]);
}

#[test]
fn split_records_the_calibrated_dataset() {
    let dir = TempDir::new().unwrap();
    let vis = dir.path().join("1538856059.880~1680MHz.mms");
    let params = SplitParams { vis: vis.clone() };
    let casa = RecordingCasa::new();
    let deltas = params.run(&casa).unwrap();

    let split = casa.call(0);
    assert_eq!(split.get("datacolumn"), Some(&Value::from("CORRECTED")));
    let expected = dir.path().join("1538856059.880~1680MHz_calibrated.ms");
    assert_eq!(split.get("outputvis"), Some(&Value::from(&expected)));
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].values["calibrated_vis"], Value::from(&expected));
}

#[test]
fn missing_artifacts_fail_the_stage() {
    // A CASA stand-in that claims success but produces nothing.
    struct SilentFailure;
    impl crate::casa::CasaTasks for SilentFailure {
        fn run_task(&self, _: &crate::casa::TaskCall) -> Result<(), crate::casa::CasaError> {
            Ok(())
        }
    }

    let dir = TempDir::new().unwrap();
    let store = write_store(&dir, false);
    let params = SolveParams::from_store(&store).unwrap();
    let err = params.run(&SilentFailure).unwrap_err();
    match err {
        StageError::Bookkeeping(e) => {
            assert!(e.to_string().contains("does not exist"), "{e}")
        }
        other => panic!("unexpected error {other:?}"),
    }
}
