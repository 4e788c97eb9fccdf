// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use indoc::indoc;
use tempfile::TempDir;

use super::*;

fn store_with_fields(dir: &TempDir, fields: &str) -> ConfigStore {
    let path = dir.path().join("test.ini");
    std::fs::write(&path, fields).unwrap();
    ConfigStore::load(&path).unwrap()
}

#[test]
fn roles_resolve_from_a_complete_fields_section() {
    let dir = TempDir::new().unwrap();
    let store = store_with_fields(
        &dir,
        indoc! {"
            [fields]
            fluxfield = '1934-638'
            bpassfield = '1934-638'
            phasecalfield = 'J0240-2309'
            targetfields = 'NGC1365,NGC1808'
            extrafields = '3C286'
        "},
    );
    let roles = FieldRoles::from_config(&store).unwrap();
    assert_eq!(roles.flux, "1934-638");
    assert_eq!(roles.bandpass, "1934-638");
    assert_eq!(roles.secondary, "J0240-2309");
    assert_eq!(
        roles.targets.as_slice(),
        ["NGC1365".to_string(), "NGC1808".to_string()]
    );
    assert_eq!(roles.extras, vec!["3C286".to_string()]);

    assert_eq!(roles.gainfields(), "1934-638,J0240-2309");
    assert!(roles.bootstrap_fluxscale());
    assert_eq!(
        roles.secondary_and_targets(),
        "J0240-2309,NGC1365,NGC1808,3C286"
    );
    assert_eq!(
        roles.all_fields(),
        "1934-638,J0240-2309,NGC1365,NGC1808,3C286"
    );
}

#[test]
fn empty_fluxfield_fails_naming_the_key() {
    let dir = TempDir::new().unwrap();
    let store = store_with_fields(
        &dir,
        indoc! {"
            [fields]
            fluxfield = ''
            bpassfield = '1934-638'
            phasecalfield = '1934-638'
            targetfields = 'NGC1365'
        "},
    );
    let err = FieldRoles::from_config(&store).unwrap_err();
    assert!(matches!(
        err,
        BookkeepingError::EmptyRole { key: "fluxfield" }
    ));
    assert!(err.to_string().contains("fluxfield"));
}

#[test]
fn multiple_flux_fields_are_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store_with_fields(
        &dir,
        indoc! {"
            [fields]
            fluxfield = '1934-638,0408-6545'
            bpassfield = ''
            phasecalfield = ''
            targetfields = 'NGC1365'
        "},
    );
    let err = FieldRoles::from_config(&store).unwrap_err();
    assert!(matches!(err, BookkeepingError::MultipleFields { .. }));
}

#[test]
fn empty_secondary_roles_fall_back_to_the_flux_calibrator() {
    let dir = TempDir::new().unwrap();
    let store = store_with_fields(
        &dir,
        indoc! {"
            [fields]
            fluxfield = '1934-638'
            bpassfield = ''
            phasecalfield = ''
            targetfields = 'NGC1365'
        "},
    );
    let roles = FieldRoles::from_config(&store).unwrap();
    assert_eq!(roles.bandpass, "1934-638");
    assert_eq!(roles.secondary, "1934-638");
    assert_eq!(roles.gainfields(), "1934-638");
    assert!(!roles.bootstrap_fluxscale());
}

#[test]
fn extras_are_deduplicated_against_every_other_role() {
    let dir = TempDir::new().unwrap();
    let store = store_with_fields(
        &dir,
        indoc! {"
            [fields]
            fluxfield = '1934-638'
            bpassfield = '1934-638'
            phasecalfield = 'J0240-2309'
            targetfields = 'NGC1365'
            extrafields = '1934-638,J0240-2309,NGC1365,3C286,3C286'
        "},
    );
    let roles = FieldRoles::from_config(&store).unwrap();
    assert_eq!(roles.extras, vec!["3C286".to_string()]);
}

#[test]
fn missing_fields_section_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let store = store_with_fields(&dir, "[data]\nvis = 'raw.ms'\n");
    let err = FieldRoles::from_config(&store).unwrap_err();
    assert!(matches!(err, BookkeepingError::Config(_)));
}

#[test]
fn caltable_paths_derive_from_the_dataset_base_name() {
    let tables = CalTables::new(
        Path::new("/data/1538856059.880~1680MHz.ms"),
        Path::new("caltables"),
    )
    .unwrap();
    assert_eq!(
        tables.kcorr,
        Path::new("caltables/1538856059.880~1680MHz.kcal")
    );
    assert_eq!(
        tables.bpass,
        Path::new("caltables/1538856059.880~1680MHz.bcal")
    );
    assert_eq!(
        tables.gain,
        Path::new("caltables/1538856059.880~1680MHz.gcal")
    );
    assert_eq!(
        tables.flux,
        Path::new("caltables/1538856059.880~1680MHz.fluxscale")
    );
    assert_eq!(
        tables.dpol,
        Path::new("caltables/1538856059.880~1680MHz.dcal")
    );
    assert_eq!(
        tables.xy,
        Path::new("caltables/1538856059.880~1680MHz.xycal")
    );
}

#[test]
fn fluxscale_table_is_only_used_when_bootstrapping() {
    let dir = TempDir::new().unwrap();
    let store = store_with_fields(
        &dir,
        indoc! {"
            [fields]
            fluxfield = '1934-638'
            bpassfield = ''
            phasecalfield = 'J0240-2309'
            targetfields = 'NGC1365'
        "},
    );
    let roles = FieldRoles::from_config(&store).unwrap();
    let tables = CalTables::new(Path::new("raw.ms"), Path::new("caltables")).unwrap();
    assert_eq!(tables.fluxscale_or_gain(&roles), tables.flux.as_path());

    let mut roles = roles;
    roles.secondary = roles.flux.clone();
    assert_eq!(tables.fluxscale_or_gain(&roles), tables.gain.as_path());
}

#[test]
fn caldir_rotation_happens_exactly_once() {
    let dir = TempDir::new().unwrap();
    let caldir = dir.path().join("caltables");

    // No directory yet: created.
    assert_eq!(prepare_caldir(&caldir).unwrap(), CaldirState::Created);
    assert!(caldir.is_dir());

    // Leave evidence of the first run behind.
    std::fs::write(caldir.join("old.bcal"), b"tables").unwrap();

    // Second run: the old directory is rotated aside, a fresh one created,
    // and nothing is lost.
    assert_eq!(prepare_caldir(&caldir).unwrap(), CaldirState::Rotated);
    let round1 = dir.path().join("caltables_round1");
    assert!(round1.is_dir());
    assert!(round1.join("old.bcal").exists());
    assert!(caldir.is_dir());
    assert!(!caldir.join("old.bcal").exists());

    // Third run: the rotated sibling already exists, so no further rotation.
    std::fs::write(caldir.join("new.bcal"), b"tables").unwrap();
    assert_eq!(prepare_caldir(&caldir).unwrap(), CaldirState::Reused);
    assert!(caldir.join("new.bcal").exists());
    assert!(round1.join("old.bcal").exists());
}

#[test]
fn verify_table_reports_missing_artifacts() {
    let dir = TempDir::new().unwrap();
    let table = dir.path().join("raw.bcal");
    let err = verify_table(&table).unwrap_err();
    assert!(matches!(err, BookkeepingError::MissingTable(_)));
    assert!(err.to_string().contains("raw.bcal"));

    // CASA tables are directories; a directory satisfies the check.
    std::fs::create_dir(&table).unwrap();
    verify_table(&table).unwrap();
}

#[test]
fn pol_calibrator_prefers_3c286_then_3c138() {
    let names = ["NGC1365", "J0521+1638", "J1331+3030"];
    let (cal, name) = pol_calibrator(names).unwrap();
    assert_eq!(cal, PolCalibrator::ThreeC286);
    assert_eq!(name, "J1331+3030");

    let names = ["NGC1365", "0521+166"];
    let (cal, name) = pol_calibrator(names).unwrap();
    assert_eq!(cal, PolCalibrator::ThreeC138);
    assert_eq!(name, "0521+166");

    assert!(pol_calibrator(["NGC1365", "J0240-2309"]).is_none());
}
