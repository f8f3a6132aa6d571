use std::fs;

use pretty_assertions::assert_eq;
use scout_core::{LicenseType, TrialWindow};
use scout_engine::{
    ensure_store_dir, AtomicFileWriter, LocalStore, PremiumActivation, TrialRecord, STORE_FILE,
};
use tempfile::TempDir;

#[test]
fn creates_missing_store_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("state");
    assert!(!new_dir.exists());
    ensure_store_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("store.json", b"{}").unwrap();
    let second = writer.write("store.json", b"{\"a\":1}").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "{\"a\":1}");
}

#[test]
fn write_into_a_file_path_fails_cleanly() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("store.json", b"{}").is_err());
    assert!(!file_path.with_file_name("store.json").exists());
}

#[test]
fn fresh_store_has_scripts_enabled_and_nothing_else() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::open(temp.path());
    assert!(store.content_script_enabled());
    assert_eq!(store.premium(), None);
    assert_eq!(store.trial(), None);
    assert_eq!(store.user(), None);
    assert!(!store.path().exists());
}

#[test]
fn changes_survive_reopening() {
    let temp = TempDir::new().unwrap();
    let activation = PremiumActivation {
        license_key: "KEY".into(),
        instance_id: "inst".into(),
        license_type: LicenseType::Onetime,
    };
    let trial = TrialRecord {
        contact_id: "c-1".into(),
        window: TrialWindow {
            started_at: "2026-10-19T09:00:00Z".parse().unwrap(),
            length_days: 3,
        },
    };
    {
        let store = LocalStore::open(temp.path());
        store.set_content_script_enabled(false).unwrap();
        store.set_premium(Some(activation.clone())).unwrap();
        store.set_trial(trial.clone()).unwrap();
    }

    let reopened = LocalStore::open(temp.path());
    assert!(!reopened.content_script_enabled());
    assert_eq!(reopened.premium(), Some(activation));
    assert_eq!(reopened.trial(), Some(trial));

    let raw = fs::read_to_string(temp.path().join(STORE_FILE)).unwrap();
    assert!(raw.contains("\"contentScriptEnabled\": false"));
    assert!(raw.contains("\"type\": \"onetime\""));
}

#[test]
fn corrupt_store_falls_back_to_defaults() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(STORE_FILE), "{not json").unwrap();

    let store = LocalStore::open(temp.path());
    assert!(store.content_script_enabled());
    store.set_content_script_enabled(false).unwrap();
    assert!(!LocalStore::open(temp.path()).content_script_enabled());
}

#[test]
fn device_fingerprint_is_computed_once() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::open(temp.path());
    let first = store.device_fingerprint_or_insert(|| "fp-1".into()).unwrap();
    let second = store
        .device_fingerprint_or_insert(|| panic!("already stored"))
        .unwrap();
    assert_eq!(first, "fp-1");
    assert_eq!(second, "fp-1");
}
