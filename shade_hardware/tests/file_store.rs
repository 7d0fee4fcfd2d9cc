use std::fs;

use rstest::{fixture, rstest};
use shade_hardware::FileStore;
use shade_hardware::error::HwError;
use shade_traits::KeyValueStore;
use tempfile::{TempDir, tempdir};

#[fixture]
fn dir() -> TempDir {
    tempdir().unwrap()
}

#[rstest]
fn missing_file_reads_as_empty(dir: TempDir) {
    let store = FileStore::open(dir.path().join("nvs.toml")).unwrap();
    assert_eq!(store.get_u16("calibration", "travel_steps").unwrap(), None);
}

#[rstest]
fn committed_values_survive_reopen(dir: TempDir) {
    let path = dir.path().join("sub").join("nvs.toml");
    {
        let mut store = FileStore::open(&path).unwrap();
        store.set_u16("calibration", "home_steps", 0).unwrap();
        store.set_u16("calibration", "travel_steps", 4321).unwrap();
        store.commit().unwrap();
    }
    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.get_u16("calibration", "home_steps").unwrap(), Some(0));
    assert_eq!(store.get_u16("calibration", "travel_steps").unwrap(), Some(4321));
    assert!(!path.with_extension("new").exists(), "temp file must be renamed away");
}

#[rstest]
fn uncommitted_values_are_not_durable(dir: TempDir) {
    let path = dir.path().join("nvs.toml");
    {
        let mut store = FileStore::open(&path).unwrap();
        store.set_u16("calibration", "travel_steps", 900).unwrap();
        assert_eq!(store.get_u16("calibration", "travel_steps").unwrap(), Some(900));
    }
    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.get_u16("calibration", "travel_steps").unwrap(), None);
}

#[rstest]
fn remove_then_commit_erases(dir: TempDir) {
    let path = dir.path().join("nvs.toml");
    let mut store = FileStore::open(&path).unwrap();
    store.set_u16("calibration", "travel_steps", 900).unwrap();
    store.set_u16("other", "x", 1).unwrap();
    store.commit().unwrap();
    store.remove("calibration", "travel_steps").unwrap();
    store.commit().unwrap();

    let reopened = FileStore::open(&path).unwrap();
    assert_eq!(reopened.get_u16("calibration", "travel_steps").unwrap(), None);
    assert_eq!(reopened.get_u16("other", "x").unwrap(), Some(1));
}

#[rstest]
fn out_of_range_value_is_reported_as_corrupt(dir: TempDir) {
    let path = dir.path().join("nvs.toml");
    fs::write(&path, "[calibration]\ntravel_steps = 70000\n").unwrap();
    let store = FileStore::open(&path).unwrap();
    let err = store.get_u16("calibration", "travel_steps").unwrap_err();
    assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::Corrupt(_))));
}

#[rstest]
fn garbage_document_opens_empty(dir: TempDir) {
    let path = dir.path().join("nvs.toml");
    fs::write(&path, "this is { not toml").unwrap();
    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.get_u16("calibration", "home_steps").unwrap(), None);
}
