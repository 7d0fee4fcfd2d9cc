use rstest::{fixture, rstest};
use shade_core::calibration::{
    CalibrationData, CalibrationStore, KEY_HOME, KEY_TRAVEL, NAMESPACE,
};
use shade_core::config::TravelLimits;
use shade_core::error::{InvalidCalibration, StoreError};
use shade_core::mocks::MemoryStore;

#[fixture]
fn limits() -> TravelLimits {
    TravelLimits {
        min: 100,
        max: 20_000,
        default: 5_000,
    }
}

fn seeded(home: Option<u16>, travel: Option<u16>) -> MemoryStore {
    let mut kv = MemoryStore::new();
    if let Some(h) = home {
        kv = kv.with_value(NAMESPACE, KEY_HOME, h);
    }
    if let Some(t) = travel {
        kv = kv.with_value(NAMESPACE, KEY_TRAVEL, t);
    }
    kv
}

#[rstest]
fn valid_record_loads_unchanged(limits: TravelLimits) {
    let kv = seeded(Some(0), Some(1_234));
    let mut store = CalibrationStore::new(kv.clone(), limits);
    assert_eq!(store.load(), CalibrationData::with_travel(1_234));
    assert_eq!(kv.commit_count(), 0, "a valid record is not rewritten");
}

#[rstest]
#[case::empty(None, None)]
#[case::missing_home(None, Some(1_000))]
#[case::missing_travel(Some(0), None)]
#[case::home_not_zero(Some(7), Some(1_000))]
#[case::travel_too_short(Some(0), Some(99))]
#[case::travel_too_long(Some(0), Some(20_001))]
fn invalid_record_is_erased_and_defaulted(
    limits: TravelLimits,
    #[case] home: Option<u16>,
    #[case] travel: Option<u16>,
) {
    let kv = seeded(home, travel);
    let mut store = CalibrationStore::new(kv.clone(), limits);
    assert_eq!(store.load(), CalibrationData::with_travel(5_000));
    assert_eq!(kv.committed(NAMESPACE, KEY_HOME), None);
    assert_eq!(kv.committed(NAMESPACE, KEY_TRAVEL), None);
}

#[rstest]
#[case(100)]
#[case(20_000)]
fn limits_are_inclusive(limits: TravelLimits, #[case] travel: u16) {
    let mut store = CalibrationStore::new(seeded(Some(0), Some(travel)), limits);
    assert_eq!(store.load().travel_steps, travel);
}

#[rstest]
fn unreadable_store_falls_back_to_defaults(limits: TravelLimits) {
    let kv = seeded(Some(0), Some(1_000));
    kv.fail_reads(true);
    let mut store = CalibrationStore::new(kv, limits);
    assert_eq!(store.load(), CalibrationData::with_travel(5_000));
}

#[rstest]
fn save_commits_both_keys(limits: TravelLimits) {
    let kv = MemoryStore::new();
    let mut store = CalibrationStore::new(kv.clone(), limits);
    store.save(&CalibrationData::with_travel(777)).unwrap();
    store.save(&CalibrationData::with_travel(777)).unwrap();
    assert_eq!(kv.committed(NAMESPACE, KEY_HOME), Some(0));
    assert_eq!(kv.committed(NAMESPACE, KEY_TRAVEL), Some(777));

    let mut reopened = CalibrationStore::new(kv, limits);
    assert_eq!(reopened.load().travel_steps, 777);
}

#[rstest]
fn failed_commit_is_reported_and_not_durable(limits: TravelLimits) {
    let kv = seeded(Some(0), Some(1_000));
    kv.fail_commit(true);
    let mut store = CalibrationStore::new(kv.clone(), limits);
    let err = store.save(&CalibrationData::with_travel(2_000)).unwrap_err();
    assert!(matches!(err, StoreError::Commit(_)));
    assert_eq!(kv.committed(NAMESPACE, KEY_TRAVEL), Some(1_000));
}

#[rstest]
fn failed_write_names_the_key(limits: TravelLimits) {
    let kv = MemoryStore::new();
    kv.fail_writes(true);
    let mut store = CalibrationStore::new(kv, limits);
    let err = store.save(&CalibrationData::with_travel(2_000)).unwrap_err();
    assert!(matches!(err, StoreError::Write { key: KEY_HOME, .. }));
}

#[rstest]
fn clear_removes_record(limits: TravelLimits) {
    let kv = seeded(Some(0), Some(1_000));
    let mut store = CalibrationStore::new(kv.clone(), limits);
    store.clear().unwrap();
    assert_eq!(kv.committed(NAMESPACE, KEY_TRAVEL), None);
}

#[rstest]
fn validate_reports_reason(limits: TravelLimits) {
    let bad = CalibrationData {
        home_steps: 3,
        travel_steps: 1_000,
    };
    assert_eq!(bad.validate(&limits), Err(InvalidCalibration::HomeNotZero(3)));
    let short = CalibrationData::with_travel(50);
    assert_eq!(
        short.validate(&limits),
        Err(InvalidCalibration::TravelOutOfRange {
            travel: 50,
            min: 100,
            max: 20_000
        })
    );
}
