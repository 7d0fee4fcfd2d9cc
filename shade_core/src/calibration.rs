//! Persisted range-of-travel (home + travel steps).
//!
//! A record is all-or-nothing: a missing key, a non-zero home or a travel
//! outside the limits invalidates the whole thing, which is then erased and
//! replaced by defaults.
use shade_traits::KeyValueStore;

use crate::config::TravelLimits;
use crate::error::{InvalidCalibration, StoreError};

pub const NAMESPACE: &str = "calibration";
pub const KEY_HOME: &str = "home_steps";
pub const KEY_TRAVEL: &str = "travel_steps";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationData {
    /// Always 0 in a valid record.
    pub home_steps: u16,
    pub travel_steps: u16,
}

impl CalibrationData {
    pub fn with_travel(travel_steps: u16) -> Self {
        Self {
            home_steps: 0,
            travel_steps,
        }
    }

    pub fn defaults(limits: &TravelLimits) -> Self {
        Self::with_travel(limits.default)
    }

    pub fn validate(&self, limits: &TravelLimits) -> Result<(), InvalidCalibration> {
        if self.home_steps != 0 {
            return Err(InvalidCalibration::HomeNotZero(self.home_steps));
        }
        if !limits.contains(self.travel_steps) {
            return Err(InvalidCalibration::TravelOutOfRange {
                travel: self.travel_steps,
                min: limits.min,
                max: limits.max,
            });
        }
        Ok(())
    }
}

pub struct CalibrationStore<K> {
    kv: K,
    limits: TravelLimits,
}

impl<K: KeyValueStore> CalibrationStore<K> {
    pub fn new(kv: K, limits: TravelLimits) -> Self {
        Self { kv, limits }
    }

    pub fn limits(&self) -> &TravelLimits {
        &self.limits
    }

    /// Read and validate without touching the store.
    pub fn inspect(&self) -> Result<Result<CalibrationData, InvalidCalibration>, StoreError> {
        let get = |key: &'static str| {
            self.kv.get_u16(NAMESPACE, key).map_err(|e| StoreError::Read {
                key,
                reason: e.to_string(),
            })
        };
        let home = get(KEY_HOME)?;
        let travel = get(KEY_TRAVEL)?;
        Ok(match (home, travel) {
            (None, _) => Err(InvalidCalibration::MissingHome),
            (_, None) => Err(InvalidCalibration::MissingTravel),
            (Some(home_steps), Some(travel_steps)) => {
                let data = CalibrationData {
                    home_steps,
                    travel_steps,
                };
                data.validate(&self.limits).map(|()| data)
            }
        })
    }

    /// Stored record if valid; otherwise erase and fall back to defaults.
    /// Never fails: every problem is logged and recovered here.
    pub fn load(&mut self) -> CalibrationData {
        let reason = match self.inspect() {
            Ok(Ok(data)) => {
                tracing::info!(
                    target: "shade::calibration",
                    travel_steps = data.travel_steps,
                    "calibration loaded"
                );
                return data;
            }
            Ok(Err(invalid)) => invalid.to_string(),
            Err(e) => e.to_string(),
        };
        let defaults = CalibrationData::defaults(&self.limits);
        tracing::warn!(
            target: "shade::calibration",
            %reason,
            travel_steps = defaults.travel_steps,
            "stored calibration unusable; erasing and using defaults"
        );
        if let Err(e) = self.clear() {
            tracing::warn!(target: "shade::calibration", error = %e, "erasing calibration failed");
        }
        defaults
    }

    /// Write both keys and commit. Saving the same data twice is harmless.
    pub fn save(&mut self, data: &CalibrationData) -> Result<(), StoreError> {
        let mut set = |key: &'static str, v: u16| {
            self.kv
                .set_u16(NAMESPACE, key, v)
                .map_err(|e| StoreError::Write {
                    key,
                    reason: e.to_string(),
                })
        };
        set(KEY_HOME, data.home_steps)?;
        set(KEY_TRAVEL, data.travel_steps)?;
        self.kv
            .commit()
            .map_err(|e| StoreError::Commit(e.to_string()))?;
        tracing::info!(
            target: "shade::calibration",
            home_steps = data.home_steps,
            travel_steps = data.travel_steps,
            "calibration saved"
        );
        Ok(())
    }

    /// Remove both keys.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        for key in [KEY_HOME, KEY_TRAVEL] {
            self.kv
                .remove(NAMESPACE, key)
                .map_err(|e| StoreError::Write {
                    key,
                    reason: e.to_string(),
                })?;
        }
        self.kv
            .commit()
            .map_err(|e| StoreError::Commit(e.to_string()))
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn into_inner(self) -> K {
        self.kv
    }
}
