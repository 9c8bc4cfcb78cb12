//! Timed-gate primitives.
//!
//! [`FrequencyChecker`] is the claim gate behind query de-duplication:
//! checking it is also claiming it, so exactly one concurrent caller
//! wins per window. [`RecentTimeChecker`] is the monotonic high-water
//! mark behind document/history time acceptance.

use chrono::Duration as TimeDelta;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use courier_core::Timestamp;

/// Per-key last-event gate with a fixed expiry window.
///
/// `check_expired` records the event time on success, so the check
/// doubles as a compare-and-set: within one window the first caller
/// observes `true` and later callers observe `false`. All of that
/// happens under one lock, which is what makes the "exactly one go
/// ahead per window" guarantee hold across threads.
#[derive(Debug)]
pub struct FrequencyChecker<K> {
    expires: TimeDelta,
    records: Mutex<HashMap<K, Timestamp>>,
}

impl<K: Eq + Hash + Clone> FrequencyChecker<K> {
    pub fn new(expires: Duration) -> Self {
        Self {
            expires: TimeDelta::from_std(expires).unwrap_or_else(|_| TimeDelta::seconds(600)),
            records: Mutex::new(HashMap::new()),
        }
    }

    /// True when the key is unseen, the window has elapsed, or `force`
    /// is set; records `now` as the new last event in all three cases.
    pub fn check_expired(&self, key: &K, now: Timestamp, force: bool) -> bool {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !force {
            if let Some(last) = records.get(key) {
                if now < *last + self.expires {
                    return false;
                }
            }
        }
        records.insert(key.clone(), now);
        true
    }
}

/// Per-key monotonic timestamp tracker.
///
/// A set call succeeds only when the candidate is strictly newer than
/// the stored value; read and write happen under the same lock, so two
/// concurrent sets cannot both succeed unless both actually advance
/// the time.
#[derive(Debug, Default)]
pub struct RecentTimeChecker<K> {
    times: Mutex<HashMap<K, Timestamp>>,
}

impl<K: Eq + Hash + Clone> RecentTimeChecker<K> {
    pub fn new() -> Self {
        Self {
            times: Mutex::new(HashMap::new()),
        }
    }

    /// Record `time` for `key` iff it is strictly newer than what is
    /// stored. Returns false (and mutates nothing) otherwise.
    pub fn set_last_time(&self, key: &K, time: Timestamp) -> bool {
        let mut times = self.times.lock().unwrap_or_else(PoisonError::into_inner);
        match times.get(key) {
            Some(stored) if *stored >= time => false,
            _ => {
                times.insert(key.clone(), time);
                true
            }
        }
    }

    pub fn last_time(&self, key: &K) -> Option<Timestamp> {
        let times = self.times.lock().unwrap_or_else(PoisonError::into_inner);
        times.get(key).copied()
    }
}
