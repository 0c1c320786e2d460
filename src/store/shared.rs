/// Typed view over the persisted keys shared between handlers
use log::{error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{KeyValueStore, StoreError};
use crate::models::{AccumulatorRecord, TrafficState};

/// Last classified state, written by the classifier and the accumulator.
pub const KEY_LAST_TRAFFIC: &str = "lastTraffic";
/// Accumulator record.
pub const KEY_TRAFFIC_STATS: &str = "trafficStats";
/// Last state the notifier evaluated.
pub const KEY_LAST_TRAFFIC_MAIL: &str = "lastTrafficMail";

/// Shared handler state backed by a key-value store
///
/// Reads never fail: a missing, unreadable or malformed value is reported
/// as absent so the caller falls back to its default. Write failures are
/// logged and swallowed; the in-process pipeline keeps running.
pub struct SharedState<S> {
    store: S,
}

impl<S: KeyValueStore> SharedState<S> {
    pub fn new(store: S) -> Self {
        SharedState { store }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn last_traffic(&self) -> Option<TrafficState> {
        self.load(KEY_LAST_TRAFFIC)
    }

    pub fn set_last_traffic(&mut self, state: TrafficState) {
        self.save(KEY_LAST_TRAFFIC, &state);
    }

    pub fn traffic_stats(&self) -> Option<AccumulatorRecord> {
        self.load(KEY_TRAFFIC_STATS)
    }

    pub fn set_traffic_stats(&mut self, record: &AccumulatorRecord) {
        self.save(KEY_TRAFFIC_STATS, record);
    }

    /// Last state seen by the notifier; `None` until the first evaluation.
    pub fn last_notified(&self) -> Option<TrafficState> {
        self.load(KEY_LAST_TRAFFIC_MAIL)
    }

    pub fn set_last_notified(&mut self, state: TrafficState) {
        self.save(KEY_LAST_TRAFFIC_MAIL, &state);
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.store.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                error!("Failed to read '{}' from state store: {}", key, e);
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Ignoring malformed '{}' in state store: {}", key, e);
                None
            }
        }
    }

    fn save<T: Serialize>(&mut self, key: &str, value: &T) {
        let result = serde_json::to_value(value)
            .map_err(StoreError::from)
            .and_then(|value| self.store.set(key, value));

        if let Err(e) = result {
            error!("Failed to persist '{}' to state store: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn shared_with(key: &str, value: serde_json::Value) -> SharedState<MemoryStore> {
        let mut store = MemoryStore::new();
        store.set(key, value).expect("memory set");
        SharedState::new(store)
    }

    #[test]
    fn test_last_traffic_round_trip() {
        let mut shared = SharedState::new(MemoryStore::new());
        assert_eq!(shared.last_traffic(), None);
        shared.set_last_traffic(TrafficState::Yellow);
        assert_eq!(shared.last_traffic(), Some(TrafficState::Yellow));
        assert_eq!(
            shared.store().get(KEY_LAST_TRAFFIC).expect("memory get"),
            Some(json!(1))
        );
    }

    #[test]
    fn test_out_of_range_state_reads_as_absent() {
        let shared = shared_with(KEY_LAST_TRAFFIC_MAIL, json!(-1));
        assert_eq!(shared.last_notified(), None);

        let shared = shared_with(KEY_LAST_TRAFFIC, json!("red"));
        assert_eq!(shared.last_traffic(), None);
    }

    #[test]
    fn test_malformed_record_reads_as_absent() {
        let shared = shared_with(KEY_TRAFFIC_STATS, json!({ "lastTimestamp": "yesterday" }));
        assert_eq!(shared.traffic_stats(), None);

        let shared = shared_with(KEY_TRAFFIC_STATS, json!(42));
        assert_eq!(shared.traffic_stats(), None);
    }

    #[test]
    fn test_negative_totals_are_rejected() {
        let shared = shared_with(
            KEY_TRAFFIC_STATS,
            json!({
                "lastTimestamp": 0,
                "lastState": 0,
                "todayTotals": [-5, 0, 0],
                "weekTotals": [0, 0, 0],
                "dayKey": "2024-01-01",
                "weekKey": "2024-W01"
            }),
        );
        assert_eq!(shared.traffic_stats(), None);
    }

    #[test]
    fn test_record_uses_camel_case_keys() {
        let mut shared = SharedState::new(MemoryStore::new());
        let record = AccumulatorRecord {
            last_timestamp: 1_704_067_200_000,
            last_state: 1,
            today_totals: [10, 20, 30],
            week_totals: [40, 50, 60],
            day_key: "2024-01-01".to_string(),
            week_key: "2024-W01".to_string(),
        };
        shared.set_traffic_stats(&record);

        let stored = shared
            .store()
            .get(KEY_TRAFFIC_STATS)
            .expect("memory get")
            .expect("record stored");
        assert_eq!(stored["todayTotals"], json!([10, 20, 30]));
        assert_eq!(stored["weekKey"], json!("2024-W01"));
        assert_eq!(shared.traffic_stats(), Some(record));
    }
}
