/// Traffic-light classification of temperature/humidity readings
use log::{debug, info};

use crate::models::{Classification, Reading, TrafficState};
use crate::store::{KeyValueStore, SharedState};

/// Below this temperature (°C) the room is in alarm.
pub const RED_TEMP_BELOW: f64 = 17.0;
/// Upper bound (inclusive, °C) of the warning temperature band.
pub const YELLOW_TEMP_MAX: f64 = 18.9;
/// Above this relative humidity (%) the room is in alarm.
pub const RED_HUMIDITY_ABOVE: f64 = 70.0;
/// Lower bound (exclusive, %) of the warning humidity band.
pub const YELLOW_HUMIDITY_ABOVE: f64 = 60.0;

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub room: String,
    /// Override mode: emit this state instead of evaluating thresholds.
    pub force_state: Option<TrafficState>,
}

/// Map a temperature/humidity pair to a traffic state
///
/// Red is checked before Yellow, so a warm but humid room is Red.
pub fn traffic_for(temperature: f64, humidity: f64) -> TrafficState {
    if temperature < RED_TEMP_BELOW || humidity > RED_HUMIDITY_ABOVE {
        TrafficState::Red
    } else if (RED_TEMP_BELOW..=YELLOW_TEMP_MAX).contains(&temperature)
        || (humidity > YELLOW_HUMIDITY_ABOVE && humidity <= RED_HUMIDITY_ABOVE)
    {
        TrafficState::Yellow
    } else {
        TrafficState::Green
    }
}

/// Classify a reading and record the result as the active state
///
/// Returns `None` without touching the store when either measurement is
/// missing or not finite.
pub fn classify<S: KeyValueStore>(
    shared: &mut SharedState<S>,
    reading: &Reading,
    settings: &ClassifierSettings,
) -> Option<Classification> {
    let (temperature, humidity) = match (reading.temperature, reading.humidity) {
        (Some(t), Some(h)) if t.is_finite() && h.is_finite() => (t, h),
        _ => {
            debug!("Skipping incomplete reading: {:?}", reading);
            return None;
        }
    };

    let (traffic, reason) = match settings.force_state {
        Some(forced) => (forced, Some(override_reason(forced))),
        None => (traffic_for(temperature, humidity), None),
    };

    let previous = shared.last_traffic();
    shared.set_last_traffic(traffic);

    if previous != Some(traffic) {
        info!(
            "Room {} is now {} ({:.1}°C, {:.1}%)",
            settings.room, traffic, temperature, humidity
        );
    }

    Some(Classification {
        room: settings.room.clone(),
        temp_c: temperature,
        hum_pct: humidity,
        traffic,
        traffic_text: traffic.as_text(),
        reason,
        time: reading.timestamp,
    })
}

fn override_reason(state: TrafficState) -> &'static str {
    match state {
        TrafficState::Green => "TEST_GREEN",
        TrafficState::Yellow => "TEST_YELLOW",
        TrafficState::Red => "TEST_RED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use time::macros::datetime;

    fn settings() -> ClassifierSettings {
        ClassifierSettings {
            room: "office".to_string(),
            force_state: None,
        }
    }

    fn reading(temperature: Option<f64>, humidity: Option<f64>) -> Reading {
        Reading {
            temperature,
            humidity,
            timestamp: datetime!(2024-05-01 12:00:00 +02:00),
        }
    }

    #[test]
    fn test_cold_room_is_red() {
        let mut shared = SharedState::new(MemoryStore::new());
        let out = classify(&mut shared, &reading(Some(15.0), Some(50.0)), &settings())
            .expect("complete reading classifies");
        assert_eq!(out.traffic, TrafficState::Red);
        assert_eq!(u8::from(out.traffic), 2);
        assert_eq!(out.traffic_text, "red");
        assert_eq!(out.room, "office");
        assert_eq!(out.reason, None);
    }

    #[test]
    fn test_red_regardless_of_other_field() {
        for hum in [0.0, 45.0, 65.0, 100.0] {
            assert_eq!(traffic_for(16.99, hum), TrafficState::Red, "hum={}", hum);
        }
        for temp in [10.0, 18.0, 22.0, 30.0] {
            assert_eq!(traffic_for(temp, 70.1), TrafficState::Red, "temp={}", temp);
        }
    }

    #[test]
    fn test_red_wins_over_yellow_temperature() {
        assert_eq!(traffic_for(17.5, 75.0), TrafficState::Red);
    }

    #[test]
    fn test_yellow_bands() {
        assert_eq!(traffic_for(18.0, 65.0), TrafficState::Yellow);
        assert_eq!(traffic_for(17.0, 40.0), TrafficState::Yellow);
        assert_eq!(traffic_for(18.9, 40.0), TrafficState::Yellow);
        assert_eq!(traffic_for(21.0, 60.1), TrafficState::Yellow);
        assert_eq!(traffic_for(21.0, 70.0), TrafficState::Yellow);
    }

    #[test]
    fn test_green_edges() {
        assert_eq!(traffic_for(19.0, 40.0), TrafficState::Green);
        assert_eq!(traffic_for(21.0, 60.0), TrafficState::Green);
        // Between 18.9 and 19 there is no warning band.
        assert_eq!(traffic_for(18.95, 50.0), TrafficState::Green);
    }

    #[test]
    fn test_classification_is_recorded_as_last_traffic() {
        let mut shared = SharedState::new(MemoryStore::new());
        classify(&mut shared, &reading(Some(18.0), Some(65.0)), &settings());
        assert_eq!(shared.last_traffic(), Some(TrafficState::Yellow));
    }

    #[test]
    fn test_incomplete_reading_is_a_silent_no_op() {
        let mut shared = SharedState::new(MemoryStore::new());
        shared.set_last_traffic(TrafficState::Red);

        assert_eq!(classify(&mut shared, &reading(None, Some(50.0)), &settings()), None);
        assert_eq!(classify(&mut shared, &reading(Some(21.0), None), &settings()), None);
        assert_eq!(
            classify(&mut shared, &reading(Some(f64::NAN), Some(50.0)), &settings()),
            None
        );
        assert_eq!(shared.last_traffic(), Some(TrafficState::Red));
    }

    #[test]
    fn test_override_mode_forces_state() {
        let mut shared = SharedState::new(MemoryStore::new());
        let forced = ClassifierSettings {
            force_state: Some(TrafficState::Yellow),
            ..settings()
        };
        let out = classify(&mut shared, &reading(Some(22.0), Some(40.0)), &forced)
            .expect("complete reading classifies");
        assert_eq!(out.traffic, TrafficState::Yellow);
        assert_eq!(out.reason, Some("TEST_YELLOW"));
        assert_eq!(shared.last_traffic(), Some(TrafficState::Yellow));
    }

    #[test]
    fn test_override_mode_still_skips_incomplete_readings() {
        let mut shared = SharedState::new(MemoryStore::new());
        let forced = ClassifierSettings {
            force_state: Some(TrafficState::Red),
            ..settings()
        };
        assert_eq!(classify(&mut shared, &reading(None, None), &forced), None);
        assert_eq!(shared.last_traffic(), None);
    }
}
