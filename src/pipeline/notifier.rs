/// Alerting on traffic-state transitions
use log::{debug, info};
use time::OffsetDateTime;

use crate::models::{Alert, TrafficState};
use crate::store::{KeyValueStore, SharedState};
use crate::utils::format_datetime;

/// Decide whether a newly classified state warrants an alert
///
/// Only changes are considered. Every change is remembered, including a
/// change to Green, so that Red → Green → Red alerts twice. Green itself is
/// never alerted.
pub fn notify<S: KeyValueStore>(
    shared: &mut SharedState<S>,
    room: &str,
    state: TrafficState,
    temperature: Option<f64>,
    humidity: Option<f64>,
    now: OffsetDateTime,
) -> Option<Alert> {
    if shared.last_notified() == Some(state) {
        debug!("Traffic state unchanged ({}), no alert", state);
        return None;
    }

    shared.set_last_notified(state);

    if state == TrafficState::Green {
        info!("Room {} back to green, no alert sent", room);
        return None;
    }

    let status = status_text(state);
    let subject = format!("[{} climate] {}", capitalize(room), status);
    let body = format!(
        "Status change detected: {}\nTime: {}\nTemperature: {}\nHumidity: {}",
        status,
        format_datetime(&now),
        format_temperature(temperature),
        format_humidity(humidity),
    );

    Some(Alert {
        state,
        subject,
        body,
        time: now,
    })
}

fn status_text(state: TrafficState) -> &'static str {
    match state {
        TrafficState::Red => "RED (ALARM)",
        TrafficState::Yellow => "YELLOW (WARNING)",
        TrafficState::Green => "GREEN (OK)",
    }
}

fn format_temperature(value: Option<f64>) -> String {
    match value {
        Some(t) if t.is_finite() => format!("{:.1} °C", t),
        _ => "n/a".to_string(),
    }
}

fn format_humidity(value: Option<f64>) -> String {
    match value {
        // round() first: it rounds halves away from zero, `{:.0}` alone would not.
        Some(h) if h.is_finite() => format!("{:.0} %", h.round()),
        _ => "n/a".to_string(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
