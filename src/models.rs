use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Traffic-light classification of the room climate, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TrafficState {
    Green = 0,
    Yellow = 1,
    Red = 2,
}

impl TrafficState {
    /// Position of this state in the per-state counter triples.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(TrafficState::Green),
            1 => Some(TrafficState::Yellow),
            2 => Some(TrafficState::Red),
            _ => None,
        }
    }

    /// Interpret an arbitrary numeric traffic value.
    ///
    /// The value is truncated towards zero and clamped into the valid range.
    /// Non-finite input maps to Green.
    pub fn from_raw(value: f64) -> Self {
        if !value.is_finite() {
            return TrafficState::Green;
        }
        let clamped = value.trunc().clamp(0.0, 2.0) as i64;
        Self::from_index(clamped).unwrap_or(TrafficState::Green)
    }

    pub fn as_text(self) -> &'static str {
        match self {
            TrafficState::Green => "green",
            TrafficState::Yellow => "yellow",
            TrafficState::Red => "red",
        }
    }
}

impl From<TrafficState> for u8 {
    fn from(state: TrafficState) -> u8 {
        state as u8
    }
}

impl TryFrom<u8> for TrafficState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_index(value as i64).ok_or_else(|| format!("invalid traffic state {}", value))
    }
}

impl fmt::Display for TrafficState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

impl FromStr for TrafficState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" | "0" => Ok(TrafficState::Green),
            "yellow" | "1" => Ok(TrafficState::Yellow),
            "red" | "2" => Ok(TrafficState::Red),
            other => Err(format!("unknown traffic state '{}'", other)),
        }
    }
}

/// A single temperature/humidity sample from the room sensor.
/// Either value is `None` when the sensor reported its "not available" sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub timestamp: OffsetDateTime,
}

/// Classifier output: measurement fields plus the derived traffic state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub room: String,
    pub temp_c: f64,
    pub hum_pct: f64,
    pub traffic: TrafficState,
    pub traffic_text: &'static str,
    /// Set only when the state was forced by override mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip)]
    pub time: OffsetDateTime,
}

/// Accumulator output: cumulative seconds per state for the current day and week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationSummary {
    pub green_s_today: u64,
    pub yellow_s_today: u64,
    pub red_s_today: u64,
    pub green_s_week: u64,
    pub yellow_s_week: u64,
    pub red_s_week: u64,
    pub day: String,
    pub week: String,
    // Tags
    pub room: String,
    pub app: String,
    #[serde(skip)]
    pub time: OffsetDateTime,
}

/// Human-readable alert produced on a transition into Yellow or Red.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub state: TrafficState,
    pub subject: String,
    pub body: String,
    pub time: OffsetDateTime,
}

/// Durable accumulator state, stored under `trafficStats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatorRecord {
    /// Unix time of the last accumulation tick, in milliseconds.
    pub last_timestamp: i64,
    /// Index of the state active during the interval ending at `last_timestamp`.
    /// Kept as a raw index so a corrupted value can be detected and skipped.
    pub last_state: i64,
    pub today_totals: [u64; 3],
    pub week_totals: [u64; 3],
    pub day_key: String,
    pub week_key: String,
}
