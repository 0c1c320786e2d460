//! Per-state duration accounting over day and week windows
//!
//! Each invocation closes the interval since the previous one and credits
//! its length to the state that was active during it. The incoming state
//! only becomes active for the next interval.
//!
//! Intervals longer than the gap ceiling (the service was down, the clock
//! jumped) contribute nothing, as do intervals with negative length.

use log::{debug, info, warn};
use time::OffsetDateTime;

use crate::models::{AccumulatorRecord, DurationSummary, TrafficState};
use crate::store::{KeyValueStore, SharedState};
use crate::utils::{day_key, elapsed_seconds, unix_millis, week_key};

/// Largest interval, in seconds, credited by a single tick.
pub const DEFAULT_MAX_GAP_SECS: i64 = 120;

#[derive(Debug, Clone)]
pub struct AccumulatorSettings {
    pub max_gap_secs: i64,
    pub room: String,
    pub app: String,
}

/// Run one accumulation tick at `now`
///
/// `traffic_hint` is the numeric traffic value carried by the triggering
/// event, if any. Without one, the last classified state is used.
/// `now` must carry the local offset; day and week keys are taken from its
/// calendar date.
pub fn accumulate<S: KeyValueStore>(
    shared: &mut SharedState<S>,
    traffic_hint: Option<f64>,
    now: OffsetDateTime,
    settings: &AccumulatorSettings,
) -> DurationSummary {
    let current = match traffic_hint {
        Some(raw) => TrafficState::from_raw(raw),
        None => shared.last_traffic().unwrap_or(TrafficState::Green),
    };

    let current_day = day_key(now.date());
    let current_week = week_key(now.date());

    let stored = shared.traffic_stats().filter(|record| {
        let usable = elapsed_seconds(record.last_timestamp, &now).is_some();
        if !usable {
            warn!(
                "Stored traffic timestamp {} is out of range, resetting statistics",
                record.last_timestamp
            );
        }
        usable
    });

    let mut record = stored.unwrap_or_else(|| {
        info!("Starting traffic statistics at {} ({})", current_day, current_week);
        AccumulatorRecord {
            last_timestamp: unix_millis(&now),
            last_state: current as i64,
            today_totals: [0; 3],
            week_totals: [0; 3],
            day_key: current_day.clone(),
            week_key: current_week.clone(),
        }
    });

    let dt = creditable_seconds(record.last_timestamp, &now, settings.max_gap_secs);

    if record.day_key != current_day {
        info!("Day rollover {} -> {}", record.day_key, current_day);
        record.today_totals = [0; 3];
        record.day_key = current_day;
    }
    if record.week_key != current_week {
        info!("Week rollover {} -> {}", record.week_key, current_week);
        record.week_totals = [0; 3];
        record.week_key = current_week;
    }

    match TrafficState::from_index(record.last_state) {
        Some(previous) => {
            let i = previous.index();
            record.today_totals[i] = record.today_totals[i].saturating_add(dt);
            record.week_totals[i] = record.week_totals[i].saturating_add(dt);
            debug!("Credited {}s to {}", dt, previous);
        }
        None => warn!(
            "Stored traffic state {} is invalid, dropping {}s",
            record.last_state, dt
        ),
    }

    record.last_timestamp = unix_millis(&now);
    record.last_state = current as i64;

    shared.set_traffic_stats(&record);
    shared.set_last_traffic(current);

    summarize(&record, settings, now)
}

/// Seconds since `last_ms` that may be credited to a state
///
/// Negative intervals, intervals above `max_gap_secs` and timestamps too
/// far out of range to subtract count as zero.
pub fn creditable_seconds(last_ms: i64, now: &OffsetDateTime, max_gap_secs: i64) -> u64 {
    let Some(dt) = elapsed_seconds(last_ms, now) else {
        return 0;
    };
    if dt < 0 {
        debug!("Clock moved back by {}s, crediting nothing", -dt);
        0
    } else if dt > max_gap_secs {
        info!("Gap of {}s exceeds {}s ceiling, crediting nothing", dt, max_gap_secs);
        0
    } else {
        dt as u64
    }
}

fn summarize(
    record: &AccumulatorRecord,
    settings: &AccumulatorSettings,
    now: OffsetDateTime,
) -> DurationSummary {
    let [green_s_today, yellow_s_today, red_s_today] = record.today_totals;
    let [green_s_week, yellow_s_week, red_s_week] = record.week_totals;

    DurationSummary {
        green_s_today,
        yellow_s_today,
        red_s_today,
        green_s_week,
        yellow_s_week,
        red_s_week,
        day: record.day_key.clone(),
        week: record.week_key.clone(),
        room: settings.room.clone(),
        app: settings.app.clone(),
        time: now,
    }
}
