/// Database operations for storing classified readings, durations and alerts
///
/// Expected tables:
///
/// ```sql
/// CREATE TABLE climate_readings(room TEXT, temp_c DOUBLE PRECISION, hum_pct DOUBLE PRECISION,
///     traffic SMALLINT, traffic_text TEXT, reason TEXT, time TIMESTAMPTZ);
/// CREATE TABLE traffic_durations(room TEXT, app TEXT,
///     green_s_today BIGINT, yellow_s_today BIGINT, red_s_today BIGINT,
///     green_s_week BIGINT, yellow_s_week BIGINT, red_s_week BIGINT,
///     day TEXT, week TEXT, time TIMESTAMPTZ);
/// CREATE TABLE climate_alerts(room TEXT, traffic SMALLINT, subject TEXT, body TEXT, time TIMESTAMPTZ);
/// ```
use crate::database::connection::execute_with_retry;
use crate::models::{Alert, Classification, DurationSummary};

/// Store a classified reading in the climate_readings table
pub async fn store_classification(
    classification: &Classification,
    database_url: &str,
) -> Result<(), String> {
    // Clone data for move into async closure
    let classification = classification.clone();

    execute_with_retry(database_url, move |client| {
        let c = classification.clone();
        async move {
            client
                .execute(
                    "INSERT INTO climate_readings(room, temp_c, hum_pct, traffic, traffic_text, reason, time)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                    &[
                        &c.room,
                        &c.temp_c,
                        &c.hum_pct,
                        &(u8::from(c.traffic) as i16),
                        &c.traffic_text,
                        &c.reason,
                        &c.time,
                    ],
                )
                .await
        }
    })
    .await
}

/// Store the current per-state totals in the traffic_durations table
pub async fn store_durations(summary: &DurationSummary, database_url: &str) -> Result<(), String> {
    let summary = summary.clone();

    execute_with_retry(database_url, move |client| {
        let s = summary.clone();
        async move {
            client
                .execute(
                    "INSERT INTO traffic_durations(room, app, green_s_today, yellow_s_today, red_s_today,
                         green_s_week, yellow_s_week, red_s_week, day, week, time)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                    &[
                        &s.room,
                        &s.app,
                        &(s.green_s_today as i64),
                        &(s.yellow_s_today as i64),
                        &(s.red_s_today as i64),
                        &(s.green_s_week as i64),
                        &(s.yellow_s_week as i64),
                        &(s.red_s_week as i64),
                        &s.day,
                        &s.week,
                        &s.time,
                    ],
                )
                .await
        }
    })
    .await
}

/// Store a state-change alert in the climate_alerts table
pub async fn store_alert(room: &str, alert: &Alert, database_url: &str) -> Result<(), String> {
    let room = room.to_string();
    let alert = alert.clone();

    execute_with_retry(database_url, move |client| {
        let room = room.clone();
        let alert = alert.clone();
        async move {
            client
                .execute(
                    "INSERT INTO climate_alerts(room, traffic, subject, body, time)
                     VALUES ($1, $2, $3, $4, $5)",
                    &[
                        &room,
                        &(u8::from(alert.state) as i16),
                        &alert.subject,
                        &alert.body,
                        &alert.time,
                    ],
                )
                .await
        }
    })
    .await
}
