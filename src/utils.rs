/// Utility functions for calendar keys, elapsed time and formatting
use std::fmt;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};
use time_tz::{timezones, OffsetDateTimeExt, TimeZone, Tz};

/// Time zone used for day/week keys and alert timestamps
///
/// The offset is looked up for every instant, so daylight-saving changes
/// apply without a restart. The default is UTC.
#[derive(Clone, Copy, Default)]
pub struct LocalZone(Option<&'static Tz>);

impl LocalZone {
    /// Look up an IANA zone such as `Europe/Berlin`
    pub fn named(name: &str) -> Option<Self> {
        timezones::get_by_name(name.trim()).map(|tz| LocalZone(Some(tz)))
    }

    /// The zone the host is configured for
    pub fn system() -> Result<Self, time_tz::system::Error> {
        time_tz::system::get_timezone().map(|tz| LocalZone(Some(tz)))
    }

    pub fn name(&self) -> &str {
        match self.0 {
            Some(tz) => tz.name(),
            None => "UTC",
        }
    }

    /// Express `dt` in this zone's offset at that instant
    pub fn localize(&self, dt: OffsetDateTime) -> OffsetDateTime {
        match self.0 {
            Some(tz) => dt.to_timezone(tz),
            None => dt.to_offset(UtcOffset::UTC),
        }
    }
}

impl PartialEq for LocalZone {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl fmt::Debug for LocalZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for LocalZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Format a timestamp for human-readable logging and alert bodies
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format in its own offset.
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// Calendar-day key in YYYY-MM-DD form
pub fn day_key(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// ISO-8601 week key in YYYY-Www form
///
/// Weeks start on Monday and week 1 is the week containing the year's first
/// Thursday, so the year component is the ISO week-year: 2024-12-30 belongs
/// to 2025-W01 and 2021-01-03 to 2020-W53.
pub fn week_key(date: Date) -> String {
    let (year, week, _) = date.to_iso_week_date();
    format!("{:04}-W{:02}", year, week)
}

/// Unix time in whole milliseconds
pub fn unix_millis(dt: &OffsetDateTime) -> i64 {
    (dt.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Whole seconds elapsed between a stored millisecond timestamp and `now`
///
/// Floors towards negative infinity, so a clock that moved backwards
/// yields a negative result for the caller to reject. `None` when the
/// difference does not fit, which only a corrupted timestamp can cause.
pub fn elapsed_seconds(since_ms: i64, now: &OffsetDateTime) -> Option<i64> {
    unix_millis(now)
        .checked_sub(since_ms)
        .map(|ms| ms.div_euclid(1000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, offset};

    #[test]
    fn test_day_key_is_zero_padded() {
        assert_eq!(day_key(date!(2024 - 01 - 01)), "2024-01-01");
        assert_eq!(day_key(date!(2025 - 11 - 09)), "2025-11-09");
    }

    #[test]
    fn test_week_key_mid_year() {
        // 2024-05-01 is a Wednesday in ISO week 18.
        assert_eq!(week_key(date!(2024 - 05 - 01)), "2024-W18");
    }

    #[test]
    fn test_week_key_late_december_rolls_into_next_iso_year() {
        // Monday 2024-12-30 shares its week with Thursday 2025-01-02.
        assert_eq!(week_key(date!(2024 - 12 - 30)), "2025-W01");
        assert_eq!(week_key(date!(2024 - 12 - 29)), "2024-W52");
    }

    #[test]
    fn test_week_key_early_january_belongs_to_previous_iso_year() {
        // 2021-01-01 is a Friday, so the first days of 2021 are in 2020-W53.
        assert_eq!(week_key(date!(2021 - 01 - 03)), "2020-W53");
        assert_eq!(week_key(date!(2021 - 01 - 04)), "2021-W01");
    }

    #[test]
    fn test_week_key_53_week_year() {
        // 2026 starts on a Thursday and has 53 ISO weeks.
        assert_eq!(week_key(date!(2026 - 12 - 31)), "2026-W53");
        assert_eq!(week_key(date!(2027 - 01 - 01)), "2026-W53");
    }

    #[test]
    fn test_week_starts_on_monday() {
        assert_eq!(week_key(date!(2024 - 01 - 07)), "2024-W01"); // Sunday
        assert_eq!(week_key(date!(2024 - 01 - 08)), "2024-W02"); // Monday
    }

    #[test]
    fn test_elapsed_seconds_floors() {
        let now = datetime!(2024-01-01 12:00:45.999 UTC);
        let since = unix_millis(&datetime!(2024-01-01 12:00:00 UTC));
        assert_eq!(elapsed_seconds(since, &now), Some(45));
    }

    #[test]
    fn test_elapsed_seconds_negative_when_clock_moves_back() {
        let now = datetime!(2024-01-01 12:00:00 UTC);
        let since = unix_millis(&datetime!(2024-01-01 12:00:10 UTC));
        assert_eq!(elapsed_seconds(since, &now), Some(-10));
    }

    #[test]
    fn test_elapsed_seconds_out_of_range_timestamp() {
        let now = datetime!(2024-01-01 12:00:00 UTC);
        assert_eq!(elapsed_seconds(i64::MIN, &now), None);
        assert_eq!(elapsed_seconds(i64::MAX, &now), None);
    }

    #[test]
    fn test_local_zone_follows_daylight_saving() {
        let berlin = LocalZone::named("Europe/Berlin").expect("zone in database");
        let winter = berlin.localize(datetime!(2024-01-01 23:30:00 UTC));
        let summer = berlin.localize(datetime!(2024-07-01 22:30:00 UTC));

        assert_eq!(winter.offset(), offset!(+1));
        assert_eq!(day_key(winter.date()), "2024-01-02");
        assert_eq!(summer.offset(), offset!(+2));
        assert_eq!(day_key(summer.date()), "2024-07-02");
    }

    #[test]
    fn test_local_zone_lookup() {
        assert_eq!(LocalZone::default().name(), "UTC");
        assert!(LocalZone::named("Mars/Olympus_Mons").is_none());
        let utc = LocalZone::default().localize(datetime!(2024-01-01 12:00:00 +02:00));
        assert_eq!(utc.offset(), UtcOffset::UTC);
        assert_eq!(utc.hour(), 10);
    }

    #[test]
    fn test_format_datetime_uses_local_fields() {
        let dt = datetime!(2024-03-05 07:08:09 +01:00);
        assert_eq!(format_datetime(&dt), "05.03.2024 - 07:08:09");
    }
}
