// Flare catalog domain model
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};

/// Date form used inside archive filenames.
pub const ARCHIVE_DATE_FORMAT: &str = "%Y%m%d";
/// Date form used by the flare catalog.
pub const CATALOG_DATE_FORMAT: &str = "%m/%d/%Y";
pub const CATALOG_TIME_FORMAT: &str = "%H:%M:%S";

/// One catalog entry. Times are naive civil times; the zone they belong to
/// is supplied when a window is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlareEvent {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub class: String,
}

impl FlareEvent {
    /// Returns `None` unless `start < end`.
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime, class: String) -> Option<Self> {
        if start >= end {
            return None;
        }
        Some(Self {
            date,
            start,
            end,
            class,
        })
    }

    /// `YYYYMMDD`, the form embedded in archive filenames.
    pub fn archive_date_key(&self) -> String {
        self.date.format(ARCHIVE_DATE_FORMAT).to_string()
    }

    pub fn catalog_date(&self) -> String {
        self.date.format(CATALOG_DATE_FORMAT).to_string()
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Duration rendered as `H:MM:SS`.
    pub fn duration_label(&self) -> String {
        let secs = self.duration().num_seconds();
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    /// The flare window in Unix seconds, inclusive at both ends.
    pub fn window<Tz: TimeZone>(&self, tz: &Tz) -> Option<TimeWindow> {
        let start = local_to_unix(tz, self.date.and_time(self.start))?;
        let end = local_to_unix(tz, self.date.and_time(self.end))?;
        Some(TimeWindow::new(start, end))
    }

    /// The civil day containing the flare, `[midnight, next midnight)`.
    pub fn context_window<Tz: TimeZone>(&self, tz: &Tz) -> Option<TimeWindow> {
        let next_day = self.date.succ_opt()?;
        let start = day_start_to_unix(tz, self.date)?;
        let end = day_start_to_unix(tz, next_day)?;
        Some(TimeWindow::new(start, end))
    }
}

/// Step used to find the end of a DST gap.
const GAP_STEP_MINUTES: i64 = 15;

/// First instant of a civil day. Where midnight falls in a DST gap the day
/// starts when the gap ends.
fn day_start_to_unix<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<f64> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..24 * 60 / GAP_STEP_MINUTES)
        .map(|i| midnight + TimeDelta::minutes(i * GAP_STEP_MINUTES))
        .find_map(|local| local_to_unix(tz, local))
}

/// Ambiguous local times resolve to the earliest instant; nonexistent ones
/// yield `None`.
fn local_to_unix<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<f64> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.timestamp() as f64)
}

/// A span of absolute time in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn contains_half_open(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::{America::New_York, America::Santiago, UTC};

    fn event(date: &str, start: &str, end: &str) -> FlareEvent {
        FlareEvent::new(
            NaiveDate::parse_from_str(date, CATALOG_DATE_FORMAT).unwrap(),
            NaiveTime::parse_from_str(start, CATALOG_TIME_FORMAT).unwrap(),
            NaiveTime::parse_from_str(end, CATALOG_TIME_FORMAT).unwrap(),
            "M1.0".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_end_before_start() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let t = NaiveTime::from_hms_opt(14, 0, 0).unwrap();
        assert!(FlareEvent::new(date, t, t, "X1".into()).is_none());
    }

    #[test]
    fn test_date_keys() {
        let e = event("01/02/2023", "14:00:00", "14:10:00");
        assert_eq!(e.archive_date_key(), "20230102");
        assert_eq!(e.catalog_date(), "01/02/2023");
        let round_trip = NaiveDate::parse_from_str(&e.archive_date_key(), ARCHIVE_DATE_FORMAT).unwrap();
        assert_eq!(round_trip, e.date);
    }

    #[test]
    fn test_duration_label() {
        let e = event("01/02/2023", "14:00:00", "15:02:05");
        assert_eq!(e.duration_label(), "1:02:05");
    }

    #[test]
    fn test_window_depends_on_zone() {
        let e = event("01/02/2023", "14:00:00", "14:10:00");
        let utc = e.window(&UTC).unwrap();
        assert_eq!(utc.start, 1_672_668_000.0);
        assert_eq!(utc.end - utc.start, 600.0);

        // EST is UTC-5 in January
        let eastern = e.window(&New_York).unwrap();
        assert_eq!(eastern.start - utc.start, 5.0 * 3600.0);
    }

    #[test]
    fn test_context_window_is_one_day() {
        let e = event("01/02/2023", "14:00:00", "14:10:00");
        let day = e.context_window(&UTC).unwrap();
        assert_eq!(day.end - day.start, 86_400.0);
        assert!(day.contains_half_open(day.start));
        assert!(!day.contains_half_open(day.end));
    }

    #[test]
    fn test_day_starting_in_dst_gap_keeps_flare() {
        // Santiago skipped 00:00-01:00 on 2022-09-11
        let e = event("09/11/2022", "14:00:00", "14:10:00");
        let flare = e.window(&Santiago).unwrap();
        assert_eq!(flare.start, 1_662_915_600.0);

        let day = e.context_window(&Santiago).unwrap();
        // 01:00 -03 and the next midnight, 23 hours later
        assert_eq!(day.start, 1_662_868_800.0);
        assert_eq!(day.end - day.start, 23.0 * 3600.0);
        assert!(day.contains_half_open(flare.start));
    }

    #[test]
    fn test_nonexistent_local_time() {
        // 02:30 does not exist in New York on 2023-03-12
        let e = event("03/12/2023", "02:15:00", "02:45:00");
        assert!(e.window(&New_York).is_none());
    }
}
