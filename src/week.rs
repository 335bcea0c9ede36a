//! Date windows, cell keys and hour formatting shared by the timesheet,
//! planner and workload views.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Days in the weekly timesheet grid.
pub const WEEK_LEN: u32 = 7;
/// Days in the two-week workload window.
pub const FORTNIGHT_LEN: u32 = 14;

/// Returns the most recent `anchor` weekday on or before `date`.
pub fn week_start(date: NaiveDate, anchor: Weekday) -> NaiveDate {
    let offset = (date.weekday().num_days_from_monday() + 7 - anchor.num_days_from_monday()) % 7;
    date - Days::new(u64::from(offset))
}

/// A contiguous run of `len` days beginning at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub len: u32,
}

impl DateWindow {
    /// The Monday-aligned week containing `today`.
    pub fn week_of(today: NaiveDate) -> Self {
        Self { start: week_start(today, Weekday::Mon), len: WEEK_LEN }
    }

    /// The Wednesday-anchored two-week window used by the workload screen.
    pub fn fortnight_of(today: NaiveDate) -> Self {
        Self { start: week_start(today, Weekday::Wed), len: FORTNIGHT_LEN }
    }

    /// Two weeks from the Thursday of the Monday-aligned week holding
    /// `today`. Early in the week that Thursday is still ahead.
    pub fn timeline_of(today: NaiveDate) -> Self {
        Self { start: week_start(today, Weekday::Mon) + Days::new(3), len: FORTNIGHT_LEN }
    }

    pub fn end(&self) -> NaiveDate {
        self.start + Days::new(u64::from(self.len.saturating_sub(1)))
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        (0..self.len).map(|i| self.start + Days::new(u64::from(i))).collect()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end()
    }

    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.contains(today)
    }

    /// Moves the window by `steps` whole windows (negative moves back).
    pub fn shift_weeks(&self, steps: i64) -> Self {
        let delta = steps.unsigned_abs() * u64::from(self.len);
        let start = if steps >= 0 {
            self.start + Days::new(delta)
        } else {
            self.start - Days::new(delta)
        };
        Self { start, len: self.len }
    }

    pub fn next(&self) -> Self {
        self.shift_weeks(1)
    }

    pub fn previous(&self) -> Self {
        self.shift_weeks(-1)
    }

    /// "Jun 10 - Jun 16"
    pub fn range_label(&self) -> String {
        format!("{} - {}", self.start.format("%b %-d"), self.end().format("%b %-d"))
    }

    /// "12 Jun - 25 Jun 2024"
    pub fn span_label(&self) -> String {
        let end = self.end();
        format!("{} - {}", self.start.format("%-d %b"), end.format("%-d %b %Y"))
    }
}

/// Key for the hour-entry map and cell edit state: `taskId_YYYY-MM-DD`.
pub fn cell_key(task_id: &str, date: NaiveDate) -> String {
    format!("{}_{}", task_id, date.format("%Y-%m-%d"))
}

/// Parses the date part of an API date or timestamp
/// (`2024-06-10`, `2024-06-10T00:00:00.000Z`).
pub fn parse_api_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().split('T').next()?;
    let day = day.get(..10).unwrap_or(day);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Values above this are read as minutes.
pub const MINUTES_THRESHOLD: f64 = 24.0;

/// Hours exactly as the backend sent them, before unit normalization.
///
/// Not `Copy`: `into_hours` consumes the value so a raw reading is
/// normalized exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHours(f64);

impl RawHours {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn into_hours(self) -> f64 {
        normalize_hours(self.0)
    }
}

/// Raw values above 24 are treated as minutes and divided by 60.
pub fn normalize_hours(raw: f64) -> f64 {
    if raw > MINUTES_THRESHOLD {
        raw / 60.0
    } else {
        raw
    }
}

fn split_hours(hours: f64) -> (u64, u64) {
    let hours = hours.max(0.0);
    let mut h = hours.floor() as u64;
    let mut m = ((hours - hours.floor()) * 60.0).round() as u64;
    if m == 60 {
        h += 1;
        m = 0;
    }
    (h, m)
}

/// "2h 30m" / "2h"
pub fn format_hours(hours: f64) -> String {
    match split_hours(hours) {
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

/// "2 hrs 30 min" / "2 hrs"
pub fn format_worked_hours(hours: f64) -> String {
    match split_hours(hours) {
        (h, 0) => format!("{} hrs", h),
        (h, m) => format!("{} hrs {} min", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_wednesday_maps_to_monday() {
        let w = DateWindow::week_of(d("2024-06-12"));
        assert_eq!(w.start, d("2024-06-10"));
        assert_eq!(w.end(), d("2024-06-16"));
    }

    #[test]
    fn test_sunday_belongs_to_previous_monday() {
        assert_eq!(week_start(d("2024-06-16"), Weekday::Mon), d("2024-06-10"));
        assert_eq!(week_start(d("2024-06-10"), Weekday::Mon), d("2024-06-10"));
    }

    #[test]
    fn test_week_start_is_anchor_on_or_before() {
        let mut day = d("2023-12-25");
        for _ in 0..400 {
            for anchor in [Weekday::Mon, Weekday::Wed, Weekday::Sun] {
                let s = week_start(day, anchor);
                assert_eq!(s.weekday(), anchor);
                assert!(s <= day);
                assert!((day - s).num_days() < 7);
            }
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_fortnight_anchor_is_wednesday() {
        let w = DateWindow::fortnight_of(d("2024-06-10"));
        assert_eq!(w.start, d("2024-06-05"));
        assert_eq!(w.days().len(), 14);
        assert_eq!(w.end(), d("2024-06-18"));
        assert_eq!(w.next().start, d("2024-06-19"));
    }

    #[test]
    fn test_navigation_moves_whole_weeks() {
        let w = DateWindow::week_of(d("2024-06-12"));
        assert_eq!(w.previous().start, d("2024-06-03"));
        assert_eq!(w.next().start, d("2024-06-17"));
        assert_eq!(w.shift_weeks(-3).next().next().next(), w);
    }

    #[test]
    fn test_labels() {
        let w = DateWindow::week_of(d("2024-06-12"));
        assert_eq!(w.range_label(), "Jun 10 - Jun 16");
        let f = DateWindow::fortnight_of(d("2024-06-12"));
        assert_eq!(f.span_label(), "12 Jun - 25 Jun 2024");
    }

    #[test]
    fn test_cell_keys_are_distinct_within_week() {
        let w = DateWindow::week_of(d("2024-06-12"));
        let mut keys = std::collections::HashSet::new();
        for task in ["a", "a_1", "b", "10"] {
            for day in w.days() {
                assert!(keys.insert(cell_key(task, day)));
            }
        }
        assert_eq!(cell_key("t1", d("2024-06-10")), "t1_2024-06-10");
    }

    #[test]
    fn test_timeline_starts_on_thursday_of_current_week() {
        // Monday 2024-06-10 looks ahead; Sunday 2024-06-16 looks back.
        assert_eq!(DateWindow::timeline_of(d("2024-06-10")).start, d("2024-06-13"));
        assert_eq!(DateWindow::timeline_of(d("2024-06-14")).start, d("2024-06-13"));
        assert_eq!(DateWindow::timeline_of(d("2024-06-16")).start, d("2024-06-13"));
        let w = DateWindow::timeline_of(d("2024-06-13"));
        assert_eq!(w.end(), d("2024-06-26"));
        assert_eq!(w.next().start, d("2024-06-27"));
        assert_eq!(w.span_label(), "13 Jun - 26 Jun 2024");
    }

    #[test]
    fn test_parse_api_date() {
        assert_eq!(parse_api_date("2024-06-10T00:00:00.000Z"), Some(d("2024-06-10")));
        assert_eq!(parse_api_date("2024-06-10"), Some(d("2024-06-10")));
        assert_eq!(parse_api_date(""), None);
        assert_eq!(parse_api_date("junk"), None);
    }

    #[test]
    fn test_normalize_applies_once() {
        assert_eq!(normalize_hours(8.0), 8.0);
        assert_eq!(normalize_hours(24.0), 24.0);
        assert_eq!(RawHours::new(90.0).into_hours(), 1.5);
        // A second pass over a value that is still above 24 would change it.
        let once = RawHours::new(1800.0).into_hours();
        assert_eq!(once, 30.0);
        assert_ne!(normalize_hours(once), once);
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(2.5), "2h 30m");
        assert_eq!(format_hours(3.0), "3h");
        assert_eq!(format_hours(1.9999), "2h");
        assert_eq!(format_worked_hours(7.25), "7 hrs 15 min");
        assert_eq!(format_worked_hours(0.0), "0 hrs");
    }
}
