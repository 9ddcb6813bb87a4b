use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use shared::models::TaskRule;

use crate::rules::reach;

/// A closed interval of calendar days. Both bounds are included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReconciliationWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `[today, today + months]`, the window bookings are picked from.
    pub fn upcoming(today: NaiveDate, months: u32) -> Self {
        let end = today
            .checked_add_months(Months::new(months))
            .unwrap_or(NaiveDate::MAX);
        Self::new(today, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn contains_instant(&self, instant: DateTime<Utc>) -> bool {
        self.contains(instant.date_naive())
    }

    pub fn widen(&self, before_days: i64, after_days: i64) -> Self {
        Self::new(
            self.start - Duration::days(before_days),
            self.end + Duration::days(after_days),
        )
    }

    /// Window for loading existing tasks: reaches as far as any rule offset
    /// can move a due date, plus `slack_days` on each side.
    pub fn padded_for(&self, rules: &[TaskRule], slack_days: i64) -> Self {
        let (before, after) = reach(rules);
        self.widen(before + slack_days, after + slack_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::default_rules;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let window = ReconciliationWindow::new(day(2026, 1, 1), day(2026, 1, 31));
        assert!(window.contains(day(2026, 1, 1)));
        assert!(window.contains(day(2026, 1, 31)));
        assert!(!window.contains(day(2025, 12, 31)));
        assert!(!window.contains(day(2026, 2, 1)));
    }

    #[test]
    fn test_instant_uses_utc_day() {
        let window = ReconciliationWindow::new(day(2026, 1, 1), day(2026, 1, 31));
        assert!(window.contains_instant("2026-01-31T23:59:59Z".parse().unwrap()));
        assert!(!window.contains_instant("2026-02-01T00:00:00Z".parse().unwrap()));
    }

    #[test]
    fn test_upcoming_is_one_calendar_month() {
        let window = ReconciliationWindow::upcoming(day(2026, 1, 31), 1);
        assert_eq!(window.start, day(2026, 1, 31));
        assert_eq!(window.end, day(2026, 2, 28));
    }

    #[test]
    fn test_padded_for_rules() {
        let window = ReconciliationWindow::new(day(2026, 1, 10), day(2026, 2, 10));
        let padded = window.padded_for(&default_rules(), 5);
        assert_eq!(padded.start, day(2026, 1, 2));
        assert_eq!(padded.end, day(2026, 2, 17));
    }
}
