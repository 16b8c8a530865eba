//! Financial-year windowing.
//!
//! The business financial year runs April 15 through April 14 of the
//! following calendar year. Receipt sequences reset at this boundary.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

/// A concrete financial-year window.
///
/// `start` is inclusive; `end` is an exclusive upper bound placed at
/// April 14 23:59:59.999 of the following year, compared with `<`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FyWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub start_year: i32,
}

impl FyWindow {
    /// The financial year containing `now`: the window starting this
    /// April 15 when `now` is on/after it, else the one starting last year.
    pub fn containing(now: DateTime<Utc>) -> Self {
        let year = now.year();
        let start_year = if now >= fy_start(year) { year } else { year - 1 };
        Self {
            start: fy_start(start_year),
            end: fy_end(start_year),
            start_year,
        }
    }

    /// Calendar year in which this financial year ends.
    pub fn end_year(&self) -> i32 {
        self.start_year + 1
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

fn fy_start(year: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, 4, 15, 0, 0, 0).unwrap()
}

fn fy_end(start_year: i32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(start_year + 1, 4, 14, 23, 59, 59)
        .unwrap()
        + Duration::milliseconds(999)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn window_starts_current_year_on_or_after_april_15() {
        let fy = FyWindow::containing(at(2024, 4, 15, 0, 0, 0));
        assert_eq!(fy.start_year, 2024);
        assert_eq!(fy.end_year(), 2025);

        let fy = FyWindow::containing(at(2024, 5, 1, 12, 0, 0));
        assert_eq!(fy.start_year, 2024);
    }

    #[test]
    fn window_starts_previous_year_before_april_15() {
        let fy = FyWindow::containing(at(2024, 4, 14, 23, 59, 59));
        assert_eq!(fy.start_year, 2023);
        assert_eq!(fy.end_year(), 2024);

        let fy = FyWindow::containing(at(2024, 1, 10, 0, 0, 0));
        assert_eq!(fy.start_year, 2023);
    }

    #[test]
    fn april_14_end_of_day_belongs_to_closing_year() {
        let fy = FyWindow::containing(at(2024, 6, 1, 0, 0, 0));
        assert!(fy.contains(at(2025, 4, 14, 23, 59, 59)));
        assert!(!fy.contains(at(2025, 4, 15, 0, 0, 0)));
    }

    #[test]
    fn april_15_opens_the_next_window() {
        let closing = FyWindow::containing(at(2024, 6, 1, 0, 0, 0));
        let opening = FyWindow::containing(at(2025, 4, 15, 0, 0, 0));
        assert_eq!(closing.end_year(), opening.start_year);
        assert!(opening.contains(at(2025, 4, 15, 0, 0, 0)));
    }

    #[test]
    fn window_bounds_are_exact() {
        let fy = FyWindow::containing(at(2024, 6, 1, 0, 0, 0));
        assert_eq!(fy.start, at(2024, 4, 15, 0, 0, 0));
        assert_eq!(
            fy.end,
            at(2025, 4, 14, 23, 59, 59) + Duration::milliseconds(999)
        );
        assert!(fy.contains(fy.start));
        assert!(!fy.contains(fy.end));
    }
}
