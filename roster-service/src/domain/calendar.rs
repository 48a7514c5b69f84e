use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub const HOURS_IN_DAY: usize = 24;

/// Maps planning-day indices onto calendar dates and day-of-week labels.
///
/// Labels come from the configured ordering (index 0 = Monday), so callers
/// can match availability slots and task tables against whatever spelling the
/// payload uses.
#[derive(Debug, Clone)]
pub struct Horizon {
    start: NaiveDate,
    num_days: usize,
    day_of_week_order: Vec<String>,
}

impl Horizon {
    pub fn new(start: NaiveDate, num_days: usize, day_of_week_order: Vec<String>) -> Self {
        Self {
            start,
            num_days,
            day_of_week_order,
        }
    }

    pub fn num_days(&self) -> usize {
        self.num_days
    }

    pub fn date(&self, day_idx: usize) -> NaiveDate {
        self.start + Duration::days(day_idx as i64)
    }

    /// Day-of-week label for a planning day, or `""` when the configured
    /// ordering is shorter than seven entries.
    pub fn day_of_week(&self, day_idx: usize) -> &str {
        let pos = self.date(day_idx).weekday().num_days_from_monday() as usize;
        self.day_of_week_order
            .get(pos)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_weekend(&self, day_idx: usize) -> bool {
        matches!(self.date(day_idx).weekday(), Weekday::Sat | Weekday::Sun)
    }
}
