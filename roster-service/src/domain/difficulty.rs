use shared::types::Settings;

use crate::domain::calendar::{HOURS_IN_DAY, Horizon};

/// Fixed factor used whenever a real-valued difficulty score has to enter
/// the solver's integer arithmetic.
pub const DIFFICULTY_SCALE: f64 = 1000.0;

/// Precomputed per-(day, hour) difficulty weights.
///
/// score = base × night multiplier (hour in the night range) × weekend
/// multiplier (calendar Sat/Sun). The multipliers are global, so the matrix
/// is shared by every facility.
#[derive(Debug, Clone)]
pub struct DifficultyMatrix {
    scores: Vec<f64>,
}

impl DifficultyMatrix {
    pub fn build(settings: &Settings, horizon: &Horizon) -> Self {
        let night_start = settings.night_hours_start as usize;
        let night_end = settings.night_hours_end as usize;

        let mut scores = Vec::with_capacity(horizon.num_days() * HOURS_IN_DAY);
        for day_idx in 0..horizon.num_days() {
            let weekend_factor = if horizon.is_weekend(day_idx) {
                settings.weekend_day_multiplier
            } else {
                1.0
            };
            for hour in 0..HOURS_IN_DAY {
                let night_factor = if is_night_hour(hour, night_start, night_end) {
                    settings.night_hour_multiplier
                } else {
                    1.0
                };
                let score = settings.base_difficulty_score_per_hour * night_factor * weekend_factor;
                scores.push(score.max(0.0));
            }
        }
        Self { scores }
    }

    pub fn score(&self, day_idx: usize, hour: usize) -> f64 {
        self.scores[day_idx * HOURS_IN_DAY + hour]
    }

    /// Integer form for solver coefficients.
    pub fn scaled(&self, day_idx: usize, hour: usize) -> i64 {
        (self.score(day_idx, hour) * DIFFICULTY_SCALE).round() as i64
    }
}

/// Night ranges wrap midnight when start > end; start == end means no night
/// hours at all.
fn is_night_hour(hour: usize, night_start: usize, night_end: usize) -> bool {
    if night_start == night_end {
        false
    } else if night_start < night_end {
        hour >= night_start && hour < night_end
    } else {
        hour >= night_start || hour < night_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn settings() -> Settings {
        serde_json::from_value(json!({
            "planning_start_date": "2025-06-09",
            "num_days_in_planning_period": 7,
            "cleaning_shift_start_hour": 10,
            "cleaning_shift_end_hour": 15,
            "base_difficulty_score_per_hour": 2.0,
            "night_hour_multiplier": 1.5,
            "weekend_day_multiplier": 1.25,
            "night_hours_start": 22,
            "night_hours_end": 5
        }))
        .unwrap()
    }

    fn horizon() -> Horizon {
        Horizon::new(
            NaiveDate::from_ymd_opt(2025, 6, 9).unwrap(),
            7,
            ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
                .map(String::from)
                .to_vec(),
        )
    }

    #[test]
    fn weekday_daytime_uses_base_score() {
        let matrix = DifficultyMatrix::build(&settings(), &horizon());
        assert_eq!(matrix.score(0, 12), 2.0);
    }

    #[test]
    fn night_range_wraps_midnight() {
        let matrix = DifficultyMatrix::build(&settings(), &horizon());
        assert_eq!(matrix.score(0, 22), 3.0);
        assert_eq!(matrix.score(0, 4), 3.0);
        assert_eq!(matrix.score(0, 5), 2.0);
    }

    #[test]
    fn weekend_and_night_multipliers_stack() {
        let matrix = DifficultyMatrix::build(&settings(), &horizon());
        // Day 5 is Saturday.
        assert_eq!(matrix.score(5, 12), 2.5);
        assert_eq!(matrix.score(5, 23), 3.75);
    }

    #[test]
    fn scaled_rounds_to_thousandths() {
        let matrix = DifficultyMatrix::build(&settings(), &horizon());
        assert_eq!(matrix.scaled(5, 23), 3750);
        assert_eq!(matrix.scaled(0, 12), 2000);
    }

    #[test]
    fn empty_night_range_means_no_night_hours() {
        let mut s = settings();
        s.night_hours_start = 6;
        s.night_hours_end = 6;
        let matrix = DifficultyMatrix::build(&s, &horizon());
        assert_eq!(matrix.score(0, 3), 2.0);
    }
}
