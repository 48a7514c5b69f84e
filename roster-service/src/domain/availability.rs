use std::collections::HashMap;

use shared::time::parse_hour;
use shared::types::Employee;

use crate::domain::calendar::{HOURS_IN_DAY, Horizon};

/// Dense per-(employee, day, hour) availability bitmap over the horizon.
#[derive(Debug, Clone)]
pub struct AvailabilityMap {
    num_employees: usize,
    num_days: usize,
    bits: Vec<bool>,
}

impl AvailabilityMap {
    fn new(num_employees: usize, num_days: usize) -> Self {
        Self {
            num_employees,
            num_days,
            bits: vec![false; num_employees * num_days * HOURS_IN_DAY],
        }
    }

    fn index(&self, emp_idx: usize, day_idx: usize, hour: usize) -> usize {
        (emp_idx * self.num_days + day_idx) * HOURS_IN_DAY + hour
    }

    fn set(&mut self, emp_idx: usize, day_idx: usize, hour: usize) {
        let idx = self.index(emp_idx, day_idx, hour);
        self.bits[idx] = true;
    }

    pub fn is_available(&self, emp_idx: usize, day_idx: usize, hour: usize) -> bool {
        self.bits[self.index(emp_idx, day_idx, hour)]
    }

    /// True when at least one employee is available at (day, hour).
    pub fn anyone_available(&self, day_idx: usize, hour: usize) -> bool {
        (0..self.num_employees).any(|e| self.is_available(e, day_idx, hour))
    }
}

/// An overnight availability window opened on a given day: `[start_hour, 24)`
/// that day and `[0, end_hour)` the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightShift {
    pub start_hour: usize,
    pub end_hour: usize,
}

/// Keyed on (employee index, day the overnight window starts).
pub type NightShiftMap = HashMap<(usize, usize), NightShift>;

/// Expands recurring weekly availability slots into the dense bitmap.
///
/// Overnight slots (`is_night_shift` with end < start) are split across the
/// two calendar days and recorded per start day. Slots with unparseable times
/// are skipped with a warning; the remainder of the payload still expands.
pub fn expand_availability(
    employees: &[Employee],
    horizon: &Horizon,
) -> (AvailabilityMap, NightShiftMap) {
    let mut availability = AvailabilityMap::new(employees.len(), horizon.num_days());
    let mut night_shifts = NightShiftMap::new();

    for (emp_idx, employee) in employees.iter().enumerate() {
        for slot in &employee.availability {
            let (Some(start), Some(end)) =
                (parse_hour(&slot.start_time), parse_hour(&slot.end_time))
            else {
                tracing::warn!(
                    employee_id = %employee.id,
                    day_of_week = %slot.day_of_week,
                    start_time = %slot.start_time,
                    end_time = %slot.end_time,
                    "Skipping availability slot with unparseable time"
                );
                continue;
            };
            let (start, end) = (start as usize, end as usize);
            let overnight = slot.is_night_shift && end < start && start < HOURS_IN_DAY;

            for day_idx in 0..horizon.num_days() {
                if horizon.day_of_week(day_idx) != slot.day_of_week {
                    continue;
                }
                if overnight {
                    for hour in start..HOURS_IN_DAY {
                        availability.set(emp_idx, day_idx, hour);
                    }
                    if day_idx + 1 < horizon.num_days() {
                        for hour in 0..end.min(HOURS_IN_DAY) {
                            availability.set(emp_idx, day_idx + 1, hour);
                        }
                    }
                    night_shifts.insert(
                        (emp_idx, day_idx),
                        NightShift {
                            start_hour: start,
                            end_hour: end,
                        },
                    );
                } else {
                    for hour in start..end.min(HOURS_IN_DAY) {
                        availability.set(emp_idx, day_idx, hour);
                    }
                }
            }
        }
    }

    (availability, night_shifts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn horizon(num_days: usize) -> Horizon {
        Horizon::new(
            NaiveDate::from_ymd_opt(2025, 6, 9).unwrap(),
            num_days,
            ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
                .map(String::from)
                .to_vec(),
        )
    }

    fn employee(slots: serde_json::Value) -> Employee {
        serde_json::from_value(json!({ "id": "emp-1", "availability": slots })).unwrap()
    }

    #[test]
    fn standard_slot_marks_matching_days_only() {
        let employees = vec![employee(json!([
            { "day_of_week": "Mon", "start_time": "09:00", "end_time": "17:00" }
        ]))];
        let (availability, night_shifts) = expand_availability(&employees, &horizon(8));

        for hour in 9..17 {
            assert!(availability.is_available(0, 0, hour));
            assert!(availability.is_available(0, 7, hour), "second Monday");
        }
        assert!(!availability.is_available(0, 0, 8));
        assert!(!availability.is_available(0, 0, 17));
        assert!(!availability.is_available(0, 1, 9), "Tuesday untouched");
        assert!(night_shifts.is_empty());
    }

    #[test]
    fn overnight_slot_splits_across_midnight() {
        let employees = vec![employee(json!([
            { "day_of_week": "Fri", "start_time": "22:00", "end_time": "09:00",
              "is_night_shift": true }
        ]))];
        let (availability, night_shifts) = expand_availability(&employees, &horizon(7));

        // Friday is day index 4; the tail lands on Saturday.
        assert!(availability.is_available(0, 4, 22));
        assert!(availability.is_available(0, 4, 23));
        for hour in 0..9 {
            assert!(availability.is_available(0, 5, hour));
        }
        assert!(!availability.is_available(0, 5, 9));
        assert_eq!(
            night_shifts.get(&(0, 4)),
            Some(&NightShift {
                start_hour: 22,
                end_hour: 9
            })
        );
    }

    #[test]
    fn overnight_tail_is_dropped_at_horizon_end() {
        // Single-day horizon: Monday overnight has no following day.
        let employees = vec![employee(json!([
            { "day_of_week": "Mon", "start_time": "22:00", "end_time": "06:00",
              "is_night_shift": true }
        ]))];
        let (availability, night_shifts) = expand_availability(&employees, &horizon(1));

        assert!(availability.is_available(0, 0, 22));
        assert!(availability.is_available(0, 0, 23));
        assert!(!availability.is_available(0, 0, 5));
        assert!(night_shifts.contains_key(&(0, 0)));
    }

    #[test]
    fn wrapped_slot_without_flag_expands_to_nothing() {
        let employees = vec![employee(json!([
            { "day_of_week": "Mon", "start_time": "22:00", "end_time": "06:00" }
        ]))];
        let (availability, night_shifts) = expand_availability(&employees, &horizon(2));

        for hour in 0..HOURS_IN_DAY {
            assert!(!availability.is_available(0, 0, hour));
        }
        assert!(night_shifts.is_empty());
    }

    #[test]
    fn malformed_slot_is_skipped_but_rest_survive() {
        let employees = vec![employee(json!([
            { "day_of_week": "Mon", "start_time": "nope", "end_time": "17:00" },
            { "day_of_week": "Tue", "start_time": "08:00", "end_time": "12:00" }
        ]))];
        let (availability, _) = expand_availability(&employees, &horizon(7));

        assert!(!availability.is_available(0, 0, 9));
        assert!(availability.is_available(0, 1, 8));
        assert!(availability.is_available(0, 1, 11));
    }

    #[test]
    fn out_of_range_hours_are_clipped() {
        let employees = vec![employee(json!([
            { "day_of_week": "Mon", "start_time": "20:00", "end_time": "30:00" }
        ]))];
        let (availability, _) = expand_availability(&employees, &horizon(1));

        assert!(availability.is_available(0, 0, 20));
        assert!(availability.is_available(0, 0, 23));
    }

    #[test]
    fn anyone_available_scans_all_employees() {
        let employees = vec![
            employee(json!([])),
            serde_json::from_value(json!({
                "id": "emp-2",
                "availability": [
                    { "day_of_week": "Mon", "start_time": "09:00", "end_time": "10:00" }
                ]
            }))
            .unwrap(),
        ];
        let (availability, _) = expand_availability(&employees, &horizon(1));

        assert!(availability.anyone_available(0, 9));
        assert!(!availability.anyone_available(0, 10));
    }
}
