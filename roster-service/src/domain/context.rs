use std::collections::{BTreeSet, HashMap};

use shared::types::{Employee, Facility, Settings, SolveRequest};

use crate::domain::availability::{AvailabilityMap, NightShiftMap, expand_availability};
use crate::domain::calendar::{HOURS_IN_DAY, Horizon};
use crate::domain::demand::cleaning_tasks_for;
use crate::domain::difficulty::DifficultyMatrix;

/// Everything a solve attempt reads: the input entities plus the derived
/// caches. Built once per request and never mutated afterwards, so retries
/// share it freely.
#[derive(Debug)]
pub struct PlanningContext {
    pub settings: Settings,
    pub facilities: Vec<Facility>,
    pub employees: Vec<Employee>,
    pub horizon: Horizon,
    pub availability: AvailabilityMap,
    pub night_shifts: NightShiftMap,
    pub difficulty: DifficultyMatrix,
    /// `None` = no preference (any facility admissible).
    preferred_facilities: Vec<Option<BTreeSet<usize>>>,
    /// Required staffing per (facility, day, hour).
    required_staff: Vec<u32>,
}

impl PlanningContext {
    pub fn prepare(request: &SolveRequest) -> Self {
        let settings = request.schedule_input.settings.clone();
        let facilities = request.schedule_input.facilities.clone();
        let employees = request.schedule_input.employees.clone();

        let horizon = Horizon::new(
            settings.planning_start_date,
            settings.num_days_in_planning_period,
            settings.days_of_week_order.clone(),
        );
        let (availability, night_shifts) = expand_availability(&employees, &horizon);
        let difficulty = DifficultyMatrix::build(&settings, &horizon);
        let preferred_facilities = resolve_preferences(&employees, &facilities);
        let required_staff = compute_required_staff(&settings, &facilities, &horizon, request);

        Self {
            settings,
            facilities,
            employees,
            horizon,
            availability,
            night_shifts,
            difficulty,
            preferred_facilities,
            required_staff,
        }
    }

    pub fn num_facilities(&self) -> usize {
        self.facilities.len()
    }

    pub fn num_employees(&self) -> usize {
        self.employees.len()
    }

    /// Whether the employee may be assigned to the facility at all.
    pub fn admissible(&self, emp_idx: usize, facility_idx: usize) -> bool {
        match &self.preferred_facilities[emp_idx] {
            None => true,
            Some(preferred) => preferred.contains(&facility_idx),
        }
    }

    pub fn required(&self, facility_idx: usize, day_idx: usize, hour: usize) -> u32 {
        self.required_staff[(facility_idx * self.horizon.num_days() + day_idx) * HOURS_IN_DAY + hour]
    }
}

fn resolve_preferences(
    employees: &[Employee],
    facilities: &[Facility],
) -> Vec<Option<BTreeSet<usize>>> {
    let facility_idx_by_id: HashMap<&str, usize> = facilities
        .iter()
        .enumerate()
        .map(|(idx, f)| (f.id.as_str(), idx))
        .collect();

    employees
        .iter()
        .map(|employee| {
            if employee.preferred_facilities.is_empty() {
                return None;
            }
            let mut preferred = BTreeSet::new();
            for facility_id in &employee.preferred_facilities {
                match facility_idx_by_id.get(facility_id.as_str()) {
                    Some(&idx) => {
                        preferred.insert(idx);
                    }
                    None => tracing::warn!(
                        employee_id = %employee.id,
                        %facility_id,
                        "Ignoring preference for unknown facility"
                    ),
                }
            }
            if preferred.is_empty() {
                tracing::warn!(
                    employee_id = %employee.id,
                    "No preferred facility resolved; treating employee as unrestricted"
                );
                None
            } else {
                Some(preferred)
            }
        })
        .collect()
}

fn compute_required_staff(
    settings: &Settings,
    facilities: &[Facility],
    horizon: &Horizon,
    request: &SolveRequest,
) -> Vec<u32> {
    let cleaning_start = settings.cleaning_shift_start_hour as usize;
    let cleaning_end = settings.cleaning_shift_end_hour as usize;
    let cleaning_duration =
        settings.cleaning_shift_end_hour as i64 - settings.cleaning_shift_start_hour as i64;

    let mut required = Vec::with_capacity(facilities.len() * horizon.num_days() * HOURS_IN_DAY);
    for facility in facilities {
        let mut capacity = facility.cleaning_capacity_tasks_per_hour_per_employee;
        if capacity <= 0.0 {
            tracing::warn!(
                facility_id = %facility.id,
                capacity,
                "Non-positive cleaning capacity; coercing to 1"
            );
            capacity = 1.0;
        }
        for day_idx in 0..horizon.num_days() {
            let tasks = cleaning_tasks_for(
                &facility.id,
                horizon.date(day_idx),
                horizon.day_of_week(day_idx),
                &request.cleaning_tasks_input,
            );
            for hour in 0..HOURS_IN_DAY {
                let in_window = hour >= cleaning_start && hour < cleaning_end;
                let staff = if in_window && cleaning_duration > 0 && tasks > 0 {
                    let per_hour_demand = f64::from(tasks) / (capacity * cleaning_duration as f64);
                    (per_hour_demand.ceil() as u32).clamp(1, i32::MAX as u32)
                } else {
                    1
                };
                required.push(staff);
            }
        }
    }
    required
}
