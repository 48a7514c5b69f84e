use std::collections::BTreeMap;

use shared::types::{Assignment, ScheduleDiagnostics, ShortageShift};

use crate::domain::calendar::HOURS_IN_DAY;
use crate::domain::context::PlanningContext;

/// Solver-independent view of a solution: which facility (if any) each
/// employee serves at each (day, hour).
#[derive(Debug, Clone)]
pub struct AssignmentGrid {
    num_days: usize,
    cells: Vec<Option<usize>>,
}

impl AssignmentGrid {
    pub fn new(num_employees: usize, num_days: usize) -> Self {
        Self {
            num_days,
            cells: vec![None; num_employees * num_days * HOURS_IN_DAY],
        }
    }

    fn index(&self, emp_idx: usize, day_idx: usize, hour: usize) -> usize {
        (emp_idx * self.num_days + day_idx) * HOURS_IN_DAY + hour
    }

    pub fn assign(&mut self, emp_idx: usize, day_idx: usize, hour: usize, facility_idx: usize) {
        let idx = self.index(emp_idx, day_idx, hour);
        self.cells[idx] = Some(facility_idx);
    }

    pub fn facility_at(&self, emp_idx: usize, day_idx: usize, hour: usize) -> Option<usize> {
        self.cells[self.index(emp_idx, day_idx, hour)]
    }
}

/// Walks the solved grid into shift blocks, shortage details, and
/// per-employee diagnostics.
///
/// Iteration is strictly (employee, day, facility, hour), so the output is a
/// pure function of the grid.
pub fn extract_result(
    ctx: &PlanningContext,
    grid: &AssignmentGrid,
) -> (Vec<Assignment>, Vec<ShortageShift>, ScheduleDiagnostics) {
    (
        collect_assignments(ctx, grid),
        collect_shortages(ctx, grid),
        collect_diagnostics(ctx, grid),
    )
}

fn collect_assignments(ctx: &PlanningContext, grid: &AssignmentGrid) -> Vec<Assignment> {
    let mut assignments = Vec::new();
    for e in 0..ctx.num_employees() {
        for d in 0..ctx.horizon.num_days() {
            let date = ctx.horizon.date(d);
            for f in 0..ctx.num_facilities() {
                let mut block_start: Option<usize> = None;
                let mut difficulty_sum = 0.0;
                for h in 0..HOURS_IN_DAY {
                    if grid.facility_at(e, d, h) == Some(f) {
                        if block_start.is_none() {
                            block_start = Some(h);
                            difficulty_sum = 0.0;
                        }
                        difficulty_sum += ctx.difficulty.score(d, h);
                    } else if let Some(start) = block_start.take() {
                        assignments.push(block(ctx, e, f, date, start, h, difficulty_sum));
                    }
                }
                if let Some(start) = block_start {
                    assignments.push(block(ctx, e, f, date, start, HOURS_IN_DAY, difficulty_sum));
                }
            }
        }
    }
    assignments
}

fn block(
    ctx: &PlanningContext,
    emp_idx: usize,
    facility_idx: usize,
    date: chrono::NaiveDate,
    start: usize,
    end: usize,
    difficulty_sum: f64,
) -> Assignment {
    Assignment {
        employee_id: ctx.employees[emp_idx].id.clone(),
        facility_id: ctx.facilities[facility_idx].id.clone(),
        date,
        start_hour: start as u32,
        end_hour: end as u32,
        difficulty_score_avg: difficulty_sum / (end - start) as f64,
    }
}

/// Shortage cells, recomputed from the inputs rather than read back from the
/// model. Hours where no employee was available at all are skipped: nothing
/// the solver could have done there, and listing every unstaffable small-hour
/// cell would bury the actionable gaps.
fn collect_shortages(ctx: &PlanningContext, grid: &AssignmentGrid) -> Vec<ShortageShift> {
    let mut shortages = Vec::new();
    for f in 0..ctx.num_facilities() {
        for d in 0..ctx.horizon.num_days() {
            let date = ctx.horizon.date(d);
            for h in 0..HOURS_IN_DAY {
                if !ctx.availability.anyone_available(d, h) {
                    continue;
                }
                let required = ctx.required(f, d, h);
                let assigned = (0..ctx.num_employees())
                    .filter(|&e| grid.facility_at(e, d, h) == Some(f))
                    .count() as u32;
                if assigned < required {
                    shortages.push(ShortageShift {
                        facility_id: ctx.facilities[f].id.clone(),
                        date,
                        hour: h as u32,
                        required_staff: required,
                        assigned_staff: assigned,
                        shortage: required - assigned,
                        difficulty_score: ctx.difficulty.score(d, h),
                    });
                }
            }
        }
    }
    shortages
}

fn collect_diagnostics(ctx: &PlanningContext, grid: &AssignmentGrid) -> ScheduleDiagnostics {
    let mut hours_worked = BTreeMap::new();
    let mut days_worked = BTreeMap::new();
    let mut difficulty_totals = BTreeMap::new();

    for e in 0..ctx.num_employees() {
        let mut hours: u32 = 0;
        let mut days: u32 = 0;
        let mut difficulty_total = 0.0;
        for d in 0..ctx.horizon.num_days() {
            let mut worked_today = false;
            for h in 0..HOURS_IN_DAY {
                if grid.facility_at(e, d, h).is_some() {
                    hours += 1;
                    worked_today = true;
                    difficulty_total += ctx.difficulty.score(d, h);
                }
            }
            if worked_today {
                days += 1;
            }
        }
        let id = ctx.employees[e].id.clone();
        hours_worked.insert(id.clone(), hours);
        days_worked.insert(id.clone(), days);
        difficulty_totals.insert(id, difficulty_total);
    }

    ScheduleDiagnostics {
        hours_worked_per_employee: hours_worked,
        days_worked_per_employee: days_worked,
        total_difficulty_score_per_employee: difficulty_totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::types::SolveRequest;

    fn context() -> PlanningContext {
        let request: SolveRequest = serde_json::from_value(json!({
            "schedule_input": {
                "settings": {
                    "planning_start_date": "2025-06-09",
                    "num_days_in_planning_period": 2,
                    "cleaning_shift_start_hour": 10,
                    "cleaning_shift_end_hour": 15
                },
                "facilities": [
                    { "id": "facility-a", "cleaning_capacity_tasks_per_hour_per_employee": 4.0 },
                    { "id": "facility-b" }
                ],
                "employees": [
                    {
                        "id": "emp-1",
                        "availability": [
                            { "day_of_week": "Mon", "start_time": "09:00", "end_time": "17:00" },
                            { "day_of_week": "Tue", "start_time": "09:00", "end_time": "17:00" }
                        ]
                    },
                    {
                        "id": "emp-2",
                        "availability": [
                            { "day_of_week": "Mon", "start_time": "10:00", "end_time": "15:00" }
                        ]
                    }
                ]
            },
            "cleaning_tasks_input": {
                "facility-a": { "Mon": { "2025-06-09": 40 } }
            }
        }))
        .unwrap();
        PlanningContext::prepare(&request)
    }

    #[test]
    fn coalesces_contiguous_hours_into_blocks() {
        let ctx = context();
        let mut grid = AssignmentGrid::new(2, 2);
        for h in 9..12 {
            grid.assign(0, 0, h, 0);
        }
        for h in 13..15 {
            grid.assign(0, 0, h, 0);
        }

        let (assignments, _, _) = extract_result(&ctx, &grid);
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].start_hour, 9);
        assert_eq!(assignments[0].end_hour, 12);
        assert_eq!(assignments[1].start_hour, 13);
        assert_eq!(assignments[1].end_hour, 15);
        assert_eq!(assignments[0].employee_id, "emp-1");
        assert_eq!(assignments[0].facility_id, "facility-a");
        // Weekday daytime difficulty is the base score.
        assert_eq!(assignments[0].difficulty_score_avg, 1.0);
    }

    #[test]
    fn block_running_to_midnight_closes_at_hour_24() {
        let ctx = context();
        let mut grid = AssignmentGrid::new(2, 2);
        grid.assign(0, 0, 22, 1);
        grid.assign(0, 0, 23, 1);

        let (assignments, _, _) = extract_result(&ctx, &grid);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].end_hour, 24);
        assert_eq!(assignments[0].facility_id, "facility-b");
    }

    #[test]
    fn facility_change_splits_the_block() {
        let ctx = context();
        let mut grid = AssignmentGrid::new(2, 2);
        grid.assign(0, 0, 9, 0);
        grid.assign(0, 0, 10, 1);

        let (assignments, _, _) = extract_result(&ctx, &grid);
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].end_hour, 10);
        assert_eq!(assignments[1].start_hour, 10);
        assert_ne!(assignments[0].facility_id, assignments[1].facility_id);
    }

    #[test]
    fn shortages_are_recomputed_and_filtered_by_availability() {
        let ctx = context();
        let mut grid = AssignmentGrid::new(2, 2);
        // One employee on facility-a during the whole Monday cleaning window.
        for h in 10..15 {
            grid.assign(0, 0, h, 0);
        }

        let (_, shortages, _) = extract_result(&ctx, &grid);

        // Required is 2 inside the window; exactly one was assigned.
        let window: Vec<_> = shortages
            .iter()
            .filter(|s| s.facility_id == "facility-a" && (10..15).contains(&s.hour))
            .collect();
        assert_eq!(window.len(), 5);
        for cell in &window {
            assert_eq!(cell.required_staff, 2);
            assert_eq!(cell.assigned_staff, 1);
            assert_eq!(cell.shortage, 1);
        }

        // Hours with zero availability never show up.
        assert!(shortages.iter().all(|s| (9..17).contains(&s.hour)));
        // Hour 9 on facility-a is uncovered but someone was available.
        assert!(
            shortages
                .iter()
                .any(|s| s.facility_id == "facility-a" && s.hour == 9 && s.required_staff == 1)
        );
    }

    #[test]
    fn diagnostics_count_hours_days_and_difficulty() {
        let ctx = context();
        let mut grid = AssignmentGrid::new(2, 2);
        for h in 9..12 {
            grid.assign(0, 0, h, 0);
        }
        grid.assign(0, 1, 9, 0);
        grid.assign(1, 0, 10, 1);

        let (_, _, diagnostics) = extract_result(&ctx, &grid);
        assert_eq!(diagnostics.hours_worked_per_employee["emp-1"], 4);
        assert_eq!(diagnostics.days_worked_per_employee["emp-1"], 2);
        assert_eq!(diagnostics.hours_worked_per_employee["emp-2"], 1);
        assert_eq!(diagnostics.days_worked_per_employee["emp-2"], 1);
        assert_eq!(diagnostics.total_difficulty_score_per_employee["emp-1"], 4.0);
    }

    #[test]
    fn extraction_is_deterministic() {
        let ctx = context();
        let mut grid = AssignmentGrid::new(2, 2);
        for h in 9..15 {
            grid.assign(0, 0, h, 0);
        }
        grid.assign(1, 0, 10, 1);

        let first = extract_result(&ctx, &grid);
        let second = extract_result(&ctx, &grid);
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }
}
