use std::collections::HashMap;

use selen::prelude::*;
use thiserror::Error;

use crate::domain::calendar::HOURS_IN_DAY;
use crate::domain::context::PlanningContext;
use crate::domain::difficulty::DIFFICULTY_SCALE;
use crate::domain::solver::PenaltyMultipliers;

/// Hard ceiling on assigned hours per aligned seven-day window.
pub const MAX_WEEKLY_HOURS: i32 = 40;
/// Minimum free hours between the end of one shift and the start of the next.
pub const MIN_REST_HOURS: usize = 8;

#[derive(Debug, Error)]
pub enum ModelBuildError {
    #[error("penalty coefficient {0} exceeds the solver's integer range")]
    CoefficientOverflow(i64),
    #[error("worst-case objective bound {0} exceeds the solver's integer range")]
    ObjectiveOverflow(i64),
}

/// Sparse decision-variable space plus the assembled objective.
#[derive(Debug)]
pub struct ScheduleModel {
    pub model: Model,
    /// Assignment variables keyed (facility, employee, day, hour); present
    /// only where the employee is available and the facility admissible.
    pub x: HashMap<(usize, usize, usize, usize), VarId>,
    pub objective: Option<VarId>,
}

/// Accumulates weighted objective terms while tracking the worst-case bound,
/// so a model that cannot fit the solver's integer range is rejected before
/// it reaches the search.
struct ObjectiveTerms {
    terms: Vec<VarId>,
    worst_case: i64,
}

impl ObjectiveTerms {
    fn new() -> Self {
        Self {
            terms: Vec::new(),
            worst_case: 0,
        }
    }

    fn add(
        &mut self,
        m: &mut Model,
        var: VarId,
        coefficient: i64,
        var_upper_bound: i64,
    ) -> Result<(), ModelBuildError> {
        if coefficient == 0 {
            return Ok(());
        }
        if coefficient < 0 {
            tracing::warn!(coefficient, "Dropping negative objective coefficient");
            return Ok(());
        }
        if coefficient > i64::from(i32::MAX) {
            return Err(ModelBuildError::CoefficientOverflow(coefficient));
        }
        self.worst_case = self
            .worst_case
            .saturating_add(coefficient.saturating_mul(var_upper_bound));
        if self.worst_case > i64::from(i32::MAX) {
            return Err(ModelBuildError::ObjectiveOverflow(self.worst_case));
        }
        let weight = m.int(coefficient as i32, coefficient as i32);
        let term = m.mul(var, weight);
        self.terms.push(term);
        Ok(())
    }

    fn into_objective(self, m: &mut Model) -> Option<VarId> {
        if self.terms.is_empty() {
            None
        } else {
            Some(m.sum(&self.terms))
        }
    }
}

/// Builds the full constraint model for one solve attempt.
pub fn build_model(
    ctx: &PlanningContext,
    multipliers: &PenaltyMultipliers,
) -> Result<ScheduleModel, ModelBuildError> {
    let num_facilities = ctx.num_facilities();
    let num_employees = ctx.num_employees();
    let num_days = ctx.horizon.num_days();
    let settings = &ctx.settings;

    let mut m = Model::default();

    // Decision variables. Availability and facility preference are enforced
    // by omission: a variable that would violate either is never created.
    let mut x: HashMap<(usize, usize, usize, usize), VarId> = HashMap::new();
    for f in 0..num_facilities {
        for e in 0..num_employees {
            if !ctx.admissible(e, f) {
                continue;
            }
            for d in 0..num_days {
                for h in 0..HOURS_IN_DAY {
                    if ctx.availability.is_available(e, d, h) {
                        x.insert((f, e, d, h), m.int(0, 1));
                    }
                }
            }
        }
    }
    tracing::debug!(num_vars = x.len(), "Created assignment variables");

    // works_hour[e][d][h]: whether the employee works that hour, with at most
    // one facility per hour.
    let mut works_hour: Vec<Vec<Vec<Option<VarId>>>> =
        vec![vec![vec![None; HOURS_IN_DAY]; num_days]; num_employees];
    for e in 0..num_employees {
        for d in 0..num_days {
            for h in 0..HOURS_IN_DAY {
                let vars: Vec<VarId> = (0..num_facilities)
                    .filter_map(|f| x.get(&(f, e, d, h)).copied())
                    .collect();
                works_hour[e][d][h] = match vars.as_slice() {
                    [] => None,
                    [only] => Some(*only),
                    _ => {
                        let total = m.sum(&vars);
                        m.c(total).le(int(1));
                        Some(total)
                    }
                };
            }
        }
    }

    // works_on_day[e][d] is 1 exactly when some hour of the day is worked.
    let mut works_on_day: Vec<Vec<VarId>> = Vec::with_capacity(num_employees);
    let mut day_hours: Vec<Vec<Option<VarId>>> = Vec::with_capacity(num_employees);
    for e in 0..num_employees {
        let mut per_day = Vec::with_capacity(num_days);
        let mut per_day_hours = Vec::with_capacity(num_days);
        for d in 0..num_days {
            let mut day_vars: Vec<VarId> = Vec::new();
            for f in 0..num_facilities {
                for h in 0..HOURS_IN_DAY {
                    if let Some(&var) = x.get(&(f, e, d, h)) {
                        day_vars.push(var);
                    }
                }
            }
            let works = m.int(0, 1);
            if day_vars.is_empty() {
                m.c(works).eq(int(0));
                per_day_hours.push(None);
            } else {
                let total = m.sum(&day_vars);
                m.c(works).le(total);
                let ceiling_weight = m.int(HOURS_IN_DAY as i32, HOURS_IN_DAY as i32);
                let ceiling = m.mul(works, ceiling_weight);
                m.c(total).le(ceiling);
                per_day_hours.push(Some(total));
            }
            per_day.push(works);
        }
        works_on_day.push(per_day);
        day_hours.push(per_day_hours);
    }

    // Hard weekly hour cap over aligned seven-day windows.
    for e in 0..num_employees {
        for week_start in (0..num_days).step_by(7) {
            let window: Vec<VarId> = (week_start..(week_start + 7).min(num_days))
                .filter_map(|d| day_hours[e][d])
                .collect();
            if window.is_empty() {
                continue;
            }
            let weekly_hours = m.sum(&window);
            m.c(weekly_hours).le(int(MAX_WEEKLY_HOURS));
        }
    }

    add_rest_constraints(&mut m, &works_hour, num_days);
    add_overnight_continuity(&mut m, ctx, &x);

    // Soft penalties and the direct difficulty cost.
    let mut objective = ObjectiveTerms::new();

    let max_consecutive = settings.max_consecutive_work_days as usize;
    if max_consecutive > 0 && num_days > max_consecutive {
        let coefficient =
            (settings.consecutive_days_penalty * multipliers.consecutive_days).round() as i64;
        let excess_bound = max_consecutive as i32 + 2;
        for e in 0..num_employees {
            for window_start in 0..(num_days - max_consecutive) {
                let window = works_on_day[e][window_start..=window_start + max_consecutive].to_vec();
                let days_worked = m.sum(&window);
                let limit = m.int(max_consecutive as i32, max_consecutive as i32);
                let over = m.sub(days_worked, limit);
                let excess = m.int(0, excess_bound);
                m.c(excess).ge(over);
                objective.add(&mut m, excess, coefficient, i64::from(excess_bound))?;
            }
        }
    }

    let weekly_days_coefficient =
        (settings.weekly_days_penalty * multipliers.weekly_days).round() as i64;
    for e in 0..num_employees {
        let max_days = ctx.employees[e].contract_max_days_per_week as i32;
        for week_start in (0..num_days).step_by(7) {
            let window = works_on_day[e][week_start..(week_start + 7).min(num_days)].to_vec();
            let days_in_week = m.sum(&window);
            let limit = m.int(max_days, max_days);
            let over = m.sub(days_in_week, limit);
            let excess = m.int(0, 8);
            m.c(excess).ge(over);
            objective.add(&mut m, excess, weekly_days_coefficient, 8)?;
        }
    }

    let daily_hours_coefficient =
        (settings.daily_hours_penalty * multipliers.daily_hours).round() as i64;
    for e in 0..num_employees {
        let max_hours = ctx.employees[e].contract_max_hours_per_day as i32;
        for d in 0..num_days {
            let Some(total) = day_hours[e][d] else { continue };
            let limit = m.int(max_hours, max_hours);
            let over = m.sub(total, limit);
            let excess = m.int(0, HOURS_IN_DAY as i32 + 1);
            m.c(excess).ge(over);
            objective.add(
                &mut m,
                excess,
                daily_hours_coefficient,
                HOURS_IN_DAY as i64 + 1,
            )?;
        }
    }

    for f in 0..num_facilities {
        let facility = &ctx.facilities[f];
        let base = facility
            .staff_shortage_penalty_override
            .unwrap_or(settings.staff_shortage_penalty)
            * facility.staff_shortage_penalty_multiplier.unwrap_or(1.0);
        for d in 0..num_days {
            for h in 0..HOURS_IN_DAY {
                let required = ctx.required(f, d, h);
                let staff: Vec<VarId> = (0..num_employees)
                    .filter_map(|e| x.get(&(f, e, d, h)).copied())
                    .collect();
                let shortage = m.int(0, required as i32);
                if staff.is_empty() {
                    m.c(shortage).eq(int(required as i32));
                } else {
                    let assigned = m.sum(&staff);
                    let target = m.int(required as i32, required as i32);
                    let gap = m.sub(target, assigned);
                    m.c(shortage).ge(gap);
                }
                let coefficient =
                    (base * multipliers.staff_shortage * ctx.difficulty.score(d, h)).round() as i64;
                objective.add(&mut m, shortage, coefficient, i64::from(required))?;
            }
        }
    }

    add_fairness_terms(&mut m, ctx, multipliers, &x, &mut objective)?;

    // Direct difficulty cost: breaks ties toward easier cells.
    for f in 0..num_facilities {
        for e in 0..num_employees {
            for d in 0..num_days {
                for h in 0..HOURS_IN_DAY {
                    let Some(&var) = x.get(&(f, e, d, h)) else {
                        continue;
                    };
                    let coefficient = (ctx.difficulty.score(d, h)
                        * settings.global_difficulty_cost_multiplier
                        * DIFFICULTY_SCALE)
                        .round() as i64;
                    objective.add(&mut m, var, coefficient, 1)?;
                }
            }
        }
    }

    let objective = objective.into_objective(&mut m);
    Ok(ScheduleModel {
        model: m,
        x,
        objective,
    })
}

/// After an end-of-shift hour, the next `MIN_REST_HOURS` hours must stay
/// free. `end[t] <=> works[t] && !works[t+1]`, with the biconditional closed
/// as `end = works[t]` at gaps and at the horizon boundary.
fn add_rest_constraints(
    m: &mut Model,
    works_hour: &[Vec<Vec<Option<VarId>>>],
    num_days: usize,
) {
    let total_hours = num_days * HOURS_IN_DAY;
    for per_employee in works_hour {
        let flat = |t: usize| per_employee[t / HOURS_IN_DAY][t % HOURS_IN_DAY];
        for t in 0..total_hours {
            let Some(works_now) = flat(t) else { continue };
            let targets: Vec<VarId> = (2..=MIN_REST_HOURS)
                .filter_map(|k| (t + k < total_hours).then(|| flat(t + k)).flatten())
                .collect();
            if targets.is_empty() {
                continue;
            }
            let end_of_shift = m.int(0, 1);
            match (t + 1 < total_hours).then(|| flat(t + 1)).flatten() {
                Some(works_next) => {
                    m.c(end_of_shift).le(works_now);
                    let dropped = m.sub(works_now, works_next);
                    m.c(end_of_shift).ge(dropped);
                    let overlap = m.add(end_of_shift, works_next);
                    m.c(overlap).le(int(1));
                }
                None => {
                    m.c(end_of_shift).eq(works_now);
                }
            }
            for target in targets {
                let clash = m.add(target, end_of_shift);
                m.c(clash).le(int(1));
            }
        }
    }
}

/// Anchored on the first hour of a recorded overnight window: once that hour
/// goes to a facility, the whole window goes there and nowhere else.
fn add_overnight_continuity(
    m: &mut Model,
    ctx: &PlanningContext,
    x: &HashMap<(usize, usize, usize, usize), VarId>,
) {
    let num_days = ctx.horizon.num_days();
    let mut keys: Vec<(usize, usize)> = ctx.night_shifts.keys().copied().collect();
    keys.sort_unstable();

    for (e, d) in keys {
        let night = ctx.night_shifts[&(e, d)];
        let mut span: Vec<(usize, usize)> =
            (night.start_hour..HOURS_IN_DAY).map(|h| (d, h)).collect();
        if d + 1 < num_days {
            span.extend((0..night.end_hour.min(HOURS_IN_DAY)).map(|h| (d + 1, h)));
        }
        let first = (d, night.start_hour);

        for f in 0..ctx.num_facilities() {
            let Some(&anchor) = x.get(&(f, e, first.0, first.1)) else {
                continue;
            };
            for &(dd, hh) in &span {
                if (dd, hh) == first {
                    continue;
                }
                if let Some(&same_facility) = x.get(&(f, e, dd, hh)) {
                    m.c(anchor).le(same_facility);
                }
                for g in 0..ctx.num_facilities() {
                    if g == f {
                        continue;
                    }
                    if let Some(&other_facility) = x.get(&(g, e, dd, hh)) {
                        let clash = m.add(anchor, other_facility);
                        m.c(clash).le(int(1));
                    }
                }
            }
        }
    }
}

/// Penalizes the gap between the most and least difficulty-burdened
/// employees, compressing how unevenly hard hours are spread.
fn add_fairness_terms(
    m: &mut Model,
    ctx: &PlanningContext,
    multipliers: &PenaltyMultipliers,
    x: &HashMap<(usize, usize, usize, usize), VarId>,
    objective: &mut ObjectiveTerms,
) -> Result<(), ModelBuildError> {
    let coefficient = (ctx.settings.difficulty_fairness_penalty
        * multipliers.difficulty_fairness)
        .round() as i64;
    if coefficient <= 0 || ctx.num_employees() < 2 {
        return Ok(());
    }

    let num_days = ctx.horizon.num_days();
    let mut totals = Vec::with_capacity(ctx.num_employees());
    let mut highest_bound: i64 = 0;
    for e in 0..ctx.num_employees() {
        let mut parts = Vec::new();
        let mut bound: i64 = 0;
        for d in 0..num_days {
            for h in 0..HOURS_IN_DAY {
                let scaled = ctx.difficulty.scaled(d, h);
                if scaled > i64::from(i32::MAX) {
                    return Err(ModelBuildError::CoefficientOverflow(scaled));
                }
                let mut hour_counted = false;
                for f in 0..ctx.num_facilities() {
                    if let Some(&var) = x.get(&(f, e, d, h)) {
                        let weight = m.int(scaled as i32, scaled as i32);
                        parts.push(m.mul(var, weight));
                        hour_counted = true;
                    }
                }
                if hour_counted {
                    bound = bound.saturating_add(scaled);
                }
            }
        }
        if bound > i64::from(i32::MAX) {
            return Err(ModelBuildError::ObjectiveOverflow(bound));
        }
        highest_bound = highest_bound.max(bound);
        let total = if parts.is_empty() {
            m.int(0, 0)
        } else {
            m.sum(&parts)
        };
        totals.push(total);
    }

    let highest = m.int(0, highest_bound as i32);
    let lowest = m.int(0, highest_bound as i32);
    for &total in &totals {
        m.c(highest).ge(total);
        m.c(lowest).le(total);
    }
    let gap = m.sub(highest, lowest);
    objective.add(m, gap, coefficient, highest_bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::types::SolveRequest;

    fn context(staff_shortage_penalty: f64) -> PlanningContext {
        let request: SolveRequest = serde_json::from_value(json!({
            "schedule_input": {
                "settings": {
                    "planning_start_date": "2025-06-09",
                    "num_days_in_planning_period": 1,
                    "cleaning_shift_start_hour": 10,
                    "cleaning_shift_end_hour": 15,
                    "staff_shortage_penalty": staff_shortage_penalty
                },
                "facilities": [{ "id": "facility-a" }],
                "employees": [{
                    "id": "emp-1",
                    "availability": [
                        { "day_of_week": "Mon", "start_time": "09:00", "end_time": "17:00" }
                    ]
                }]
            },
            "cleaning_tasks_input": {}
        }))
        .unwrap();
        PlanningContext::prepare(&request)
    }

    #[test]
    fn builds_sparse_variables_and_objective() {
        let ctx = context(100_000.0);
        let built = build_model(&ctx, &PenaltyMultipliers::default()).unwrap();

        // One facility, one employee, eight available hours.
        assert_eq!(built.x.len(), 8);
        assert!(built.x.contains_key(&(0, 0, 0, 9)));
        assert!(!built.x.contains_key(&(0, 0, 0, 8)));
        assert!(built.objective.is_some());
    }

    #[test]
    fn oversized_penalty_is_rejected_before_solving() {
        let ctx = context(1e18);
        let err = build_model(&ctx, &PenaltyMultipliers::default()).unwrap_err();
        assert!(matches!(
            err,
            ModelBuildError::CoefficientOverflow(_) | ModelBuildError::ObjectiveOverflow(_)
        ));
    }

    #[test]
    fn relaxed_multipliers_shrink_the_coefficients_enough_to_build() {
        // Too big at full strength, fine once the retry loop has relaxed it.
        let ctx = context(2.2e9);
        assert!(build_model(&ctx, &PenaltyMultipliers::default()).is_err());

        let relaxed = PenaltyMultipliers::default().reduced(0.2).reduced(0.2);
        assert!(build_model(&ctx, &relaxed).is_ok());
    }
}
