use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use selen::prelude::*;
use shared::types::{
    AppliedConstraintsSettings, ScheduleResult, SoftPenaltySetting, SolveRequest, SolveResponse,
    SolveStatus,
};
use uuid::Uuid;

use crate::domain::context::PlanningContext;
use crate::domain::extract::{AssignmentGrid, extract_result};
use crate::domain::model::{ScheduleModel, build_model};

/// Total number of model builds before an infeasible input is given up on.
pub const MAX_RETRY_ATTEMPTS: u32 = 3;
/// Factor applied to every soft-penalty multiplier after an infeasible
/// attempt.
pub const PENALTY_REDUCTION_FACTOR: f64 = 0.2;

/// Per-category scaling of the soft-penalty baselines. The retry controller
/// shrinks every entry between attempts; within one attempt the vector is
/// immutable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyMultipliers {
    pub consecutive_days: f64,
    pub weekly_days: f64,
    pub daily_hours: f64,
    pub staff_shortage: f64,
    pub difficulty_fairness: f64,
}

impl Default for PenaltyMultipliers {
    fn default() -> Self {
        Self {
            consecutive_days: 1.0,
            weekly_days: 1.0,
            daily_hours: 1.0,
            staff_shortage: 1.0,
            difficulty_fairness: 1.0,
        }
    }
}

impl PenaltyMultipliers {
    pub fn reduced(&self, factor: f64) -> Self {
        Self {
            consecutive_days: self.consecutive_days * factor,
            weekly_days: self.weekly_days * factor,
            daily_hours: self.daily_hours * factor,
            staff_shortage: self.staff_shortage * factor,
            difficulty_fairness: self.difficulty_fairness * factor,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Wall-clock budget for each solve attempt.
    pub time_limit: Duration,
}

/// What one solve attempt produced.
#[derive(Debug)]
pub struct AttemptOutcome {
    pub status: SolveStatus,
    pub objective: Option<f64>,
    pub wall_time_sec: Option<f64>,
    pub grid: Option<AssignmentGrid>,
    pub message: Option<String>,
}

impl AttemptOutcome {
    fn without_solution(status: SolveStatus, wall_time_sec: Option<f64>, message: String) -> Self {
        Self {
            status,
            objective: None,
            wall_time_sec,
            grid: None,
            message: Some(message),
        }
    }
}

/// Solves a scheduling request end to end, including the penalty-relaxation
/// retry loop. This is the in-process entry point; the HTTP handler is a thin
/// wrapper around it.
pub fn solve_schedule(request: &SolveRequest, options: &SolveOptions) -> SolveResponse {
    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(8);
    tracing::info!(
        num_employees = request.schedule_input.employees.len(),
        num_facilities = request.schedule_input.facilities.len(),
        num_days = request.schedule_input.settings.num_days_in_planning_period,
        search_workers = workers,
        "Preparing schedule solve"
    );

    let ctx = Arc::new(PlanningContext::prepare(request));
    solve_with_attempt_runner(ctx, options, run_attempt)
}

/// The retry controller, with the attempt itself pluggable so the relaxation
/// loop can be driven without a live solver run.
///
/// Attempt settings are appended to the history before solving, so failed
/// attempts leave an audit trail too.
pub fn solve_with_attempt_runner<F>(
    ctx: Arc<PlanningContext>,
    options: &SolveOptions,
    mut run: F,
) -> SolveResponse
where
    F: FnMut(&Arc<PlanningContext>, &PenaltyMultipliers, Duration) -> AttemptOutcome,
{
    let mut multipliers = PenaltyMultipliers::default();
    let mut history: Vec<AppliedConstraintsSettings> = Vec::new();
    let mut attempt: u32 = 0;

    loop {
        let run_id = format!("attempt_{attempt}_{}", Uuid::new_v4().simple());
        let applied = applied_settings(&ctx, attempt, &run_id, &multipliers);
        history.push(applied.clone());

        tracing::info!(
            %run_id,
            attempt,
            time_limit_sec = options.time_limit.as_secs(),
            "Starting solve attempt"
        );
        let outcome = run(&ctx, &multipliers, options.time_limit);
        tracing::info!(
            %run_id,
            status = %outcome.status,
            wall_time_sec = outcome.wall_time_sec,
            "Solve attempt finished"
        );

        let last_attempt = attempt + 1 >= MAX_RETRY_ATTEMPTS;
        match outcome.status {
            SolveStatus::Optimal | SolveStatus::Feasible => {
                return SolveResponse {
                    schedule_result: success_result(&ctx, outcome, applied, run_id),
                    applied_constraints_history: history,
                };
            }
            SolveStatus::Infeasible if !last_attempt => {
                tracing::warn!(
                    %run_id,
                    next_attempt = attempt + 1,
                    "Infeasible; relaxing soft penalties and retrying"
                );
                multipliers = multipliers.reduced(PENALTY_REDUCTION_FACTOR);
                attempt += 1;
            }
            status => {
                if status == SolveStatus::Infeasible {
                    tracing::error!(%run_id, "Still infeasible after {MAX_RETRY_ATTEMPTS} attempts");
                }
                return SolveResponse {
                    schedule_result: failure_result(status, outcome, applied, run_id),
                    applied_constraints_history: history,
                };
            }
        }
    }
}

/// Messages from a solver thread: at most one incumbent from the feasibility
/// pass, then exactly one final outcome.
enum AttemptMessage {
    Incumbent(AttemptOutcome),
    Final(AttemptOutcome),
}

/// Solver threads currently alive, including orphans whose caller already
/// exhausted its budget and moved on.
static LIVE_SOLVE_THREADS: AtomicUsize = AtomicUsize::new(0);

/// Runs one attempt on a dedicated thread so the wall-clock budget can be
/// enforced from outside. The thread reports the feasibility pass's solution
/// as an incumbent before optimizing, so a budget overrun returns the best
/// solution found so far as `FEASIBLE`, or `UNKNOWN` when the budget ran out
/// before any solution existed.
pub fn run_attempt(
    ctx: &Arc<PlanningContext>,
    multipliers: &PenaltyMultipliers,
    time_limit: Duration,
) -> AttemptOutcome {
    let (tx, rx) = mpsc::channel();
    let thread_ctx = Arc::clone(ctx);
    let thread_multipliers = *multipliers;

    LIVE_SOLVE_THREADS.fetch_add(1, Ordering::Relaxed);
    let spawned = thread::Builder::new()
        .name("roster-solve".into())
        .spawn(move || {
            solve_attempt(&thread_ctx, &thread_multipliers, &tx);
            LIVE_SOLVE_THREADS.fetch_sub(1, Ordering::Relaxed);
        });
    if let Err(e) = spawned {
        LIVE_SOLVE_THREADS.fetch_sub(1, Ordering::Relaxed);
        return AttemptOutcome::without_solution(
            SolveStatus::Unknown,
            None,
            format!("failed to spawn solver thread: {e}"),
        );
    }

    // Absurd budgets are clamped instead of overflowing the monotonic clock.
    let time_limit = time_limit.min(Duration::from_secs(86_400 * 365));
    let deadline = Instant::now() + time_limit;
    let mut incumbent: Option<AttemptOutcome> = None;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(AttemptMessage::Incumbent(outcome)) => incumbent = Some(outcome),
            Ok(AttemptMessage::Final(outcome)) => return outcome,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let live_threads = LIVE_SOLVE_THREADS.load(Ordering::Relaxed);
                tracing::warn!(
                    time_limit_sec = time_limit.as_secs(),
                    live_solve_threads = live_threads,
                    "Solve attempt exceeded its wall-clock budget; thread left to finish in the background"
                );
                return match incumbent {
                    Some(mut outcome) => {
                        outcome.wall_time_sec = Some(time_limit.as_secs_f64());
                        outcome.message = Some(
                            "wall-clock budget exhausted; returning the best solution found so far"
                                .into(),
                        );
                        outcome
                    }
                    None => AttemptOutcome::without_solution(
                        SolveStatus::Unknown,
                        Some(time_limit.as_secs_f64()),
                        "wall-clock budget exhausted before any solution was found".into(),
                    ),
                };
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return incumbent.unwrap_or_else(|| {
                    AttemptOutcome::without_solution(
                        SolveStatus::Unknown,
                        None,
                        "solver thread exited without a result".into(),
                    )
                });
            }
        }
    }
}

fn send_final(sender: &mpsc::Sender<AttemptMessage>, outcome: AttemptOutcome) {
    let status = outcome.status;
    if sender.send(AttemptMessage::Final(outcome)).is_err() {
        tracing::info!(%status, "Orphaned solve attempt finished after its caller moved on");
    }
}

/// Two-pass attempt: a plain feasibility solve first (cheap, proves
/// INFEASIBLE early, and leaves an incumbent for budget overruns), then the
/// optimizing pass on a fresh build (solving consumes the model).
fn solve_attempt(
    ctx: &PlanningContext,
    multipliers: &PenaltyMultipliers,
    sender: &mpsc::Sender<AttemptMessage>,
) {
    let started = Instant::now();
    let built = match build_model(ctx, multipliers) {
        Ok(built) => built,
        Err(e) => {
            tracing::error!(error = %e, "Model rejected before solving");
            send_final(
                sender,
                AttemptOutcome::without_solution(
                    SolveStatus::ModelInvalid,
                    Some(started.elapsed().as_secs_f64()),
                    e.to_string(),
                ),
            );
            return;
        }
    };

    let ScheduleModel {
        model,
        x,
        objective,
    } = built;
    let feasible = match model.solve() {
        Ok(solution) => {
            let mut grid = AssignmentGrid::new(ctx.num_employees(), ctx.horizon.num_days());
            for (&(f, e, d, h), &var) in &x {
                if solution.get::<i32>(var) == 1 {
                    grid.assign(e, d, h, f);
                }
            }
            let objective_value = objective.map(|var| f64::from(solution.get::<i32>(var)));
            AttemptOutcome {
                status: SolveStatus::Feasible,
                objective: objective_value,
                wall_time_sec: Some(started.elapsed().as_secs_f64()),
                grid: Some(grid),
                message: None,
            }
        }
        Err(e) => {
            send_final(
                sender,
                AttemptOutcome::without_solution(
                    SolveStatus::Infeasible,
                    Some(started.elapsed().as_secs_f64()),
                    format!("solver found no solution: {e:?}"),
                ),
            );
            return;
        }
    };

    if objective.is_none() {
        // Nothing to optimize, so the feasible solution is already final.
        let mut outcome = feasible;
        outcome.status = SolveStatus::Optimal;
        send_final(sender, outcome);
        return;
    }

    if sender.send(AttemptMessage::Incumbent(feasible)).is_err() {
        tracing::debug!("Caller gave up before the optimizing pass; skipping it");
        return;
    }

    let rebuilt = match build_model(ctx, multipliers) {
        Ok(rebuilt) => rebuilt,
        Err(e) => {
            send_final(
                sender,
                AttemptOutcome::without_solution(
                    SolveStatus::ModelInvalid,
                    Some(started.elapsed().as_secs_f64()),
                    e.to_string(),
                ),
            );
            return;
        }
    };
    let ScheduleModel {
        model,
        x,
        objective,
    } = rebuilt;
    let solved = match objective {
        Some(objective_var) => model.minimize(objective_var),
        None => model.solve(),
    };
    let wall_time = started.elapsed().as_secs_f64();

    let outcome = match solved {
        Ok(solution) => {
            let mut grid = AssignmentGrid::new(ctx.num_employees(), ctx.horizon.num_days());
            for (&(f, e, d, h), &var) in &x {
                if solution.get::<i32>(var) == 1 {
                    grid.assign(e, d, h, f);
                }
            }
            let objective_value = objective.map(|var| f64::from(solution.get::<i32>(var)));
            AttemptOutcome {
                status: SolveStatus::Optimal,
                objective: objective_value,
                wall_time_sec: Some(wall_time),
                grid: Some(grid),
                message: None,
            }
        }
        Err(e) => AttemptOutcome::without_solution(
            SolveStatus::Infeasible,
            Some(wall_time),
            format!("solver found no solution: {e:?}"),
        ),
    };
    send_final(sender, outcome);
}

fn applied_settings(
    ctx: &PlanningContext,
    attempt: u32,
    run_id: &str,
    multipliers: &PenaltyMultipliers,
) -> AppliedConstraintsSettings {
    let settings = &ctx.settings;
    let mut soft = BTreeMap::new();
    soft.insert(
        "consecutive_days".to_owned(),
        SoftPenaltySetting {
            base_penalty: settings.consecutive_days_penalty,
            multiplier: multipliers.consecutive_days,
        },
    );
    soft.insert(
        "weekly_days".to_owned(),
        SoftPenaltySetting {
            base_penalty: settings.weekly_days_penalty,
            multiplier: multipliers.weekly_days,
        },
    );
    soft.insert(
        "daily_hours".to_owned(),
        SoftPenaltySetting {
            base_penalty: settings.daily_hours_penalty,
            multiplier: multipliers.daily_hours,
        },
    );
    soft.insert(
        "staff_shortage".to_owned(),
        SoftPenaltySetting {
            base_penalty: settings.staff_shortage_penalty,
            multiplier: multipliers.staff_shortage,
        },
    );
    soft.insert(
        "difficulty_fairness".to_owned(),
        SoftPenaltySetting {
            base_penalty: settings.difficulty_fairness_penalty,
            multiplier: multipliers.difficulty_fairness,
        },
    );

    AppliedConstraintsSettings {
        run_id: run_id.to_owned(),
        retry_attempt: attempt,
        hard_constraints: [
            "employee_availability_and_preferred_facility",
            "employee_one_facility_at_a_time",
            "works_on_day_definition",
            "max_weekly_hours_cap",
            "min_rest_hours_between_shifts",
            "night_shift_facility_continuity",
        ]
        .map(String::from)
        .to_vec(),
        soft_constraints_settings: soft,
    }
}

fn success_result(
    ctx: &PlanningContext,
    outcome: AttemptOutcome,
    applied: AppliedConstraintsSettings,
    run_id: String,
) -> ScheduleResult {
    let grid = outcome
        .grid
        .unwrap_or_else(|| AssignmentGrid::new(ctx.num_employees(), ctx.horizon.num_days()));
    let (assignments, shortage_shifts_details, diagnostics) = extract_result(ctx, &grid);
    tracing::info!(
        num_assignments = assignments.len(),
        num_shortage_cells = shortage_shifts_details.len(),
        "Extracted schedule"
    );
    ScheduleResult {
        status: outcome.status,
        objective: outcome.objective,
        wall_time_sec: outcome.wall_time_sec,
        assignments,
        shortage_shifts_details,
        diagnostics: Some(diagnostics),
        applied_constraints_settings: applied,
        run_id,
        message: outcome.message,
    }
}

fn failure_result(
    status: SolveStatus,
    outcome: AttemptOutcome,
    applied: AppliedConstraintsSettings,
    run_id: String,
) -> ScheduleResult {
    let message = outcome
        .message
        .unwrap_or_else(|| format!("No solution found (status: {status})"));
    ScheduleResult {
        status,
        objective: None,
        wall_time_sec: outcome.wall_time_sec,
        assignments: Vec::new(),
        shortage_shifts_details: Vec::new(),
        diagnostics: None,
        applied_constraints_settings: applied,
        run_id,
        message: Some(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipliers_start_at_one() {
        let multipliers = PenaltyMultipliers::default();
        assert_eq!(multipliers.consecutive_days, 1.0);
        assert_eq!(multipliers.weekly_days, 1.0);
        assert_eq!(multipliers.daily_hours, 1.0);
        assert_eq!(multipliers.staff_shortage, 1.0);
        assert_eq!(multipliers.difficulty_fairness, 1.0);
    }

    #[test]
    fn reduction_scales_every_category() {
        let twice = PenaltyMultipliers::default()
            .reduced(PENALTY_REDUCTION_FACTOR)
            .reduced(PENALTY_REDUCTION_FACTOR);
        assert!((twice.consecutive_days - 0.04).abs() < 1e-12);
        assert!((twice.weekly_days - 0.04).abs() < 1e-12);
        assert!((twice.daily_hours - 0.04).abs() < 1e-12);
        assert!((twice.staff_shortage - 0.04).abs() < 1e-12);
        assert!((twice.difficulty_fairness - 0.04).abs() < 1e-12);
    }
}
