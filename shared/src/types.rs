use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// region: Solve Request Types

/// Full request payload: the scheduling world plus the cleaning-task volumes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SolveRequest {
    pub schedule_input: ScheduleInput,
    pub cleaning_tasks_input: CleaningTasksInput,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduleInput {
    pub settings: Settings,
    pub facilities: Vec<Facility>,
    pub employees: Vec<Employee>,
}

/// Planning-period settings and penalty baselines.
///
/// Only the horizon and the cleaning window are mandatory; every penalty and
/// difficulty knob falls back to the documented default.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Settings {
    pub planning_start_date: NaiveDate,
    pub num_days_in_planning_period: usize,
    #[serde(default = "default_days_of_week_order")]
    pub days_of_week_order: Vec<String>,
    pub cleaning_shift_start_hour: u32,
    pub cleaning_shift_end_hour: u32,
    #[serde(default = "default_max_consecutive_work_days")]
    pub max_consecutive_work_days: u32,
    #[serde(default)]
    pub time_limit_sec: Option<u64>,

    #[serde(default = "default_consecutive_days_penalty")]
    pub consecutive_days_penalty: f64,
    #[serde(default = "default_weekly_days_penalty")]
    pub weekly_days_penalty: f64,
    #[serde(default = "default_daily_hours_penalty")]
    pub daily_hours_penalty: f64,
    #[serde(default = "default_staff_shortage_penalty")]
    pub staff_shortage_penalty: f64,
    #[serde(default = "default_difficulty_fairness_penalty")]
    pub difficulty_fairness_penalty: f64,

    #[serde(default = "default_base_difficulty_score_per_hour")]
    pub base_difficulty_score_per_hour: f64,
    #[serde(default = "default_night_hour_multiplier")]
    pub night_hour_multiplier: f64,
    #[serde(default = "default_weekend_day_multiplier")]
    pub weekend_day_multiplier: f64,
    #[serde(default = "default_global_difficulty_cost_multiplier")]
    pub global_difficulty_cost_multiplier: f64,
    #[serde(default = "default_night_hours_start")]
    pub night_hours_start: u32,
    #[serde(default = "default_night_hours_end")]
    pub night_hours_end: u32,
}

fn default_days_of_week_order() -> Vec<String> {
    ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
        .map(String::from)
        .to_vec()
}

fn default_max_consecutive_work_days() -> u32 {
    5
}

fn default_consecutive_days_penalty() -> f64 {
    50_000.0
}

fn default_weekly_days_penalty() -> f64 {
    40_000.0
}

fn default_daily_hours_penalty() -> f64 {
    30_000.0
}

fn default_staff_shortage_penalty() -> f64 {
    100_000.0
}

fn default_difficulty_fairness_penalty() -> f64 {
    1.0
}

fn default_base_difficulty_score_per_hour() -> f64 {
    1.0
}

fn default_night_hour_multiplier() -> f64 {
    1.5
}

fn default_weekend_day_multiplier() -> f64 {
    1.25
}

fn default_global_difficulty_cost_multiplier() -> f64 {
    1.0
}

fn default_night_hours_start() -> u32 {
    22
}

fn default_night_hours_end() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Facility {
    pub id: String,
    #[serde(default = "default_cleaning_capacity")]
    pub cleaning_capacity_tasks_per_hour_per_employee: f64,
    /// Replaces the global staff-shortage penalty baseline for this facility.
    #[serde(default)]
    pub staff_shortage_penalty_override: Option<f64>,
    /// Scales the staff-shortage penalty baseline for this facility.
    #[serde(default)]
    pub staff_shortage_penalty_multiplier: Option<f64>,
}

fn default_cleaning_capacity() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Employee {
    pub id: String,
    /// Empty list means the employee may be assigned anywhere.
    #[serde(default)]
    pub preferred_facilities: Vec<String>,
    #[serde(default)]
    pub availability: Vec<AvailabilitySlot>,
    #[serde(default = "default_contract_max_days_per_week")]
    pub contract_max_days_per_week: u32,
    #[serde(default = "default_contract_max_hours_per_day")]
    pub contract_max_hours_per_day: u32,
}

fn default_contract_max_days_per_week() -> u32 {
    7
}

fn default_contract_max_hours_per_day() -> u32 {
    24
}

/// One recurring weekly availability window.
///
/// Every field is defaulted so a malformed slot degrades to a skipped slot
/// instead of rejecting the whole request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AvailabilitySlot {
    #[serde(default)]
    pub day_of_week: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    /// Marks a window that wraps past midnight into the next day.
    #[serde(default)]
    pub is_night_shift: bool,
}

/// Cleaning-task volumes per facility id.
pub type CleaningTasksInput = BTreeMap<String, FacilityCleaningTasks>;

/// Task counts for one facility: date-specific entries grouped under their
/// day-of-week label, with an optional per-day-of-week fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct FacilityCleaningTasks {
    #[serde(default)]
    pub default_tasks_for_day_of_week: BTreeMap<String, u32>,
    /// `day-of-week -> ("YYYY-MM-DD" -> task count)`
    #[serde(flatten)]
    pub tasks_by_day_of_week: BTreeMap<String, BTreeMap<String, u32>>,
}

// endregion: Solve Request Types

// region: Solve Result Types

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    ModelInvalid,
    Unknown,
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Optimal => "OPTIMAL",
            Self::Feasible => "FEASIBLE",
            Self::Infeasible => "INFEASIBLE",
            Self::ModelInvalid => "MODEL_INVALID",
            Self::Unknown => "UNKNOWN",
        })
    }
}

/// A maximal contiguous run of assigned hours for one employee at one
/// facility on one date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Assignment {
    pub employee_id: String,
    pub facility_id: String,
    pub date: NaiveDate,
    pub start_hour: u32,
    pub end_hour: u32,
    pub difficulty_score_avg: f64,
}

/// An hour cell where fewer employees were assigned than required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ShortageShift {
    pub facility_id: String,
    pub date: NaiveDate,
    pub hour: u32,
    pub required_staff: u32,
    pub assigned_staff: u32,
    pub shortage: u32,
    pub difficulty_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ScheduleDiagnostics {
    pub hours_worked_per_employee: BTreeMap<String, u32>,
    pub days_worked_per_employee: BTreeMap<String, u32>,
    pub total_difficulty_score_per_employee: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct SoftPenaltySetting {
    pub base_penalty: f64,
    pub multiplier: f64,
}

/// The constraint configuration one solve attempt ran with.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppliedConstraintsSettings {
    pub run_id: String,
    pub retry_attempt: u32,
    pub hard_constraints: Vec<String>,
    pub soft_constraints_settings: BTreeMap<String, SoftPenaltySetting>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScheduleResult {
    pub status: SolveStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wall_time_sec: Option<f64>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub shortage_shifts_details: Vec<ShortageShift>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<ScheduleDiagnostics>,
    pub applied_constraints_settings: AppliedConstraintsSettings,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Full response payload: the final result plus the per-attempt audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SolveResponse {
    pub schedule_result: ScheduleResult,
    pub applied_constraints_history: Vec<AppliedConstraintsSettings>,
}

// endregion: Solve Result Types

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_tasks_flatten_keeps_default_separate() {
        let json = serde_json::json!({
            "Mon": {"2025-06-09": 40},
            "Tue": {"2025-06-10": 12},
            "default_tasks_for_day_of_week": {"Mon": 20, "Sun": 5}
        });

        let tasks: FacilityCleaningTasks = serde_json::from_value(json).unwrap();
        assert_eq!(tasks.tasks_by_day_of_week["Mon"]["2025-06-09"], 40);
        assert_eq!(tasks.tasks_by_day_of_week["Tue"]["2025-06-10"], 12);
        assert_eq!(tasks.default_tasks_for_day_of_week["Sun"], 5);
        assert!(!tasks.tasks_by_day_of_week.contains_key("default_tasks_for_day_of_week"));
    }

    #[test]
    fn settings_fill_defaults() {
        let json = serde_json::json!({
            "planning_start_date": "2025-06-09",
            "num_days_in_planning_period": 7,
            "cleaning_shift_start_hour": 10,
            "cleaning_shift_end_hour": 15
        });

        let settings: Settings = serde_json::from_value(json).unwrap();
        assert_eq!(settings.days_of_week_order[0], "Mon");
        assert_eq!(settings.max_consecutive_work_days, 5);
        assert_eq!(settings.staff_shortage_penalty, 100_000.0);
        assert_eq!(settings.night_hours_start, 22);
        assert_eq!(settings.night_hours_end, 5);
        assert!(settings.time_limit_sec.is_none());
    }

    #[test]
    fn solve_status_uses_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&SolveStatus::ModelInvalid).unwrap(),
            "\"MODEL_INVALID\""
        );
        assert_eq!(
            serde_json::from_str::<SolveStatus>("\"OPTIMAL\"").unwrap(),
            SolveStatus::Optimal
        );
    }

    #[test]
    fn malformed_availability_slot_still_deserializes() {
        let json = serde_json::json!({ "day_of_week": "Mon" });
        let slot: AvailabilitySlot = serde_json::from_value(json).unwrap();
        assert_eq!(slot.start_time, "");
        assert!(!slot.is_night_shift);
    }
}
