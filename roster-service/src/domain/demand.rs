use chrono::NaiveDate;
use shared::types::CleaningTasksInput;

/// Cleaning-task count for a facility on a date.
///
/// Date-specific entries win over the day-of-week default; an unknown
/// facility or a day with neither entry yields zero.
pub fn cleaning_tasks_for(
    facility_id: &str,
    date: NaiveDate,
    day_of_week: &str,
    cleaning_tasks: &CleaningTasksInput,
) -> u32 {
    let Some(facility_tasks) = cleaning_tasks.get(facility_id) else {
        return 0;
    };

    let date_str = date.format("%Y-%m-%d").to_string();
    if let Some(by_date) = facility_tasks.tasks_by_day_of_week.get(day_of_week)
        && let Some(&count) = by_date.get(&date_str)
    {
        return count;
    }

    facility_tasks
        .default_tasks_for_day_of_week
        .get(day_of_week)
        .copied()
        .unwrap_or(0)
}
