use crate::models::{Todo, TodoStatistics};
use chrono::{DateTime, Utc};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Derives completion metrics from the owner's raw counts. Pure so the
/// arithmetic is testable without a database.
pub fn aggregate(
    total_todos: i64,
    completed_todos: i64,
    signup_date: DateTime<Utc>,
    last_completed_todo: Option<Todo>,
    now: DateTime<Utc>,
) -> TodoStatistics {
    let completion_rate = if total_todos == 0 {
        0.0
    } else {
        completed_todos as f64 / total_todos as f64 * 100.0
    };

    let days_since_sign_up =
        ((now - signup_date).num_milliseconds() as f64 / MILLIS_PER_DAY).round() as i64;

    let average_completion_rate = if days_since_sign_up > 0 {
        (completed_todos as f64 / days_since_sign_up as f64 * 10.0).round() / 10.0
    } else {
        0.0
    };

    TodoStatistics {
        total_todos,
        completed_todos,
        completion_rate: format!("{:.2}", completion_rate),
        signup_date,
        days_since_sign_up,
        average_completion_rate,
        last_completed_todo,
    }
}
