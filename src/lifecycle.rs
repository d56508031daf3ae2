use crate::errors::{AppError, AppResult};
use crate::models::Status;
use chrono::{DateTime, Utc};

/// Resolves the completed_at value after a status transition. The timestamp
/// is stamped only on an actual transition into COMPLETED; it is never
/// backdated and never cleared when the status later moves away.
pub fn resolve_completed_at(
    old_status: Option<Status>,
    new_status: Status,
    previous: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if new_status == Status::Completed && old_status != Some(Status::Completed) {
        return Some(now);
    }
    previous
}

/// A sub-todo cannot be mutated while its parent is CANCELED; the check runs
/// before any write.
pub fn guard_parent(parent_status: Status) -> AppResult<()> {
    if parent_status == Status::Canceled {
        return Err(AppError::Forbidden(
            "You can't update a subTodo for a canceled todo.".to_string(),
        ));
    }
    Ok(())
}

/// Post-transition hook for sub-todo status changes: a sub-todo moving to
/// IN_PROGRESS or COMPLETED forces its parent to IN_PROGRESS. Completing a
/// sub-todo never auto-completes the parent.
pub fn parent_promotion(new_sub_status: Status) -> Option<Status> {
    match new_sub_status {
        Status::InProgress | Status::Completed => Some(Status::InProgress),
        Status::NotStarted | Status::Canceled => None,
    }
}
