use crate::errors::{AppError, AppResult};
use crate::models::{
    CreateSubTodoPayload, CreateTodoPayload, Status, SubTodoInput, UpdateSubTodoPayload,
    UpdateTodoPayload,
};

// Shared field tables; every validation path reads from these instead of
// repeating the lists per call site.
pub const CREATE_REQUIRED_FIELDS: &[&str] = &["todo", "deadline", "sequence"];
pub const TODO_UPDATE_FIELDS: &[&str] = &["todo", "deadline", "sequence", "status", "subTodos"];
pub const SUB_TODO_UPDATE_FIELDS: &[&str] = &["todo", "deadline", "sequence", "status"];
pub const STATUS_VALUES: &[&str] = &["NOT_STARTED", "IN_PROGRESS", "COMPLETED", "CANCELED"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationPolicy;

impl ValidationPolicy {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_create_todo(&self, payload: &CreateTodoPayload) -> AppResult<()> {
        if payload.todo.as_deref().map(str::trim).unwrap_or_default().is_empty()
            || payload.deadline.is_none()
            || payload.sequence.is_none()
        {
            return Err(missing_required_fields());
        }
        if let Some(status) = &payload.status {
            self.parse_status(status)?;
        }
        for entry in payload.sub_todos.as_deref().unwrap_or_default() {
            self.validate_sub_todo_input(entry)?;
        }
        Ok(())
    }

    pub fn validate_create_sub_todo(&self, payload: &CreateSubTodoPayload) -> AppResult<()> {
        if payload.todo.as_deref().map(str::trim).unwrap_or_default().is_empty()
            || payload.deadline.is_none()
            || payload.sequence.is_none()
        {
            return Err(missing_required_fields());
        }
        if let Some(status) = &payload.status {
            self.parse_status(status)?;
        }
        Ok(())
    }

    pub fn validate_update_todo(&self, payload: &UpdateTodoPayload) -> AppResult<()> {
        let has_any = payload.todo.is_some()
            || payload.deadline.is_some()
            || payload.sequence.is_some()
            || payload.status.is_some()
            || payload.sub_todos.is_some();
        if !has_any {
            return Err(missing_update_fields(TODO_UPDATE_FIELDS));
        }
        if let Some(status) = &payload.status {
            self.parse_status(status)?;
        }
        for entry in payload.sub_todos.as_deref().unwrap_or_default() {
            self.validate_sub_todo_input(entry)?;
        }
        Ok(())
    }

    pub fn validate_update_sub_todo(&self, payload: &UpdateSubTodoPayload) -> AppResult<()> {
        let has_any = payload.todo.is_some()
            || payload.deadline.is_some()
            || payload.sequence.is_some()
            || payload.status.is_some();
        if !has_any {
            return Err(missing_update_fields(SUB_TODO_UPDATE_FIELDS));
        }
        if let Some(status) = &payload.status {
            self.parse_status(status)?;
        }
        Ok(())
    }

    pub fn parse_status(&self, raw: &str) -> AppResult<Status> {
        Status::parse(raw).ok_or_else(|| {
            AppError::Validation(format!(
                "Status can only be one of the following: {}.",
                STATUS_VALUES.join(", ")
            ))
        })
    }

    fn validate_sub_todo_input(&self, entry: &SubTodoInput) -> AppResult<()> {
        if entry.todo.as_deref().map(str::trim).unwrap_or_default().is_empty()
            || entry.deadline.is_none()
            || entry.sequence.is_none()
        {
            return Err(missing_required_fields());
        }
        if let Some(status) = &entry.status {
            self.parse_status(status)?;
        }
        Ok(())
    }
}

fn missing_required_fields() -> AppError {
    AppError::Validation(format!(
        "Please fill in all the required fields ({}).",
        CREATE_REQUIRED_FIELDS.join(", ")
    ))
}

fn missing_update_fields(fields: &[&str]) -> AppError {
    AppError::Validation(format!(
        "Please fill in at least one field to update ({}).",
        fields.join(", ")
    ))
}
