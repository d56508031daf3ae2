use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::ident::validate_id;
use crate::models::{
    CreateSubTodoPayload, CreateTodoPayload, ServiceSettings, SubTodo, Todo, TodoPage,
    TodoStatistics, UpdateSubTodoPayload, UpdateTodoPayload,
};
use crate::policy::ValidationPolicy;
use crate::query::plan_query;
use crate::stats;
use chrono::Utc;
use std::sync::Arc;

/// Orchestrates one inbound operation end to end: request validation, then
/// identifier validation, then the ownership check the repository itself
/// does not perform, then the repository call.
pub struct TodoService {
    db: Arc<Database>,
    policy: ValidationPolicy,
}

impl TodoService {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            policy: ValidationPolicy::new(),
        }
    }

    pub fn list_todos(&self, owner_id: &str, raw_query: &[(String, String)]) -> AppResult<TodoPage> {
        let settings = self.db.get_settings()?;
        let plan = plan_query(raw_query, settings.max_per_page)?;
        self.db.list_todos(owner_id, &plan)
    }

    pub fn get_todo(&self, owner_id: &str, raw_todo_id: &str) -> AppResult<Todo> {
        let todo_id = validate_id("todo", raw_todo_id)?;
        self.owned_todo(owner_id, &todo_id)
    }

    pub fn get_sub_todo(
        &self,
        owner_id: &str,
        raw_todo_id: &str,
        raw_sub_todo_id: &str,
    ) -> AppResult<SubTodo> {
        let todo_id = validate_id("todo", raw_todo_id)?;
        let sub_todo_id = validate_id("subTodo", raw_sub_todo_id)?;
        self.owned_todo(owner_id, &todo_id)?;
        self.db.get_sub_todo(&todo_id, &sub_todo_id)
    }

    pub fn create_todo(&self, owner_id: &str, payload: &CreateTodoPayload) -> AppResult<Todo> {
        self.policy.validate_create_todo(payload)?;
        let todo = self.db.create_todo(owner_id, payload)?;
        tracing::info!(todo_id = %todo.id, owner_id, "created todo");
        Ok(todo)
    }

    pub fn create_sub_todo(
        &self,
        owner_id: &str,
        raw_todo_id: &str,
        payload: &CreateSubTodoPayload,
    ) -> AppResult<Todo> {
        self.policy.validate_create_sub_todo(payload)?;
        let todo_id = validate_id("todo", raw_todo_id)?;
        self.owned_todo(owner_id, &todo_id)?;
        self.db.create_sub_todo(&todo_id, payload)
    }

    pub fn update_todo(
        &self,
        owner_id: &str,
        raw_todo_id: &str,
        payload: &UpdateTodoPayload,
    ) -> AppResult<Todo> {
        self.policy.validate_update_todo(payload)?;
        let todo_id = validate_id("todo", raw_todo_id)?;
        self.owned_todo(owner_id, &todo_id)?;
        self.db.update_todo(&todo_id, payload)
    }

    pub fn update_sub_todo(
        &self,
        owner_id: &str,
        raw_todo_id: &str,
        raw_sub_todo_id: &str,
        payload: &UpdateSubTodoPayload,
    ) -> AppResult<SubTodo> {
        self.policy.validate_update_sub_todo(payload)?;
        let todo_id = validate_id("todo", raw_todo_id)?;
        let sub_todo_id = validate_id("subTodo", raw_sub_todo_id)?;
        self.owned_todo(owner_id, &todo_id)?;
        self.db.update_sub_todo(&todo_id, &sub_todo_id, payload)
    }

    pub fn delete_todo(&self, owner_id: &str, raw_todo_id: &str) -> AppResult<Todo> {
        let todo_id = validate_id("todo", raw_todo_id)?;
        self.owned_todo(owner_id, &todo_id)?;
        let removed = self
            .db
            .delete_todo(&todo_id)?
            .ok_or_else(|| not_found(&todo_id))?;
        tracing::info!(todo_id = %removed.id, owner_id, "deleted todo");
        Ok(removed)
    }

    pub fn delete_all_todos(&self, owner_id: &str) -> AppResult<u64> {
        let removed = self.db.delete_all_todos(owner_id)?;
        tracing::info!(owner_id, removed, "deleted all todos for owner");
        Ok(removed)
    }

    pub fn delete_sub_todo(
        &self,
        owner_id: &str,
        raw_todo_id: &str,
        raw_sub_todo_id: &str,
    ) -> AppResult<SubTodo> {
        let todo_id = validate_id("todo", raw_todo_id)?;
        let sub_todo_id = validate_id("subTodo", raw_sub_todo_id)?;
        self.owned_todo(owner_id, &todo_id)?;
        self.db.delete_sub_todo(&todo_id, &sub_todo_id)
    }

    pub fn statistics(&self, owner_id: &str) -> AppResult<TodoStatistics> {
        let user = self
            .db
            .get_user(owner_id)?
            .ok_or_else(|| AppError::NotFound(format!("No user found with id '{}'", owner_id)))?;
        let counters = self.db.owner_counters(owner_id)?;
        Ok(stats::aggregate(
            counters.total_todos,
            counters.completed_todos,
            user.created_at,
            counters.last_completed_todo,
            Utc::now(),
        ))
    }

    pub fn settings(&self) -> AppResult<ServiceSettings> {
        self.db.get_settings()
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<ServiceSettings> {
        self.db.update_settings(update)
    }

    /// Ownership check for every id-addressed operation. A document owned by
    /// someone else answers exactly like a missing one.
    fn owned_todo(&self, owner_id: &str, todo_id: &str) -> AppResult<Todo> {
        let todo = self
            .db
            .get_todo(todo_id)?
            .ok_or_else(|| not_found(todo_id))?;
        if todo.author != owner_id {
            return Err(not_found(todo_id));
        }
        Ok(todo)
    }
}

fn not_found(todo_id: &str) -> AppError {
    AppError::NotFound(format!("No todo found with id '{}'", todo_id))
}
