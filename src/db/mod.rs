use crate::errors::{AppError, AppResult};
use crate::lifecycle;
use crate::models::{
    CreateSubTodoPayload, CreateTodoPayload, ServiceSettings, Status, SubTodo, SubTodoInput, Todo,
    TodoPage, UpdateSubTodoPayload, UpdateTodoPayload, User,
};
use crate::query::QueryPlan;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");

// Rev-guarded writes retry when another writer advanced the document
// between the read and the write.
const MAX_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

/// Raw per-owner counters backing the statistics aggregator.
#[derive(Debug, Clone)]
pub struct OwnerCounters {
    pub total_todos: i64,
    pub completed_todos: i64,
    pub last_completed_todo: Option<Todo>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn new_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ─── Users ───────────────────────────────────────────────────────────

    pub fn insert_user(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: &str,
    ) -> AppResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, first_name, last_name, email, password_hash, now.to_rfc3339()],
        )
        .map_err(|error| match error {
            // A registration losing the race to the email UNIQUE index gets
            // the same neutral answer as the find-then-insert check.
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                AppError::Validation(crate::auth::NEUTRAL_REGISTER_ERROR.to_string())
            }
            other => AppError::from(other),
        })?;
        Ok(User {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
        })
    }

    pub fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, first_name, last_name, email, password_hash, created_at
             FROM users WHERE id = ?1",
            [user_id],
            parse_user_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, first_name, last_name, email, password_hash, created_at
             FROM users WHERE email = ?1",
            [email],
            parse_user_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    // ─── Todos ───────────────────────────────────────────────────────────

    pub fn create_todo(&self, owner_id: &str, payload: &CreateTodoPayload) -> AppResult<Todo> {
        let now = Utc::now();
        let status = materialize_status(payload.status.as_deref());
        let sub_todos = payload
            .sub_todos
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|entry| materialize_sub_todo(entry, now))
            .collect::<AppResult<Vec<_>>>()?;

        let todo = Todo {
            id: Uuid::new_v4().to_string(),
            todo: required_text(payload.todo.as_deref())?,
            author: owner_id.to_string(),
            created_at: now,
            updated_at: now,
            deadline: required_deadline(payload.deadline)?,
            completed_at: lifecycle::resolve_completed_at(None, status, None, now),
            sequence: payload
                .sequence
                .ok_or_else(|| AppError::Validation("'sequence' is required".to_string()))?,
            status,
            sub_todos,
        };

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO todos (
               id, author, todo, created_at, updated_at, deadline, completed_at,
               sequence, status, sub_todos_json, rev
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)",
            params![
                todo.id,
                todo.author,
                todo.todo,
                todo.created_at.to_rfc3339(),
                todo.updated_at.to_rfc3339(),
                todo.deadline.to_rfc3339(),
                todo.completed_at.map(|at| at.to_rfc3339()),
                todo.sequence,
                todo.status.as_str(),
                serde_json::to_string(&todo.sub_todos)?,
            ],
        )?;
        Ok(todo)
    }

    pub fn get_todo(&self, todo_id: &str) -> AppResult<Option<Todo>> {
        Ok(self.fetch_versioned(todo_id)?.map(|(todo, _)| todo))
    }

    pub fn list_todos(&self, owner_id: &str, plan: &QueryPlan) -> AppResult<TodoPage> {
        let conn = self.lock_conn()?;
        let total_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM todos WHERE author = ?1",
            [owner_id],
            |row| row.get(0),
        )?;

        let query = format!(
            "SELECT id, author, todo, created_at, updated_at, deadline, completed_at,
                    sequence, status, sub_todos_json
             FROM todos WHERE author = ?1 ORDER BY {} LIMIT ?2 OFFSET ?3",
            plan.order_by_clause()
        );
        let mut statement = conn.prepare(&query)?;
        let items = statement
            .query_map(
                params![owner_id, plan.window.limit(), plan.window.offset()],
                parse_todo_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let window = plan.window;
        Ok(TodoPage {
            items,
            current_page: window.page,
            per_page: window.per_page,
            total_count,
            page_count: window.page_count(total_count),
            is_last_page: window.is_last_page(total_count),
        })
    }

    pub fn create_sub_todo(&self, todo_id: &str, payload: &CreateSubTodoPayload) -> AppResult<Todo> {
        let now = Utc::now();
        let status = materialize_status(payload.status.as_deref());
        let sub_todo = SubTodo {
            id: Uuid::new_v4().to_string(),
            todo: required_text(payload.todo.as_deref())?,
            created_at: now,
            updated_at: now,
            deadline: required_deadline(payload.deadline)?,
            completed_at: lifecycle::resolve_completed_at(None, status, None, now),
            sequence: payload
                .sequence
                .ok_or_else(|| AppError::Validation("'sequence' is required".to_string()))?,
            status,
        };

        self.write_versioned(todo_id, |todo| {
            todo.sub_todos.push(sub_todo.clone());
            todo.updated_at = now;
            Ok(())
        })
    }

    pub fn update_todo(&self, todo_id: &str, payload: &UpdateTodoPayload) -> AppResult<Todo> {
        let now = Utc::now();
        let sub_todos = payload
            .sub_todos
            .as_deref()
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| materialize_sub_todo(entry, now))
                    .collect::<AppResult<Vec<_>>>()
            })
            .transpose()?;

        self.write_versioned(todo_id, move |todo| {
            // Merge semantics: supplied fields override, the rest carry over.
            if let Some(text) = &payload.todo {
                todo.todo = text.clone();
            }
            if let Some(deadline) = payload.deadline {
                todo.deadline = deadline;
            }
            if let Some(sequence) = payload.sequence {
                todo.sequence = sequence;
            }
            if let Some(replacement) = sub_todos.clone() {
                todo.sub_todos = replacement;
            }
            if let Some(raw) = &payload.status {
                let new_status = materialize_status(Some(raw));
                todo.completed_at = lifecycle::resolve_completed_at(
                    Some(todo.status),
                    new_status,
                    todo.completed_at,
                    now,
                );
                todo.status = new_status;
            }
            todo.updated_at = now;
            Ok(())
        })
    }

    pub fn get_sub_todo(&self, todo_id: &str, sub_todo_id: &str) -> AppResult<SubTodo> {
        let todo = self
            .get_todo(todo_id)?
            .ok_or_else(|| todo_not_found(todo_id))?;
        todo.sub_todos
            .iter()
            .find(|sub| sub.id == sub_todo_id)
            .cloned()
            .ok_or_else(|| sub_todo_not_found(todo_id, sub_todo_id))
    }

    pub fn update_sub_todo(
        &self,
        todo_id: &str,
        sub_todo_id: &str,
        payload: &UpdateSubTodoPayload,
    ) -> AppResult<SubTodo> {
        let now = Utc::now();
        let mut updated: Option<SubTodo> = None;

        self.write_versioned(todo_id, |todo| {
            // The guard runs before any field is touched.
            lifecycle::guard_parent(todo.status)?;

            let sub = todo
                .sub_todos
                .iter_mut()
                .find(|sub| sub.id == sub_todo_id)
                .ok_or_else(|| sub_todo_not_found(todo_id, sub_todo_id))?;

            if let Some(text) = &payload.todo {
                sub.todo = text.clone();
            }
            if let Some(deadline) = payload.deadline {
                sub.deadline = deadline;
            }
            if let Some(sequence) = payload.sequence {
                sub.sequence = sequence;
            }
            let mut promoted = None;
            if let Some(raw) = &payload.status {
                let new_status = materialize_status(Some(raw));
                sub.completed_at = lifecycle::resolve_completed_at(
                    Some(sub.status),
                    new_status,
                    sub.completed_at,
                    now,
                );
                sub.status = new_status;
                promoted = lifecycle::parent_promotion(new_status);
            }
            sub.updated_at = now;
            updated = Some(sub.clone());

            if let Some(parent_status) = promoted {
                todo.status = parent_status;
            }
            todo.updated_at = now;
            Ok(())
        })?;

        updated.ok_or_else(|| AppError::Internal("sub-todo update produced no result".to_string()))
    }

    pub fn delete_todo(&self, todo_id: &str) -> AppResult<Option<Todo>> {
        let Some((todo, _)) = self.fetch_versioned(todo_id)? else {
            return Ok(None);
        };
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM todos WHERE id = ?1", [todo_id])?;
        Ok(Some(todo))
    }

    pub fn delete_all_todos(&self, owner_id: &str) -> AppResult<u64> {
        let conn = self.lock_conn()?;
        let removed = conn.execute("DELETE FROM todos WHERE author = ?1", [owner_id])?;
        Ok(removed as u64)
    }

    pub fn delete_sub_todo(&self, todo_id: &str, sub_todo_id: &str) -> AppResult<SubTodo> {
        let now = Utc::now();
        let mut removed: Option<SubTodo> = None;

        self.write_versioned(todo_id, |todo| {
            let index = todo
                .sub_todos
                .iter()
                .position(|sub| sub.id == sub_todo_id)
                .ok_or_else(|| sub_todo_not_found(todo_id, sub_todo_id))?;
            removed = Some(todo.sub_todos.remove(index));
            todo.updated_at = now;
            Ok(())
        })?;

        removed.ok_or_else(|| AppError::Internal("sub-todo delete produced no result".to_string()))
    }

    pub fn owner_counters(&self, owner_id: &str) -> AppResult<OwnerCounters> {
        let conn = self.lock_conn()?;
        let total_todos: i64 = conn.query_row(
            "SELECT COUNT(*) FROM todos WHERE author = ?1",
            [owner_id],
            |row| row.get(0),
        )?;
        let completed_todos: i64 = conn.query_row(
            "SELECT COUNT(*) FROM todos WHERE author = ?1 AND status = ?2",
            params![owner_id, Status::Completed.as_str()],
            |row| row.get(0),
        )?;
        let last_completed_todo = conn
            .query_row(
                "SELECT id, author, todo, created_at, updated_at, deadline, completed_at,
                        sequence, status, sub_todos_json
                 FROM todos
                 WHERE author = ?1 AND status = ?2 AND completed_at IS NOT NULL
                 ORDER BY completed_at DESC LIMIT 1",
                params![owner_id, Status::Completed.as_str()],
                parse_todo_row,
            )
            .optional()?;

        Ok(OwnerCounters {
            total_todos,
            completed_todos,
            last_completed_todo,
        })
    }

    // ─── Settings ────────────────────────────────────────────────────────

    pub fn get_settings(&self) -> AppResult<ServiceSettings> {
        let conn = self.lock_conn()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = 'service'",
                [],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<ServiceSettings>(&raw).unwrap_or_default()),
            None => Ok(ServiceSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<ServiceSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: ServiceSettings = serde_json::from_value(merged)?;

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES ('service', ?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;

        Ok(settings)
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn lock_conn(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    fn fetch_versioned(&self, todo_id: &str) -> AppResult<Option<(Todo, i64)>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT id, author, todo, created_at, updated_at, deadline, completed_at,
                    sequence, status, sub_todos_json, rev
             FROM todos WHERE id = ?1",
            [todo_id],
            |row| {
                let todo = parse_todo_row(row)?;
                let rev: i64 = row.get(10)?;
                Ok((todo, rev))
            },
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Read-modify-write with a compare-and-swap on the rev column. The
    /// mutation runs against a fresh read on every attempt, so a concurrent
    /// writer advancing rev costs a retry instead of a lost update.
    fn write_versioned<F>(&self, todo_id: &str, mut mutate: F) -> AppResult<Todo>
    where
        F: FnMut(&mut Todo) -> AppResult<()>,
    {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let Some((mut todo, rev)) = self.fetch_versioned(todo_id)? else {
                return Err(todo_not_found(todo_id));
            };
            mutate(&mut todo)?;

            let conn = self.lock_conn()?;
            let changed = conn.execute(
                "UPDATE todos SET
                   todo = ?1, updated_at = ?2, deadline = ?3, completed_at = ?4,
                   sequence = ?5, status = ?6, sub_todos_json = ?7, rev = rev + 1
                 WHERE id = ?8 AND rev = ?9",
                params![
                    todo.todo,
                    todo.updated_at.to_rfc3339(),
                    todo.deadline.to_rfc3339(),
                    todo.completed_at.map(|at| at.to_rfc3339()),
                    todo.sequence,
                    todo.status.as_str(),
                    serde_json::to_string(&todo.sub_todos)?,
                    todo_id,
                    rev,
                ],
            )?;
            if changed == 1 {
                return Ok(todo);
            }
            tracing::warn!(todo_id, "rev conflict on todo write, retrying");
        }

        Err(AppError::Internal(format!(
            "todo '{}' kept changing under concurrent writes",
            todo_id
        )))
    }
}

fn materialize_status(raw: Option<&str>) -> Status {
    raw.and_then(Status::parse).unwrap_or(Status::NotStarted)
}

fn materialize_sub_todo(entry: &SubTodoInput, now: DateTime<Utc>) -> AppResult<SubTodo> {
    let status = materialize_status(entry.status.as_deref());
    let completed_at = match entry.completed_at {
        // Round-tripped sub-documents keep their original stamp.
        Some(existing) => Some(existing),
        None => lifecycle::resolve_completed_at(None, status, None, now),
    };
    Ok(SubTodo {
        id: entry
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        todo: required_text(entry.todo.as_deref())?,
        created_at: entry.created_at.unwrap_or(now),
        updated_at: now,
        deadline: required_deadline(entry.deadline)?,
        completed_at,
        sequence: entry
            .sequence
            .ok_or_else(|| AppError::Validation("'sequence' is required".to_string()))?,
        status,
    })
}

fn required_text(raw: Option<&str>) -> AppResult<String> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(AppError::Validation("'todo' is required".to_string()));
    }
    Ok(trimmed.to_string())
}

fn required_deadline(raw: Option<DateTime<Utc>>) -> AppResult<DateTime<Utc>> {
    raw.ok_or_else(|| AppError::Validation("'deadline' is required".to_string()))
}

fn todo_not_found(todo_id: &str) -> AppError {
    AppError::NotFound(format!("No todo found with id '{}'", todo_id))
}

fn sub_todo_not_found(todo_id: &str, sub_todo_id: &str) -> AppError {
    AppError::NotFound(format!(
        "Todo '{}' has no subTodo with id '{}'",
        todo_id, sub_todo_id
    ))
}

fn parse_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        created_at: parse_time(&row.get::<_, String>(5)?)?,
    })
}

fn parse_todo_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Todo> {
    let sub_todos_raw: String = row.get(9)?;
    Ok(Todo {
        id: row.get(0)?,
        author: row.get(1)?,
        todo: row.get(2)?,
        created_at: parse_time(&row.get::<_, String>(3)?)?,
        updated_at: parse_time(&row.get::<_, String>(4)?)?,
        deadline: parse_time(&row.get::<_, String>(5)?)?,
        completed_at: row
            .get::<_, Option<String>>(6)?
            .map(|raw| parse_time(&raw))
            .transpose()?,
        sequence: row.get(7)?,
        status: parse_status(&row.get::<_, String>(8)?)?,
        sub_todos: serde_json::from_str::<Vec<SubTodo>>(&sub_todos_raw).unwrap_or_default(),
    })
}

fn parse_status(raw: &str) -> rusqlite::Result<Status> {
    Status::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Unknown status '{}'", raw),
            )),
        )
    })
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Database;
    use crate::models::{CreateSubTodoPayload, CreateTodoPayload, Status, UpdateSubTodoPayload};
    use chrono::{Duration, Utc};

    fn create_payload(title: &str, sequence: i64) -> CreateTodoPayload {
        CreateTodoPayload {
            todo: Some(title.to_string()),
            deadline: Some(Utc::now() + Duration::days(7)),
            sequence: Some(sequence),
            status: None,
            sub_todos: None,
        }
    }

    #[test]
    fn create_defaults_status_and_sub_todos() {
        let db = Database::new_in_memory().unwrap();
        let todo = db.create_todo("owner-1", &create_payload("buy milk", 1)).unwrap();
        assert_eq!(todo.status, Status::NotStarted);
        assert!(todo.completed_at.is_none());
        assert!(todo.sub_todos.is_empty());
    }

    #[test]
    fn create_completed_stamps_completed_at() {
        let db = Database::new_in_memory().unwrap();
        let mut payload = create_payload("already done", 1);
        payload.status = Some("COMPLETED".to_string());
        let todo = db.create_todo("owner-1", &payload).unwrap();
        assert_eq!(todo.status, Status::Completed);
        assert!(todo.completed_at.is_some());
    }

    #[test]
    fn sub_todo_append_and_distinct_not_found() {
        let db = Database::new_in_memory().unwrap();
        let todo = db.create_todo("owner-1", &create_payload("parent", 1)).unwrap();

        let sub_payload = CreateSubTodoPayload {
            todo: Some("child".to_string()),
            deadline: Some(Utc::now() + Duration::days(1)),
            sequence: Some(1),
            status: None,
        };
        let updated = db.create_sub_todo(&todo.id, &sub_payload).unwrap();
        assert_eq!(updated.sub_todos.len(), 1);

        let sub_id = &updated.sub_todos[0].id;
        assert!(db.get_sub_todo(&todo.id, sub_id).is_ok());

        let missing_parent = db.get_sub_todo("missing", sub_id).unwrap_err();
        assert!(missing_parent.to_string().contains("No todo found"));
        let missing_sub = db.get_sub_todo(&todo.id, "missing").unwrap_err();
        assert!(missing_sub.to_string().contains("has no subTodo"));
    }

    #[test]
    fn canceled_parent_blocks_sub_todo_update() {
        let db = Database::new_in_memory().unwrap();
        let mut payload = create_payload("parent", 1);
        payload.status = Some("CANCELED".to_string());
        let todo = db.create_todo("owner-1", &payload).unwrap();

        let sub_payload = CreateSubTodoPayload {
            todo: Some("child".to_string()),
            deadline: Some(Utc::now()),
            sequence: Some(1),
            status: None,
        };
        // Appending goes through the parent document directly; only sub-todo
        // mutation is guarded.
        let with_sub = db.create_sub_todo(&todo.id, &sub_payload).unwrap();
        let sub_id = with_sub.sub_todos[0].id.clone();

        let err = db
            .update_sub_todo(
                &todo.id,
                &sub_id,
                &UpdateSubTodoPayload {
                    status: Some("IN_PROGRESS".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, crate::errors::AppError::Forbidden(_)));

        // Nothing changed.
        let after = db.get_sub_todo(&todo.id, &sub_id).unwrap();
        assert_eq!(after.status, Status::NotStarted);
    }

    #[test]
    fn completing_sub_todo_promotes_parent() {
        let db = Database::new_in_memory().unwrap();
        let todo = db.create_todo("owner-1", &create_payload("parent", 1)).unwrap();
        let with_sub = db
            .create_sub_todo(
                &todo.id,
                &CreateSubTodoPayload {
                    todo: Some("child".to_string()),
                    deadline: Some(Utc::now()),
                    sequence: Some(1),
                    status: None,
                },
            )
            .unwrap();
        let sub_id = with_sub.sub_todos[0].id.clone();

        let sub = db
            .update_sub_todo(
                &todo.id,
                &sub_id,
                &UpdateSubTodoPayload {
                    status: Some("COMPLETED".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(sub.status, Status::Completed);
        assert!(sub.completed_at.is_some());

        let parent = db.get_todo(&todo.id).unwrap().unwrap();
        assert_eq!(parent.status, Status::InProgress);
    }

    #[test]
    fn delete_todo_returns_document_and_cascades() {
        let db = Database::new_in_memory().unwrap();
        let todo = db.create_todo("owner-1", &create_payload("goner", 1)).unwrap();
        let with_sub = db
            .create_sub_todo(
                &todo.id,
                &CreateSubTodoPayload {
                    todo: Some("child".to_string()),
                    deadline: Some(Utc::now()),
                    sequence: Some(1),
                    status: None,
                },
            )
            .unwrap();
        let sub_id = with_sub.sub_todos[0].id.clone();

        let removed = db.delete_todo(&todo.id).unwrap().unwrap();
        assert_eq!(removed.id, todo.id);
        assert!(db.get_todo(&todo.id).unwrap().is_none());
        assert!(db.get_sub_todo(&todo.id, &sub_id).is_err());
    }

    #[test]
    fn delete_all_reports_count() {
        let db = Database::new_in_memory().unwrap();
        for index in 0..3 {
            db.create_todo("owner-1", &create_payload("todo", index)).unwrap();
        }
        db.create_todo("owner-2", &create_payload("other", 1)).unwrap();

        assert_eq!(db.delete_all_todos("owner-1").unwrap(), 3);
        assert_eq!(db.owner_counters("owner-2").unwrap().total_todos, 1);
    }

    #[test]
    fn duplicate_email_insert_stays_neutral() {
        let db = Database::new_in_memory().unwrap();
        db.insert_user("Ada", "Lovelace", "ada@example.com", "hash-1")
            .unwrap();

        // Bypasses the service-level existence check, as a racing second
        // registration would.
        let err = db
            .insert_user("Ada", "Lovelace", "ada@example.com", "hash-2")
            .unwrap_err();
        assert!(matches!(err, crate::errors::AppError::Validation(_)));
        assert_eq!(err.to_string(), format!("VALIDATION: {}", crate::auth::NEUTRAL_REGISTER_ERROR));
    }

    #[test]
    fn settings_merge_partially() {
        let db = Database::new_in_memory().unwrap();
        let defaults = db.get_settings().unwrap();
        assert_eq!(defaults.token_ttl_hours, 24);

        let updated = db
            .update_settings(serde_json::json!({ "maxPerPage": 25 }))
            .unwrap();
        assert_eq!(updated.max_per_page, 25);
        assert_eq!(updated.token_ttl_hours, 24);
    }
}
