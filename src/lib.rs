pub mod auth;
pub mod db;
pub mod errors;
pub mod ident;
pub mod lifecycle;
pub mod models;
pub mod policy;
pub mod query;
pub mod service;
pub mod stats;

pub use crate::auth::AuthService;
pub use crate::db::Database;
pub use crate::errors::{AppError, AppResult};
pub use crate::models::{
    AuthSession, CreateSubTodoPayload, CreateTodoPayload, LoginPayload, RegisterPayload,
    ServiceSettings, Status, SubTodo, Todo, TodoPage, TodoStatistics, UpdateSubTodoPayload,
    UpdateTodoPayload, User,
};
pub use crate::service::TodoService;

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Installs the global JSON subscriber with a daily-rolling file writer.
/// Safe to call more than once; only the first call installs anything.
pub fn init_tracing(data_dir: &Path) -> AppResult<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "todo-service.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Internal(error.to_string()))?;
    Ok(())
}
