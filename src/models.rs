use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    NotStarted,
    InProgress,
    Completed,
    Canceled,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "NOT_STARTED" => Some(Self::NotStarted),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "CANCELED" => Some(Self::Canceled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub todo: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sequence: i64,
    pub status: Status,
    #[serde(rename = "subTodos")]
    pub sub_todos: Vec<SubTodo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTodo {
    pub id: String,
    pub todo: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sequence: i64,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

// Mutation payloads carry every field as optional; the policy layer decides
// which ones a given operation requires.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTodoPayload {
    pub todo: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub sequence: Option<i64>,
    pub status: Option<String>,
    #[serde(rename = "subTodos")]
    pub sub_todos: Option<Vec<SubTodoInput>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTodoPayload {
    pub todo: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub sequence: Option<i64>,
    pub status: Option<String>,
    #[serde(rename = "subTodos")]
    pub sub_todos: Option<Vec<SubTodoInput>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSubTodoPayload {
    pub todo: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub sequence: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSubTodoPayload {
    pub todo: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub sequence: Option<i64>,
    pub status: Option<String>,
}

/// Embedded sub-todo supplied inside a todo create/update payload. Entries
/// without an id are materialized as fresh sub-documents; entries carrying
/// an id and created_at round-trip an existing sub-document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubTodoInput {
    pub id: Option<String>,
    pub todo: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub sequence: Option<i64>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: String,
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPage {
    pub items: Vec<Todo>,
    pub current_page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub page_count: i64,
    pub is_last_page: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoStatistics {
    pub total_todos: i64,
    pub completed_todos: i64,
    pub completion_rate: String,
    pub signup_date: DateTime<Utc>,
    pub days_since_sign_up: i64,
    pub average_completion_rate: f64,
    pub last_completed_todo: Option<Todo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceSettings {
    pub max_per_page: i64,
    pub token_ttl_hours: i64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            max_per_page: 100,
            token_ttl_hours: 24,
        }
    }
}
