use crate::errors::{AppError, AppResult};
use uuid::Uuid;

/// Validates an external id string before any storage access, so malformed
/// ids surface as 400s instead of ambiguous not-found errors downstream.
/// Returns the canonical lowercase hyphenated form.
pub fn validate_id(kind: &str, raw: &str) -> AppResult<String> {
    let trimmed = raw.trim();
    Uuid::parse_str(trimmed)
        .map(|id| id.to_string())
        .map_err(|_| AppError::InvalidIdentifier(format!("'{}' is not a valid {} id", raw, kind)))
}

#[cfg(test)]
mod tests {
    use super::validate_id;
    use crate::errors::AppError;

    #[test]
    fn accepts_and_normalizes_uuid() {
        let id = validate_id("todo", "  67E55044-10B1-426F-9247-BB680E5FE0C8 ").unwrap();
        assert_eq!(id, "67e55044-10b1-426f-9247-bb680e5fe0c8");
    }

    #[test]
    fn rejects_malformed_id() {
        let err = validate_id("todo", "not-an-id").unwrap_err();
        assert!(matches!(err, AppError::InvalidIdentifier(_)));
    }
}
