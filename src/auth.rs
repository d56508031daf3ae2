use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{AuthSession, LoginPayload, RegisterPayload, TokenClaims, User};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::Engine;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

const NONCE_LEN: usize = 12;

// Account lookups answer with the same message whether the email exists or
// not, so registration and login do not leak account presence.
pub(crate) const NEUTRAL_REGISTER_ERROR: &str = "Couldn't create a new user. Please check your data!";
const NEUTRAL_LOGIN_ERROR: &str = "Invalid credentials, please try again.";

const REGISTER_FIELDS: &[&str] = &["first_name", "last_name", "email", "password"];
const LOGIN_FIELDS: &[&str] = &["email", "password"];

pub struct AuthService {
    db: Arc<Database>,
    token_key: [u8; 32],
}

impl AuthService {
    pub fn new(db: Arc<Database>, token_key: [u8; 32]) -> Self {
        Self { db, token_key }
    }

    pub fn generate_key() -> [u8; 32] {
        rand::random()
    }

    pub fn register(&self, payload: &RegisterPayload) -> AppResult<AuthSession> {
        let first_name = required_field(REGISTER_FIELDS, "first_name", payload.first_name.as_deref())?;
        let last_name = required_field(REGISTER_FIELDS, "last_name", payload.last_name.as_deref())?;
        let email = required_field(REGISTER_FIELDS, "email", payload.email.as_deref())?.to_lowercase();
        let password = required_field(REGISTER_FIELDS, "password", payload.password.as_deref())?;

        if !EMAIL_RE.is_match(&email) {
            return Err(AppError::Validation(format!("'{}' is not a valid email", email)));
        }
        if self.db.find_user_by_email(&email)?.is_some() {
            return Err(AppError::Validation(NEUTRAL_REGISTER_ERROR.to_string()));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|error| AppError::Internal(error.to_string()))?
            .to_string();

        let user = self
            .db
            .insert_user(&first_name, &last_name, &email, &password_hash)?;
        tracing::info!(user_id = %user.id, "registered new user");

        let token = self.issue_token(&user)?;
        Ok(AuthSession { user, token })
    }

    pub fn login(&self, payload: &LoginPayload) -> AppResult<AuthSession> {
        let email = required_field(LOGIN_FIELDS, "email", payload.email.as_deref())?.to_lowercase();
        let password = required_field(LOGIN_FIELDS, "password", payload.password.as_deref())?;

        let Some(user) = self.db.find_user_by_email(&email)? else {
            return Err(AppError::Unauthorized(NEUTRAL_LOGIN_ERROR.to_string()));
        };
        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|error| AppError::Internal(error.to_string()))?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            return Err(AppError::Unauthorized(NEUTRAL_LOGIN_ERROR.to_string()));
        }

        let token = self.issue_token(&user)?;
        Ok(AuthSession { user, token })
    }

    /// Verifies a bearer token and yields the owner id the core operations
    /// are scoped to. Any decode, decrypt, or expiry failure is Unauthorized.
    pub fn verify(&self, token: &str) -> AppResult<TokenClaims> {
        let claims = self.open_token(token)?;
        if claims.expires_at <= Utc::now() {
            return Err(AppError::Unauthorized("Token expired".to_string()));
        }
        Ok(claims)
    }

    fn issue_token(&self, user: &User) -> AppResult<String> {
        let ttl_hours = self.db.get_settings()?.token_ttl_hours;
        let now = Utc::now();
        let claims = TokenClaims {
            user_id: user.id.clone(),
            email: user.email.clone(),
            issued_at: now,
            expires_at: now + Duration::hours(ttl_hours),
        };
        self.seal_claims(&claims)
    }

    fn seal_claims(&self, claims: &TokenClaims) -> AppResult<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.token_key)
            .map_err(|error| AppError::Internal(error.to_string()))?;
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let sealed = cipher
            .encrypt(nonce, serde_json::to_vec(claims)?.as_slice())
            .map_err(|error| AppError::Internal(error.to_string()))?;

        let mut packed = Vec::with_capacity(NONCE_LEN + sealed.len());
        packed.extend_from_slice(&nonce_bytes);
        packed.extend_from_slice(&sealed);
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(packed))
    }

    fn open_token(&self, token: &str) -> AppResult<TokenClaims> {
        let packed = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| invalid_token())?;
        if packed.len() <= NONCE_LEN {
            return Err(invalid_token());
        }
        let (nonce_bytes, sealed) = packed.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new_from_slice(&self.token_key)
            .map_err(|error| AppError::Internal(error.to_string()))?;
        let opened = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| invalid_token())?;
        serde_json::from_slice(&opened).map_err(|_| invalid_token())
    }
}

fn invalid_token() -> AppError {
    AppError::Unauthorized("Invalid token".to_string())
}

fn required_field(fields: &[&str], name: &str, value: Option<&str>) -> AppResult<String> {
    let trimmed = value.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!(
            "Please fill in all the required fields ({}); '{}' is missing.",
            fields.join(", "),
            name
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::AuthService;
    use crate::db::Database;
    use crate::errors::AppError;
    use crate::models::{LoginPayload, RegisterPayload, TokenClaims};
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn service() -> AuthService {
        let db = Arc::new(Database::new_in_memory().unwrap());
        AuthService::new(db, AuthService::generate_key())
    }

    fn register_payload() -> RegisterPayload {
        RegisterPayload {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: Some("Ada@Example.COM".to_string()),
            password: Some("correct horse battery".to_string()),
        }
    }

    #[test]
    fn register_login_verify_roundtrip() {
        let auth = service();
        let session = auth.register(&register_payload()).unwrap();
        assert_eq!(session.user.email, "ada@example.com");

        let login = auth
            .login(&LoginPayload {
                email: Some("ada@example.com".to_string()),
                password: Some("correct horse battery".to_string()),
            })
            .unwrap();
        let claims = auth.verify(&login.token).unwrap();
        assert_eq!(claims.user_id, session.user.id);
    }

    #[test]
    fn duplicate_email_gets_neutral_error() {
        let auth = service();
        auth.register(&register_payload()).unwrap();
        let err = auth.register(&register_payload()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!err.to_string().contains("exists"));
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let auth = service();
        auth.register(&register_payload()).unwrap();
        let err = auth
            .login(&LoginPayload {
                email: Some("ada@example.com".to_string()),
                password: Some("wrong".to_string()),
            })
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn rejects_garbage_and_expired_tokens() {
        let auth = service();
        assert!(matches!(
            auth.verify("not-a-token"),
            Err(AppError::Unauthorized(_))
        ));

        let expired = TokenClaims {
            user_id: "user-1".to_string(),
            email: "ada@example.com".to_string(),
            issued_at: Utc::now() - Duration::hours(48),
            expires_at: Utc::now() - Duration::hours(24),
        };
        let token = auth.seal_claims(&expired).unwrap();
        assert!(matches!(auth.verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn missing_login_field_names_login_fields_only() {
        let auth = service();
        let err = auth
            .login(&LoginPayload {
                email: Some("ada@example.com".to_string()),
                password: None,
            })
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("(email, password)"));
        assert!(!message.contains("first_name"));
    }

    #[test]
    fn rejects_malformed_email() {
        let auth = service();
        let mut payload = register_payload();
        payload.email = Some("not-an-email".to_string());
        assert!(matches!(
            auth.register(&payload),
            Err(AppError::Validation(_))
        ));
    }
}
