//! Auth Error Types
//!
//! Auth-specific error variants that integrate with the unified
//! `kernel::error::AppError` system.

use std::collections::BTreeMap;

use chrono::Utc;
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::rate_limit::RateLimitDecision;
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Field name to messages
pub type ValidationDetails = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Field-level validation failure
    #[error("Validation failed")]
    Validation(ValidationDetails),

    /// Body could not be parsed as the expected JSON
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// Unknown account or wrong password; the two are indistinguishable
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Email is already registered")]
    EmailExists,

    /// Bad signature, expired, or wrong token type
    #[error("Invalid or expired token")]
    InvalidToken,

    /// No active session row for the presented refresh token
    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Token not found")]
    TokenNotFound,

    #[error("Reset token is invalid or expired")]
    ResetTokenInvalid,

    #[error("Too many requests")]
    RateLimitExceeded(RateLimitDecision),

    /// Request exceeded the configured time budget
    #[error("Request timed out")]
    Timeout,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Single-field validation error
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut details = ValidationDetails::new();
        details.insert(field.to_string(), vec![message.into()]);
        AuthError::Validation(details)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) | AuthError::MalformedBody(_) => ErrorKind::BadRequest,
            AuthError::ResetTokenInvalid => ErrorKind::BadRequest,
            AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::TokenRevoked => {
                ErrorKind::Unauthorized
            }
            AuthError::AccountDisabled => ErrorKind::Forbidden,
            AuthError::TokenNotFound => ErrorKind::NotFound,
            AuthError::EmailExists => ErrorKind::Conflict,
            AuthError::RateLimitExceeded(_) => ErrorKind::TooManyRequests,
            AuthError::Timeout => ErrorKind::RequestTimeout,
            AuthError::Database(_) | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::MalformedBody(_) => "MALFORMED_REQUEST",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::AccountDisabled => "ACCOUNT_DISABLED",
            AuthError::EmailExists => "EMAIL_EXISTS",
            AuthError::InvalidToken | AuthError::ResetTokenInvalid => "INVALID_TOKEN",
            AuthError::TokenRevoked => "TOKEN_REVOKED",
            AuthError::TokenNotFound => "TOKEN_NOT_FOUND",
            AuthError::RateLimitExceeded(_) => "RATE_LIMIT_EXCEEDED",
            AuthError::Timeout => "REQUEST_TIMEOUT",
            AuthError::Database(_) | AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to AppError
    ///
    /// Server-side failures never expose their cause to the client.
    pub fn to_app_error(&self) -> AppError {
        let message = match self {
            AuthError::Database(_) | AuthError::Internal(_) => "Internal server error".to_string(),
            AuthError::MalformedBody(_) => "Request body is not valid JSON for this endpoint".to_string(),
            other => other.to_string(),
        };

        let mut app_error = AppError::new(self.kind(), message).with_code(self.code());

        match self {
            AuthError::Validation(details) => {
                app_error = app_error.with_details(serde_json::json!(details));
            }
            AuthError::MalformedBody(reason) => {
                app_error = app_error.with_details(serde_json::json!({ "body": [reason] }));
            }
            AuthError::RateLimitExceeded(decision) => {
                app_error = app_error
                    .with_header("x-ratelimit-limit", decision.limit.to_string())
                    .with_header("x-ratelimit-remaining", decision.remaining.to_string())
                    .with_header("x-ratelimit-reset", decision.reset_at.timestamp().to_string())
                    .with_header(
                        "retry-after",
                        decision.retry_after_secs(Utc::now()).to_string(),
                    );
            }
            _ => {}
        }

        app_error
    }

    /// Log the error once, with a level matching its severity
    pub fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::TokenRevoked => {
                tracing::warn!("Refresh attempted with an inactive session");
            }
            AuthError::RateLimitExceeded(decision) => {
                tracing::warn!(limit = decision.limit, "Rate limit exceeded");
            }
            AuthError::Timeout => {
                tracing::warn!("Request timed out");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (camel_case(&field), messages)
            })
            .collect();
        AuthError::Validation(details)
    }
}

/// Field names in error details follow the JSON bodies, not the structs
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for ch in field.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::rate_limit::RateLimitConfig;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::field("email", "bad").kind().status_code(), 400);
        assert_eq!(AuthError::InvalidCredentials.kind().status_code(), 401);
        assert_eq!(AuthError::AccountDisabled.kind().status_code(), 403);
        assert_eq!(AuthError::EmailExists.kind().status_code(), 409);
        assert_eq!(AuthError::InvalidToken.kind().status_code(), 401);
        assert_eq!(AuthError::TokenRevoked.kind().status_code(), 401);
        assert_eq!(AuthError::TokenNotFound.kind().status_code(), 404);
        assert_eq!(AuthError::ResetTokenInvalid.kind().status_code(), 400);
        assert_eq!(AuthError::Timeout.kind().status_code(), 408);
        assert_eq!(AuthError::Internal("x".into()).kind().status_code(), 500);
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = AuthError::Internal("connection refused to 10.0.0.5".into()).to_app_error();
        assert_eq!(err.message(), "Internal server error");
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_validation_details() {
        let err = AuthError::field("email", "Invalid email format").to_app_error();
        let body = err.envelope();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["email"][0], "Invalid email format");
    }

    #[test]
    fn test_camel_case_fields() {
        assert_eq!(camel_case("confirm_password"), "confirmPassword");
        assert_eq!(camel_case("email"), "email");
    }

    #[test]
    fn test_rate_limit_headers() {
        let config = RateLimitConfig::new(5, 60);
        let start = config.window_start_ms(Utc::now().timestamp_millis());
        let decision = RateLimitDecision::from_count(6, &config, start);

        let err = AuthError::RateLimitExceeded(decision).to_app_error();
        let headers: BTreeMap<_, _> = err.headers().iter().cloned().collect();
        assert_eq!(headers["x-ratelimit-limit"], "5");
        assert_eq!(headers["x-ratelimit-remaining"], "0");
        assert!(headers.contains_key("x-ratelimit-reset"));
        assert!(headers["retry-after"].parse::<i64>().unwrap() >= 1);
    }
}
