//! Audit Log Entity
//!
//! Append-only record of a security-relevant event. Each entry carries an
//! HMAC-SHA256 seal over its canonical content so that later modification of
//! a stored row is detectable.

use chrono::{DateTime, SubsecRound, Utc};
use derive_more::Display;
use platform::crypto::{hmac_sha256, hmac_sha256_verify};

use crate::domain::value_object::ids::{AuditLogId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AuditEvent {
    #[display("SIGNUP")]
    Signup,
    #[display("LOGIN_SUCCESS")]
    LoginSuccess,
    #[display("LOGIN_FAILURE")]
    LoginFailure,
    #[display("TOKEN_REFRESH")]
    TokenRefresh,
    #[display("LOGOUT")]
    Logout,
    #[display("PASSWORD_RESET_REQUESTED")]
    PasswordResetRequested,
    #[display("PASSWORD_RESET")]
    PasswordReset,
}

impl AuditEvent {
    pub const fn code(&self) -> &'static str {
        match self {
            AuditEvent::Signup => "SIGNUP",
            AuditEvent::LoginSuccess => "LOGIN_SUCCESS",
            AuditEvent::LoginFailure => "LOGIN_FAILURE",
            AuditEvent::TokenRefresh => "TOKEN_REFRESH",
            AuditEvent::Logout => "LOGOUT",
            AuditEvent::PasswordResetRequested => "PASSWORD_RESET_REQUESTED",
            AuditEvent::PasswordReset => "PASSWORD_RESET",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "SIGNUP" => AuditEvent::Signup,
            "LOGIN_SUCCESS" => AuditEvent::LoginSuccess,
            "LOGIN_FAILURE" => AuditEvent::LoginFailure,
            "TOKEN_REFRESH" => AuditEvent::TokenRefresh,
            "LOGOUT" => AuditEvent::Logout,
            "PASSWORD_RESET_REQUESTED" => AuditEvent::PasswordResetRequested,
            "PASSWORD_RESET" => AuditEvent::PasswordReset,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuditLogEntry {
    pub id: AuditLogId,
    pub event: AuditEvent,
    pub user_id: Option<UserId>,
    pub message: String,
    pub metadata: serde_json::Value,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    /// Microsecond precision so the seal survives a database round trip
    pub created_at: DateTime<Utc>,
    /// Hex HMAC-SHA256 over [`AuditLogEntry::canonical`]; empty until sealed
    pub seal: String,
}

impl AuditLogEntry {
    pub fn new(event: AuditEvent, user_id: Option<UserId>, message: impl Into<String>) -> Self {
        Self {
            id: AuditLogId::new(),
            event,
            user_id,
            message: message.into(),
            metadata: serde_json::Value::Object(Default::default()),
            ip: None,
            user_agent: None,
            created_at: Utc::now().trunc_subsecs(6),
            seal: String::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_origin(mut self, ip: Option<String>, user_agent: Option<String>) -> Self {
        self.ip = ip;
        self.user_agent = user_agent;
        self
    }

    /// Unambiguous serialization of every sealed field
    pub fn canonical(&self) -> String {
        serde_json::json!([
            self.id.to_string(),
            self.event.code(),
            self.user_id.map(|id| id.to_string()),
            self.message,
            self.metadata,
            self.ip,
            self.user_agent,
            self.created_at.timestamp_micros(),
        ])
        .to_string()
    }

    pub fn seal_with(mut self, key: &[u8]) -> Self {
        self.seal = hex::encode(hmac_sha256(key, self.canonical().as_bytes()));
        self
    }

    pub fn verify_seal(&self, key: &[u8]) -> bool {
        match hex::decode(&self.seal) {
            Ok(tag) => hmac_sha256_verify(key, self.canonical().as_bytes(), &tag),
            Err(_) => false,
        }
    }
}
