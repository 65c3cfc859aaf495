//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Use cases and application services
//! - `infra/` - PostgreSQL and in-memory stores
//! - `presentation/` - HTTP handlers, DTOs, router
//!
//! ## Features
//! - Signup for admin, facility, and manufacturer accounts
//! - Email + password login with access/refresh JWT pairs
//! - Refresh token rotation on every refresh
//! - Password reset by single-use emailed token
//! - Per-flow rate limiting
//! - Sealed audit trail written with every state change
//!
//! ## Security Model
//! - Passwords hashed with Argon2id (NIST SP 800-63B compliant)
//! - Refresh and reset tokens stored only as SHA-256 hashes
//! - Login does not reveal whether an account exists
//! - A password reset revokes every session of the user

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::{AuthServices, LogMailer, MailOutbox, spawn_mail_worker};
pub use error::{AuthError, AuthResult};
pub use infra::{MemoryAuthStore, PgAuthStore, PgRateLimitStore};
pub use presentation::router::auth_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
