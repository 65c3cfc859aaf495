//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod context;
pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use context::{ApiError, RequestContext};
pub use middleware::{AccessGate, require_access_token};
pub use router::auth_router;
