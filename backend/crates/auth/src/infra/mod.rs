//! Infrastructure Layer
//!
//! Database implementations and external service integrations.

pub mod memory;
pub mod postgres;

pub use memory::{MemoryAuthStore, MemoryState};
pub use postgres::{PgAuthStore, PgRateLimitStore};
