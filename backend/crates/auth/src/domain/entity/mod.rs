//! Domain Entities

pub mod audit_log;
pub mod credential;
pub mod organization;
pub mod refresh_token;
pub mod user;
pub mod verification_token;
