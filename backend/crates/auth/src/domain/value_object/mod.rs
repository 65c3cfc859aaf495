//! Value Object Module

pub mod email;
pub mod ids;
pub mod profile_type;
pub mod user_password;
