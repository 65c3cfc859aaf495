//! Shared Kernel
//!
//! Vocabulary every crate in the portal backend agrees on:
//! - [`error::app_error::AppError`] and the JSON error envelope
//! - [`error::kind::ErrorKind`] status classification
//! - [`id::Id`] typed UUID identifiers

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
