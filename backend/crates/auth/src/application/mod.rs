//! Application Layer
//!
//! Use cases and application services.

pub mod audit;
pub mod config;
pub mod credentials;
pub mod forgot_password;
pub mod mail;
pub mod rate_limit;
pub mod refresh;
pub mod reset_password;
pub mod services;
pub mod session_store;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;
pub mod token_service;

// Re-exports
pub use config::AuthConfig;
pub use forgot_password::ForgotPasswordUseCase;
pub use mail::{LogMailer, MailOutbox, PasswordResetMail, PasswordResetMailer, spawn_mail_worker};
pub use refresh::{RefreshInput, RefreshUseCase};
pub use reset_password::{ResetPasswordInput, ResetPasswordOutput, ResetPasswordUseCase};
pub use services::{AuthServices, SessionOutput};
pub use sign_in::{SignInInput, SignInUseCase};
pub use sign_out::SignOutUseCase;
pub use sign_up::{SignUpInput, SignUpUseCase};
pub use token_service::{TokenClaims, TokenService, TokenType};
