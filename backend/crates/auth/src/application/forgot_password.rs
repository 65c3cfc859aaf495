//! Forgot Password Use Case
//!
//! Issues a single-use reset token and queues the reset mail. The response
//! is the same whether or not the address belongs to an active account.

use std::sync::Arc;

use chrono::Duration;
use platform::client::ClientInfo;
use platform::crypto::random_token;
use platform::rate_limit::RateLimitStore;

use crate::application::audit::audit_entry;
use crate::application::mail::PasswordResetMail;
use crate::application::rate_limit::{RateLimitSection, email_identifier};
use crate::application::services::AuthServices;
use crate::application::session_store::SessionStore;
use crate::domain::entity::{
    audit_log::AuditEvent,
    verification_token::{TokenPurpose, VerificationToken},
};
use crate::domain::repository::{AuthStore, AuthTransaction, FindUserByNormalizedEmail};
use crate::domain::value_object::email::Email;
use crate::error::AuthResult;

/// Random bytes in a reset token
const RESET_TOKEN_BYTES: usize = 32;

/// Forgot password use case
pub struct ForgotPasswordUseCase<S, L> {
    services: Arc<AuthServices<S, L>>,
}

impl<S, L> ForgotPasswordUseCase<S, L>
where
    S: AuthStore + Sync,
    L: RateLimitStore + Sync,
{
    pub fn new(services: Arc<AuthServices<S, L>>) -> Self {
        Self { services }
    }

    pub async fn execute(&self, email: &str, client: &ClientInfo) -> AuthResult<()> {
        let s = &self.services;

        s.rate_limiter
            .check(
                RateLimitSection::ForgotPassword,
                &email_identifier(email, client),
            )
            .await?;

        let found = s
            .store
            .find_user_with_credential(FindUserByNormalizedEmail {
                normalized_email: Email::normalize(email),
            })
            .await?;

        let Some(user) = found.map(|f| f.user).filter(|u| u.is_active) else {
            tracing::debug!("Password reset requested for unknown or inactive account");
            return Ok(());
        };

        let token = random_token(RESET_TOKEN_BYTES);
        let ttl_minutes = s.config.reset_token_ttl_minutes();
        let record = VerificationToken::new(
            user.user_id,
            TokenPurpose::PasswordReset,
            SessionStore::hash_token(&token),
            Duration::minutes(ttl_minutes),
        );

        let mut tx = s.store.begin().await?;
        tx.insert_verification_token(&record).await?;

        let entry = s
            .audit
            .append(
                &mut tx,
                audit_entry(
                    AuditEvent::PasswordResetRequested,
                    Some(user.user_id),
                    "Password reset requested",
                    client,
                )
                .with_metadata(serde_json::json!({
                    "tokenId": record.id.to_string(),
                    "expiresAt": record.expires_at.to_rfc3339(),
                })),
            )
            .await?;

        s.audit.commit(tx, &[entry]).await?;

        s.outbox.enqueue(PasswordResetMail {
            to: user.email.original().to_string(),
            reset_url: format!("{}?token={}", s.config.reset_url_base, token),
            expires_in_minutes: ttl_minutes,
        });

        tracing::info!(user_id = %user.user_id, "Password reset token issued");

        Ok(())
    }
}
