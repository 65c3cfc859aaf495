//! Reset Password Use Case
//!
//! Redeems a reset token: replaces the credential, consumes the token, and
//! revokes every session of the user in one transaction.

use std::sync::Arc;

use chrono::Utc;
use platform::client::ClientInfo;
use platform::rate_limit::RateLimitStore;

use crate::application::audit::audit_entry;
use crate::application::rate_limit::{RateLimitSection, token_identifier};
use crate::application::services::AuthServices;
use crate::application::session_store::SessionStore;
use crate::domain::entity::{audit_log::AuditEvent, verification_token::TokenPurpose};
use crate::domain::repository::{
    AuthStore, AuthTransaction, FindUsableVerificationToken, FindUserById,
};
use crate::domain::value_object::user_password::RawPassword;
use crate::error::{AuthError, AuthResult};

/// Reset password input
#[derive(Debug, Clone)]
pub struct ResetPasswordInput {
    pub token: String,
    pub password: String,
}

/// Reset password output
#[derive(Debug, Clone, Copy)]
pub struct ResetPasswordOutput {
    pub revoked_sessions: u64,
    pub expires_in_minutes: i64,
}

/// Reset password use case
pub struct ResetPasswordUseCase<S, L> {
    services: Arc<AuthServices<S, L>>,
}

impl<S, L> ResetPasswordUseCase<S, L>
where
    S: AuthStore + Sync,
    L: RateLimitStore + Sync,
{
    pub fn new(services: Arc<AuthServices<S, L>>) -> Self {
        Self { services }
    }

    pub async fn execute(
        &self,
        input: ResetPasswordInput,
        client: &ClientInfo,
    ) -> AuthResult<ResetPasswordOutput> {
        let s = &self.services;

        s.rate_limiter
            .check(
                RateLimitSection::ResetPassword,
                &token_identifier(&input.token, client),
            )
            .await?;

        let password = RawPassword::for_field(input.password, "password")?;
        let password_hash = s.credentials.hash(password).await?;

        let mut tx = s.store.begin().await?;

        let token = tx
            .find_usable_verification_token(FindUsableVerificationToken {
                token_hash: SessionStore::hash_token(&input.token),
                purpose: TokenPurpose::PasswordReset,
                now: Utc::now(),
            })
            .await?
            .ok_or(AuthError::ResetTokenInvalid)?;

        let user = tx
            .find_user(FindUserById {
                user_id: token.user_id,
            })
            .await?
            .ok_or(AuthError::ResetTokenInvalid)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        if !tx.consume_verification_token(token.id, Utc::now()).await? {
            return Err(AuthError::ResetTokenInvalid);
        }

        s.credentials
            .store(&mut tx, user.user_id, password_hash)
            .await?;

        let revoked_sessions = s.sessions.revoke_all_for_user(&mut tx, user.user_id).await?;

        let entry = s
            .audit
            .append(
                &mut tx,
                audit_entry(
                    AuditEvent::PasswordReset,
                    Some(user.user_id),
                    "Password reset",
                    client,
                )
                .with_metadata(serde_json::json!({
                    "tokenId": token.id.to_string(),
                    "revokedSessions": revoked_sessions,
                })),
            )
            .await?;

        s.audit.commit(tx, &[entry]).await?;

        tracing::info!(
            user_id = %user.user_id,
            revoked_sessions,
            "Password reset completed"
        );

        Ok(ResetPasswordOutput {
            revoked_sessions,
            expires_in_minutes: s.config.reset_token_ttl_minutes(),
        })
    }
}
