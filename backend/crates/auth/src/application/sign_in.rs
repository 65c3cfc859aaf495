//! Sign In Use Case
//!
//! Authenticates with email and password and opens a session.
//!
//! An unknown email, a missing credential, and a wrong password all end in
//! the same [`AuthError::InvalidCredentials`] after the same Argon2 work.
//! A disabled account is only reported once the correct password has been
//! presented, so the 403 does not reveal that an address is registered.

use std::sync::Arc;

use platform::client::ClientInfo;
use platform::rate_limit::RateLimitStore;

use crate::application::audit::audit_entry;
use crate::application::rate_limit::{RateLimitSection, email_identifier};
use crate::application::services::{AuthServices, SessionOutput, session_device};
use crate::domain::entity::audit_log::AuditEvent;
use crate::domain::repository::{AuthStore, FindUserByNormalizedEmail, UserWithCredential};
use crate::domain::value_object::{email::Email, ids::UserId, user_password::RawPassword};
use crate::error::{AuthError, AuthResult};

/// Sign in input
#[derive(Debug, Clone)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
    /// `false` writes the refresh cookie with `Max-Age=0` (discarded at once)
    pub remember_me: bool,
    pub fingerprint: Option<String>,
}

/// Sign in use case
pub struct SignInUseCase<S, L> {
    services: Arc<AuthServices<S, L>>,
}

impl<S, L> SignInUseCase<S, L>
where
    S: AuthStore + Sync,
    L: RateLimitStore + Sync,
{
    pub fn new(services: Arc<AuthServices<S, L>>) -> Self {
        Self { services }
    }

    pub async fn execute(
        &self,
        input: SignInInput,
        client: &ClientInfo,
    ) -> AuthResult<SessionOutput> {
        let s = &self.services;

        s.rate_limiter
            .check(
                RateLimitSection::Login,
                &email_identifier(&input.email, client),
            )
            .await?;

        let found = s
            .store
            .find_user_with_credential(FindUserByNormalizedEmail {
                normalized_email: Email::normalize(&input.email),
            })
            .await?;

        let raw = RawPassword::for_login(input.password);

        let (user, credential) = match found {
            Some(UserWithCredential {
                user,
                credential: Some(credential),
            }) => (user, credential),
            other => {
                // Same hashing cost as a real verification
                if let Some(raw) = raw {
                    s.credentials.verify(raw, None).await?;
                }
                let user_id = other.map(|found| found.user.user_id);
                self.record_failure(user_id, "unknown_account", client).await?;
                return Err(AuthError::InvalidCredentials);
            }
        };

        let verified = match raw {
            Some(raw) => {
                s.credentials
                    .verify(raw, Some(credential.password_hash))
                    .await?
            }
            None => false,
        };

        if !verified {
            self.record_failure(Some(user.user_id), "password_mismatch", client)
                .await?;
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            tracing::warn!(user_id = %user.user_id, "Login to disabled account");
            return Err(AuthError::AccountDisabled);
        }

        let mut tx = s.store.begin().await?;

        let device = session_device(client, input.fingerprint);
        let issued = s
            .sessions
            .create(&mut tx, &user, &device, input.remember_me)
            .await?;

        let entry = s
            .audit
            .append(
                &mut tx,
                audit_entry(
                    AuditEvent::LoginSuccess,
                    Some(user.user_id),
                    "User logged in",
                    client,
                )
                .with_metadata(serde_json::json!({
                    "sessionId": issued.session.id.to_string(),
                    "rememberMe": input.remember_me,
                })),
            )
            .await?;

        s.audit.commit(tx, &[entry]).await?;

        tracing::info!(
            user_id = %user.user_id,
            session_id = %issued.session.id,
            remember_me = input.remember_me,
            "User logged in"
        );

        Ok(SessionOutput::new(issued, user, &s.config))
    }

    async fn record_failure(
        &self,
        user_id: Option<UserId>,
        reason: &str,
        client: &ClientInfo,
    ) -> AuthResult<()> {
        let s = &self.services;
        let mut tx = s.store.begin().await?;
        let entry = s
            .audit
            .append(
                &mut tx,
                audit_entry(AuditEvent::LoginFailure, user_id, "Login failed", client)
                    .with_metadata(serde_json::json!({ "reason": reason })),
            )
            .await?;
        s.audit.commit(tx, &[entry]).await
    }
}
