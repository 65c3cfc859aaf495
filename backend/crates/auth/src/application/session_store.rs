//! Session Store
//!
//! Mints token pairs and keeps the refresh-token session rows that back
//! them. All operations run inside the caller's transaction.
//!
//! Rotation revokes the old row with a conditional update and inserts the
//! replacement in the same transaction. When two requests race on the same
//! row only one conditional update succeeds; the other sees
//! [`AuthError::TokenRevoked`].

use chrono::Utc;
use platform::crypto::sha256_hex;

use crate::application::token_service::{IssuedToken, TokenService, TokenSubject};
use crate::domain::entity::refresh_token::{RefreshToken, SessionDevice};
use crate::domain::entity::user::User;
use crate::domain::repository::{AuthTransaction, FindActiveRefreshToken};
use crate::domain::value_object::ids::{RefreshTokenId, UserId};
use crate::error::{AuthError, AuthResult};

/// Tokens handed to the client plus the row persisted for them
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub access_token: IssuedToken,
    pub refresh_token: IssuedToken,
    pub session: RefreshToken,
}

#[derive(Clone)]
pub struct SessionStore {
    tokens: TokenService,
}

impl SessionStore {
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }

    /// Storage form of a refresh token value
    pub fn hash_token(token: &str) -> String {
        sha256_hex(token.as_bytes())
    }

    /// Issue a token pair and persist a new active session row
    pub async fn create<T: AuthTransaction>(
        &self,
        tx: &mut T,
        user: &User,
        device: &SessionDevice,
        remember_me: bool,
    ) -> AuthResult<IssuedSession> {
        let subject = TokenSubject::from_user(user);
        let session_id = RefreshTokenId::new();

        let access_token = self.tokens.sign_access(&subject)?;
        let refresh_token = self.tokens.sign_refresh(&subject, session_id)?;

        let session = RefreshToken::new(
            session_id,
            user.user_id,
            Self::hash_token(&refresh_token.token),
            device,
            remember_me,
            self.tokens.refresh_ttl(),
        );
        tx.insert_refresh_token(&session).await?;

        tracing::debug!(
            user_id = %user.user_id,
            session_id = %session_id,
            "Session created"
        );

        Ok(IssuedSession {
            access_token,
            refresh_token,
            session,
        })
    }

    /// Revoke `old` and replace it with a fresh row and token pair
    pub async fn rotate<T: AuthTransaction>(
        &self,
        tx: &mut T,
        old: &RefreshToken,
        user: &User,
        device: &SessionDevice,
    ) -> AuthResult<IssuedSession> {
        if !tx.revoke_refresh_token(old.id, Utc::now()).await? {
            tracing::warn!(
                user_id = %old.user_id,
                session_id = %old.id,
                "Rotation lost to a concurrent revocation"
            );
            return Err(AuthError::TokenRevoked);
        }

        let issued = self.create(tx, user, device, old.remember_me).await?;

        tracing::debug!(
            user_id = %user.user_id,
            old_session_id = %old.id,
            new_session_id = %issued.session.id,
            "Session rotated"
        );

        Ok(issued)
    }

    /// Revoke a row; revoking an already revoked row is not an error
    pub async fn revoke<T: AuthTransaction>(
        &self,
        tx: &mut T,
        session: &RefreshToken,
    ) -> AuthResult<bool> {
        tx.revoke_refresh_token(session.id, Utc::now()).await
    }

    /// Active row for a raw refresh token value
    ///
    /// Unknown, expired, and revoked tokens all yield `None`.
    pub async fn lookup_active<T: AuthTransaction>(
        &self,
        tx: &mut T,
        token: &str,
    ) -> AuthResult<Option<RefreshToken>> {
        tx.find_active_refresh_token(FindActiveRefreshToken {
            token_hash: Self::hash_token(token),
            now: Utc::now(),
        })
        .await
    }

    /// Revoke every active row of a user
    pub async fn revoke_all_for_user<T: AuthTransaction>(
        &self,
        tx: &mut T,
        user_id: UserId,
    ) -> AuthResult<u64> {
        let revoked = tx.revoke_user_refresh_tokens(user_id, Utc::now()).await?;
        tracing::info!(user_id = %user_id, revoked, "Revoked all sessions for user");
        Ok(revoked)
    }
}
