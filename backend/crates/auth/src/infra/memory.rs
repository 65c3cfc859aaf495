//! In-Memory Store
//!
//! `AuthStore` over process memory, for tests and local development.
//! Transactions are serialised: `begin` takes the state lock and works on a
//! copy, `commit` swaps the copy in, and dropping discards it. Callers must
//! not use the store's own read methods while holding a transaction.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::entity::{
    audit_log::AuditLogEntry,
    credential::Credential,
    organization::{Organization, Registration},
    refresh_token::RefreshToken,
    user::User,
    verification_token::VerificationToken,
};
use crate::domain::repository::{
    AuthStore, AuthTransaction, FindActiveRefreshToken, FindOrganizationById,
    FindUsableVerificationToken, FindUserById, FindUserByNormalizedEmail, UserWithCredential,
};
use crate::domain::value_object::ids::{
    OrganizationId, RefreshTokenId, UserId, VerificationTokenId,
};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub users: HashMap<UserId, User>,
    pub credentials: HashMap<UserId, Credential>,
    pub organizations: HashMap<OrganizationId, Organization>,
    pub registrations: Vec<Registration>,
    pub refresh_tokens: HashMap<RefreshTokenId, RefreshToken>,
    pub verification_tokens: HashMap<VerificationTokenId, VerificationToken>,
    pub audit_log: Vec<AuditLogEntry>,
}

impl MemoryState {
    fn user_by_email(&self, normalized_email: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.email.normalized() == normalized_email)
    }
}

#[derive(Clone, Default)]
pub struct MemoryAuthStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Mutate committed state directly, outside any transaction
    pub async fn update<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        f(&mut *self.state.lock().await)
    }

    /// Drop unusable session rows and reset tokens; same contract as the
    /// Postgres store
    pub async fn cleanup_expired(&self) -> AuthResult<(u64, u64)> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let sessions = state.refresh_tokens.len();
        state.refresh_tokens.retain(|_, t| t.is_active(now));
        let sessions = (sessions - state.refresh_tokens.len()) as u64;

        let reset_tokens = state.verification_tokens.len();
        state.verification_tokens.retain(|_, t| t.is_usable(now));
        let reset_tokens = (reset_tokens - state.verification_tokens.len()) as u64;

        Ok((sessions, reset_tokens))
    }
}

impl AuthStore for MemoryAuthStore {
    type Tx = MemoryTransaction;

    async fn find_user_with_credential(
        &self,
        filter: FindUserByNormalizedEmail,
    ) -> AuthResult<Option<UserWithCredential>> {
        let state = self.state.lock().await;
        Ok(state
            .user_by_email(&filter.normalized_email)
            .map(|user| UserWithCredential {
                user: user.clone(),
                credential: state.credentials.get(&user.user_id).cloned(),
            }))
    }

    async fn find_user(&self, filter: FindUserById) -> AuthResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&filter.user_id).cloned())
    }

    async fn begin(&self) -> AuthResult<MemoryTransaction> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTransaction { guard, working })
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl AuthTransaction for MemoryTransaction {
    async fn find_user(&mut self, filter: FindUserById) -> AuthResult<Option<User>> {
        Ok(self.working.users.get(&filter.user_id).cloned())
    }

    async fn find_organization(
        &mut self,
        filter: FindOrganizationById,
    ) -> AuthResult<Option<Organization>> {
        Ok(self
            .working
            .organizations
            .get(&filter.organization_id)
            .cloned())
    }

    async fn insert_organization(&mut self, organization: &Organization) -> AuthResult<()> {
        self.working
            .organizations
            .insert(organization.organization_id, organization.clone());
        Ok(())
    }

    async fn insert_registration(&mut self, registration: &Registration) -> AuthResult<()> {
        self.working.registrations.push(registration.clone());
        Ok(())
    }

    async fn insert_user(&mut self, user: &User) -> AuthResult<()> {
        if self.working.user_by_email(user.email.normalized()).is_some() {
            return Err(AuthError::EmailExists);
        }
        self.working.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn upsert_credential(&mut self, credential: &Credential) -> AuthResult<()> {
        let created_at = self
            .working
            .credentials
            .get(&credential.user_id)
            .map(|c| c.created_at)
            .unwrap_or(credential.created_at);
        self.working.credentials.insert(
            credential.user_id,
            Credential {
                created_at,
                ..credential.clone()
            },
        );
        Ok(())
    }

    async fn insert_refresh_token(&mut self, token: &RefreshToken) -> AuthResult<()> {
        self.working.refresh_tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_active_refresh_token(
        &mut self,
        filter: FindActiveRefreshToken,
    ) -> AuthResult<Option<RefreshToken>> {
        Ok(self
            .working
            .refresh_tokens
            .values()
            .find(|t| t.token_hash == filter.token_hash && t.is_active(filter.now))
            .cloned())
    }

    async fn revoke_refresh_token(
        &mut self,
        id: RefreshTokenId,
        at: DateTime<Utc>,
    ) -> AuthResult<bool> {
        match self.working.refresh_tokens.get_mut(&id) {
            Some(token) if token.revoked_at.is_none() => {
                token.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_user_refresh_tokens(
        &mut self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let mut revoked = 0;
        for token in self.working.refresh_tokens.values_mut() {
            if token.user_id == user_id && token.revoked_at.is_none() {
                token.revoked_at = Some(at);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn insert_verification_token(&mut self, token: &VerificationToken) -> AuthResult<()> {
        self.working
            .verification_tokens
            .insert(token.id, token.clone());
        Ok(())
    }

    async fn find_usable_verification_token(
        &mut self,
        filter: FindUsableVerificationToken,
    ) -> AuthResult<Option<VerificationToken>> {
        Ok(self
            .working
            .verification_tokens
            .values()
            .find(|t| {
                t.token_hash == filter.token_hash
                    && t.purpose == filter.purpose
                    && t.is_usable(filter.now)
            })
            .cloned())
    }

    async fn consume_verification_token(
        &mut self,
        id: VerificationTokenId,
        at: DateTime<Utc>,
    ) -> AuthResult<bool> {
        match self.working.verification_tokens.get_mut(&id) {
            Some(token) if token.consumed_at.is_none() => {
                token.consumed_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_audit(&mut self, entry: &AuditLogEntry) -> AuthResult<()> {
        self.working.audit_log.push(entry.clone());
        Ok(())
    }

    async fn commit(mut self) -> AuthResult<()> {
        *self.guard = self.working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::audit_log::AuditEvent;
    use crate::domain::entity::verification_token::TokenPurpose;
    use crate::domain::value_object::{email::Email, profile_type::ProfileType};

    fn user(email: &str) -> User {
        User::new(Email::new(email).unwrap(), ProfileType::Admin, "A", "B", None)
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let store = MemoryAuthStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_user(&user("a@x.com")).await.unwrap();
        }
        assert!(store.snapshot().await.users.is_empty());
    }

    #[tokio::test]
    async fn test_commit_publishes() {
        let store = MemoryAuthStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&user("a@x.com")).await.unwrap();
        tx.append_audit(&AuditLogEntry::new(AuditEvent::Signup, None, "x"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.users.len(), 1);
        assert_eq!(state.audit_log.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryAuthStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&user("a@x.com")).await.unwrap();
        assert!(matches!(
            tx.insert_user(&user("A@X.com")).await,
            Err(AuthError::EmailExists)
        ));
    }

    fn session(ttl: chrono::Duration) -> RefreshToken {
        RefreshToken::new(
            RefreshTokenId::new(),
            UserId::new(),
            RefreshTokenId::new().to_string(),
            &Default::default(),
            true,
            ttl,
        )
    }

    fn reset_token(ttl: chrono::Duration) -> VerificationToken {
        VerificationToken::new(
            UserId::new(),
            TokenPurpose::PasswordReset,
            VerificationTokenId::new().to_string(),
            ttl,
        )
    }

    #[tokio::test]
    async fn test_cleanup_keeps_only_usable_tokens() {
        let store = MemoryAuthStore::new();
        let live = session(chrono::Duration::hours(1));
        let revoked = session(chrono::Duration::hours(1));
        let expired = session(chrono::Duration::hours(-1));
        let usable = reset_token(chrono::Duration::hours(1));
        let consumed = reset_token(chrono::Duration::hours(1));
        let stale = reset_token(chrono::Duration::hours(-1));

        let mut tx = store.begin().await.unwrap();
        for token in [&live, &revoked, &expired] {
            tx.insert_refresh_token(token).await.unwrap();
        }
        for token in [&usable, &consumed, &stale] {
            tx.insert_verification_token(token).await.unwrap();
        }
        tx.revoke_refresh_token(revoked.id, Utc::now()).await.unwrap();
        tx.consume_verification_token(consumed.id, Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), (2, 2));

        let state = store.snapshot().await;
        assert_eq!(state.refresh_tokens.keys().collect::<Vec<_>>(), [&live.id]);
        assert_eq!(
            state.verification_tokens.keys().collect::<Vec<_>>(),
            [&usable.id]
        );
        assert_eq!(store.cleanup_expired().await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn test_conditional_revoke() {
        let store = MemoryAuthStore::new();
        let token = RefreshToken::new(
            RefreshTokenId::new(),
            UserId::new(),
            "h".to_string(),
            &Default::default(),
            true,
            chrono::Duration::hours(1),
        );

        let mut tx = store.begin().await.unwrap();
        tx.insert_refresh_token(&token).await.unwrap();
        assert!(tx.revoke_refresh_token(token.id, Utc::now()).await.unwrap());
        assert!(!tx.revoke_refresh_token(token.id, Utc::now()).await.unwrap());
    }
}
