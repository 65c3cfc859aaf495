//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in the
//! infrastructure layer.
//!
//! Reads that need no isolation go through [`AuthStore`]. Every state change
//! goes through an [`AuthTransaction`] obtained from [`AuthStore::begin`], so
//! the audit entry documenting a change commits or rolls back with it.
//! Dropping a transaction without calling `commit` rolls it back.

use chrono::{DateTime, Utc};

use crate::domain::entity::{
    audit_log::AuditLogEntry,
    credential::Credential,
    organization::{Organization, Registration},
    refresh_token::RefreshToken,
    user::User,
    verification_token::{TokenPurpose, VerificationToken},
};
use crate::domain::value_object::ids::{
    OrganizationId, RefreshTokenId, UserId, VerificationTokenId,
};
use crate::error::AuthResult;

// ============================================================================
// Filters
// ============================================================================

#[derive(Debug, Clone)]
pub struct FindUserByNormalizedEmail {
    pub normalized_email: String,
}

#[derive(Debug, Clone, Copy)]
pub struct FindUserById {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Copy)]
pub struct FindOrganizationById {
    pub organization_id: OrganizationId,
}

/// Matches a session row that is unrevoked and unexpired at `now`
#[derive(Debug, Clone)]
pub struct FindActiveRefreshToken {
    pub token_hash: String,
    pub now: DateTime<Utc>,
}

/// Matches an unconsumed, unexpired token of the given purpose at `now`
#[derive(Debug, Clone)]
pub struct FindUsableVerificationToken {
    pub token_hash: String,
    pub purpose: TokenPurpose,
    pub now: DateTime<Utc>,
}

/// User joined with their credential, if one exists
#[derive(Debug, Clone)]
pub struct UserWithCredential {
    pub user: User,
    pub credential: Option<Credential>,
}

// ============================================================================
// Store
// ============================================================================

#[trait_variant::make(AuthStore: Send)]
pub trait LocalAuthStore {
    type Tx: AuthTransaction + Send;

    async fn find_user_with_credential(
        &self,
        filter: FindUserByNormalizedEmail,
    ) -> AuthResult<Option<UserWithCredential>>;

    async fn find_user(&self, filter: FindUserById) -> AuthResult<Option<User>>;

    async fn begin(&self) -> AuthResult<Self::Tx>;
}

// ============================================================================
// Transaction
// ============================================================================

#[trait_variant::make(AuthTransaction: Send)]
pub trait LocalAuthTransaction {
    async fn find_user(&mut self, filter: FindUserById) -> AuthResult<Option<User>>;

    async fn find_organization(
        &mut self,
        filter: FindOrganizationById,
    ) -> AuthResult<Option<Organization>>;

    async fn insert_organization(&mut self, organization: &Organization) -> AuthResult<()>;

    async fn insert_registration(&mut self, registration: &Registration) -> AuthResult<()>;

    /// Fails with `EmailExists` when the normalized email is taken
    async fn insert_user(&mut self, user: &User) -> AuthResult<()>;

    async fn upsert_credential(&mut self, credential: &Credential) -> AuthResult<()>;

    async fn insert_refresh_token(&mut self, token: &RefreshToken) -> AuthResult<()>;

    async fn find_active_refresh_token(
        &mut self,
        filter: FindActiveRefreshToken,
    ) -> AuthResult<Option<RefreshToken>>;

    /// Set `revoked_at` only if the row is still unrevoked
    ///
    /// Returns `false` when another writer revoked it first.
    async fn revoke_refresh_token(
        &mut self,
        id: RefreshTokenId,
        at: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Revoke every unrevoked row of the user; returns how many changed
    async fn revoke_user_refresh_tokens(
        &mut self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> AuthResult<u64>;

    async fn insert_verification_token(&mut self, token: &VerificationToken) -> AuthResult<()>;

    async fn find_usable_verification_token(
        &mut self,
        filter: FindUsableVerificationToken,
    ) -> AuthResult<Option<VerificationToken>>;

    /// Set `consumed_at` only if still unconsumed; `false` if already used
    async fn consume_verification_token(
        &mut self,
        id: VerificationTokenId,
        at: DateTime<Utc>,
    ) -> AuthResult<bool>;

    async fn append_audit(&mut self, entry: &AuditLogEntry) -> AuthResult<()>;

    async fn commit(self) -> AuthResult<()>;
}
