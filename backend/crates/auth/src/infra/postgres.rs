//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use platform::rate_limit::{RateLimitConfig, RateLimitDecision, RateLimitError, RateLimitStore};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::entity::{
    audit_log::AuditLogEntry,
    credential::Credential,
    organization::{Organization, Registration},
    refresh_token::RefreshToken,
    user::User,
    verification_token::{TokenPurpose, VerificationToken},
};
use crate::domain::repository::{
    AuthStore, AuthTransaction, FindActiveRefreshToken, FindOrganizationById,
    FindUsableVerificationToken, FindUserById, FindUserByNormalizedEmail, UserWithCredential,
};
use crate::domain::value_object::{
    email::Email,
    ids::{OrganizationId, RefreshTokenId, UserId, VerificationTokenId},
    profile_type::ProfileType,
    user_password::UserPassword,
};
use crate::error::{AuthError, AuthResult};

const USER_COLUMNS: &str = r#"
    u.user_id,
    u.email,
    u.normalized_email,
    u.profile_type,
    u.is_active,
    u.organization_id,
    u.first_name,
    u.last_name,
    u.created_at,
    u.updated_at
"#;

/// PostgreSQL-backed auth store
#[derive(Clone)]
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete session rows that can no longer be used (expired or revoked)
    /// and reset tokens that are consumed or expired
    ///
    /// Returns `(sessions_deleted, reset_tokens_deleted)`.
    pub async fn cleanup_expired(&self) -> AuthResult<(u64, u64)> {
        let sessions = sqlx::query(
            "DELETE FROM refresh_tokens WHERE expires_at < now() OR revoked_at IS NOT NULL",
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        let reset_tokens = sqlx::query(
            "DELETE FROM verification_tokens WHERE expires_at < now() OR consumed_at IS NOT NULL",
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        tracing::info!(
            sessions_deleted = sessions,
            reset_tokens_deleted = reset_tokens,
            "Cleaned up expired auth tokens"
        );

        Ok((sessions, reset_tokens))
    }
}

impl AuthStore for PgAuthStore {
    type Tx = PgAuthTransaction;

    async fn find_user_with_credential(
        &self,
        filter: FindUserByNormalizedEmail,
    ) -> AuthResult<Option<UserWithCredential>> {
        let row = sqlx::query_as::<_, UserWithCredentialRow>(&format!(
            r#"
            SELECT {USER_COLUMNS},
                c.password_hash,
                c.created_at AS credential_created_at,
                c.updated_at AS credential_updated_at
            FROM users u
            LEFT JOIN credentials c ON c.user_id = u.user_id
            WHERE u.normalized_email = $1
            "#
        ))
        .bind(&filter.normalized_email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserWithCredentialRow::into_domain).transpose()
    }

    async fn find_user(&self, filter: FindUserById) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.user_id = $1"
        ))
        .bind(filter.user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn begin(&self) -> AuthResult<PgAuthTransaction> {
        Ok(PgAuthTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// Open database transaction; rolled back by sqlx when dropped uncommitted
pub struct PgAuthTransaction {
    tx: Transaction<'static, Postgres>,
}

impl AuthTransaction for PgAuthTransaction {
    async fn find_user(&mut self, filter: FindUserById) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.user_id = $1"
        ))
        .bind(filter.user_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_organization(
        &mut self,
        filter: FindOrganizationById,
    ) -> AuthResult<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            r#"
            SELECT organization_id, name, profile_type, created_at
            FROM organizations
            WHERE organization_id = $1
            "#,
        )
        .bind(filter.organization_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(OrganizationRow::into_organization).transpose()
    }

    async fn insert_organization(&mut self, organization: &Organization) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO organizations (organization_id, name, profile_type, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(organization.organization_id.as_uuid())
        .bind(&organization.name)
        .bind(organization.profile_type.code())
        .bind(organization.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_registration(&mut self, registration: &Registration) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO registrations (
                registration_id,
                user_id,
                organization_id,
                profile_type,
                status,
                metadata,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(registration.registration_id.as_uuid())
        .bind(registration.user_id.as_uuid())
        .bind(registration.organization_id.as_uuid())
        .bind(registration.profile_type.code())
        .bind(registration.status.code())
        .bind(&registration.metadata)
        .bind(registration.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_user(&mut self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                email,
                normalized_email,
                profile_type,
                is_active,
                organization_id,
                first_name,
                last_name,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.email.original())
        .bind(user.email.normalized())
        .bind(user.profile_type.code())
        .bind(user.is_active)
        .bind(user.organization_id.map(|id| id.into_uuid()))
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AuthError::EmailExists
            }
            other => AuthError::Database(other),
        })?;

        Ok(())
    }

    async fn upsert_credential(&mut self, credential: &Credential) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO credentials (user_id, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id)
            DO UPDATE SET password_hash = EXCLUDED.password_hash,
                          updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(credential.user_id.as_uuid())
        .bind(credential.password_hash.as_phc_string())
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_refresh_token(&mut self, token: &RefreshToken) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                id,
                user_id,
                token_hash,
                fingerprint,
                user_agent,
                ip,
                remember_me,
                expires_at,
                revoked_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(token.id.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(&token.token_hash)
        .bind(&token.fingerprint)
        .bind(&token.user_agent)
        .bind(&token.ip)
        .bind(token.remember_me)
        .bind(token.expires_at)
        .bind(token.revoked_at)
        .bind(token.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_active_refresh_token(
        &mut self,
        filter: FindActiveRefreshToken,
    ) -> AuthResult<Option<RefreshToken>> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT
                id,
                user_id,
                token_hash,
                fingerprint,
                user_agent,
                ip,
                remember_me,
                expires_at,
                revoked_at,
                created_at
            FROM refresh_tokens
            WHERE token_hash = $1
              AND revoked_at IS NULL
              AND expires_at > $2
            "#,
        )
        .bind(&filter.token_hash)
        .bind(filter.now)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(RefreshTokenRow::into_token))
    }

    async fn revoke_refresh_token(
        &mut self,
        id: RefreshTokenId,
        at: DateTime<Utc>,
    ) -> AuthResult<bool> {
        // A concurrent revoker holds the row lock; after it commits this
        // re-checks the predicate and matches nothing.
        let affected = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(affected == 1)
    }

    async fn revoke_user_refresh_tokens(
        &mut self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let affected = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(affected)
    }

    async fn insert_verification_token(&mut self, token: &VerificationToken) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO verification_tokens (
                id,
                user_id,
                purpose,
                token_hash,
                expires_at,
                consumed_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.id.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(token.purpose.code())
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.consumed_at)
        .bind(token.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_usable_verification_token(
        &mut self,
        filter: FindUsableVerificationToken,
    ) -> AuthResult<Option<VerificationToken>> {
        let row = sqlx::query_as::<_, VerificationTokenRow>(
            r#"
            SELECT id, user_id, purpose, token_hash, expires_at, consumed_at, created_at
            FROM verification_tokens
            WHERE token_hash = $1
              AND purpose = $2
              AND consumed_at IS NULL
              AND expires_at > $3
            "#,
        )
        .bind(&filter.token_hash)
        .bind(filter.purpose.code())
        .bind(filter.now)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(VerificationTokenRow::into_token).transpose()
    }

    async fn consume_verification_token(
        &mut self,
        id: VerificationTokenId,
        at: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let affected = sqlx::query(
            "UPDATE verification_tokens SET consumed_at = $2 WHERE id = $1 AND consumed_at IS NULL",
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        Ok(affected == 1)
    }

    async fn append_audit(&mut self, entry: &AuditLogEntry) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id,
                event,
                user_id,
                message,
                metadata,
                ip,
                user_agent,
                created_at,
                seal
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.event.code())
        .bind(entry.user_id.map(|id| id.into_uuid()))
        .bind(&entry.message)
        .bind(&entry.metadata)
        .bind(&entry.ip)
        .bind(&entry.user_agent)
        .bind(entry.created_at)
        .bind(&entry.seal)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> AuthResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// Rate Limit Store
// ============================================================================

/// Rate-limit counters shared by every API instance
#[derive(Clone)]
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete windows that have already ended
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now_ms = Utc::now().timestamp_millis();

        let deleted = sqlx::query("DELETE FROM auth_rate_limits WHERE expires_at_ms < $1")
            .bind(now_ms)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(windows_deleted = deleted, "Cleaned up expired rate limit windows");

        Ok(deleted)
    }
}

impl RateLimitStore for PgRateLimitStore {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let window_start = config.window_start_ms(Utc::now().timestamp_millis());

        // Single statement: the row lock serialises concurrent increments
        let (count,) = sqlx::query_as::<_, (i32,)>(
            r#"
            INSERT INTO auth_rate_limits (key, window_start_ms, expires_at_ms, request_count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (key, window_start_ms)
            DO UPDATE SET request_count = auth_rate_limits.request_count + 1
            RETURNING request_count
            "#,
        )
        .bind(key)
        .bind(window_start)
        .bind(window_start + config.window_ms())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RateLimitError::Store(e.to_string()))?;

        Ok(RateLimitDecision::from_count(
            count.max(0) as u32,
            config,
            window_start,
        ))
    }
}

// ============================================================================
// Internal row types for sqlx mapping
// ============================================================================

fn profile_type(code: &str) -> AuthResult<ProfileType> {
    ProfileType::from_code(code)
        .ok_or_else(|| AuthError::Internal(format!("Invalid profile_type: {}", code)))
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    normalized_email: String,
    profile_type: String,
    is_active: bool,
    organization_id: Option<Uuid>,
    first_name: String,
    last_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            email: Email::from_db(self.email, self.normalized_email),
            profile_type: profile_type(&self.profile_type)?,
            is_active: self.is_active,
            organization_id: self.organization_id.map(OrganizationId::from_uuid),
            first_name: self.first_name,
            last_name: self.last_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserWithCredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
    credential_created_at: Option<DateTime<Utc>>,
    credential_updated_at: Option<DateTime<Utc>>,
}

impl UserWithCredentialRow {
    fn into_domain(self) -> AuthResult<UserWithCredential> {
        let user = self.user.into_user()?;

        let credential = match (
            self.password_hash,
            self.credential_created_at,
            self.credential_updated_at,
        ) {
            (Some(hash), Some(created_at), Some(updated_at)) => Some(Credential {
                user_id: user.user_id,
                password_hash: UserPassword::from_phc_string(hash)?,
                created_at,
                updated_at,
            }),
            _ => None,
        };

        Ok(UserWithCredential { user, credential })
    }
}

#[derive(sqlx::FromRow)]
struct OrganizationRow {
    organization_id: Uuid,
    name: String,
    profile_type: String,
    created_at: DateTime<Utc>,
}

impl OrganizationRow {
    fn into_organization(self) -> AuthResult<Organization> {
        Ok(Organization {
            organization_id: OrganizationId::from_uuid(self.organization_id),
            name: self.name,
            profile_type: profile_type(&self.profile_type)?,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    fingerprint: Option<String>,
    user_agent: Option<String>,
    ip: Option<String>,
    remember_me: bool,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    fn into_token(self) -> RefreshToken {
        RefreshToken {
            id: RefreshTokenId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            token_hash: self.token_hash,
            fingerprint: self.fingerprint,
            user_agent: self.user_agent,
            ip: self.ip,
            remember_me: self.remember_me,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VerificationTokenRow {
    id: Uuid,
    user_id: Uuid,
    purpose: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl VerificationTokenRow {
    fn into_token(self) -> AuthResult<VerificationToken> {
        let purpose = TokenPurpose::from_code(&self.purpose)
            .ok_or_else(|| AuthError::Internal(format!("Invalid purpose: {}", self.purpose)))?;

        Ok(VerificationToken {
            id: VerificationTokenId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            purpose,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            consumed_at: self.consumed_at,
            created_at: self.created_at,
        })
    }
}
