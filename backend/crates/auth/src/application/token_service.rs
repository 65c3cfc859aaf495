//! Token Service
//!
//! Signs and verifies HS256 JWTs. Every token carries a `tokenType`
//! discriminator; verification rejects a token of the other type so an
//! access token can never stand in for a refresh token or vice versa.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::config::AuthConfig;
use crate::domain::entity::user::User;
use crate::domain::value_object::{ids::RefreshTokenId, profile_type::ProfileType};
use crate::error::{AuthError, AuthResult};

/// Allowed clock skew when checking `exp`
const LEEWAY_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: ProfileType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_id: Option<Uuid>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub token_type: TokenType,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

/// Identity embedded in a token pair
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub email: String,
    pub role: ProfileType,
    pub facility_id: Option<Uuid>,
    pub manufacturer_id: Option<Uuid>,
    pub permissions: Vec<String>,
}

impl TokenSubject {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.user_id.into_uuid(),
            email: user.email.normalized().to_string(),
            role: user.profile_type,
            facility_id: user.facility_id().map(|id| id.into_uuid()),
            manufacturer_id: user.manufacturer_id().map(|id| id.into_uuid()),
            permissions: user
                .profile_type
                .permissions()
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// A signed token and when it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(&config.jwt_secret)),
            decoding_key: Arc::new(DecodingKey::from_secret(&config.jwt_secret)),
            issuer: config.jwt_issuer.clone(),
            access_ttl: Duration::seconds(config.access_token_ttl_secs()),
            refresh_ttl: Duration::seconds(config.refresh_token_ttl_secs()),
        }
    }

    pub fn sign_access(&self, subject: &TokenSubject) -> AuthResult<IssuedToken> {
        self.sign(subject, TokenType::Access, Uuid::new_v4(), self.access_ttl)
    }

    /// Sign a refresh token whose `jti` is the session row id
    pub fn sign_refresh(
        &self,
        subject: &TokenSubject,
        session_id: RefreshTokenId,
    ) -> AuthResult<IssuedToken> {
        self.sign(
            subject,
            TokenType::Refresh,
            session_id.into_uuid(),
            self.refresh_ttl,
        )
    }

    pub fn verify_access(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify(token, TokenType::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify(token, TokenType::Refresh)
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn sign(
        &self,
        subject: &TokenSubject,
        token_type: TokenType,
        jti: Uuid,
        ttl: Duration,
    ) -> AuthResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + ttl;

        let claims = TokenClaims {
            sub: subject.user_id,
            email: subject.email.clone(),
            role: subject.role,
            facility_id: subject.facility_id,
            manufacturer_id: subject.manufacturer_id,
            permissions: subject.permissions.clone(),
            token_type,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {}", e)))?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .unwrap_or(expires_at),
        })
    }

    fn verify(&self, token: &str, expected: TokenType) -> AuthResult<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = LEEWAY_SECS;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "Token verification failed");
            AuthError::InvalidToken
        })?;

        if data.claims.token_type != expected {
            tracing::warn!(
                expected = ?expected,
                presented = ?data.claims.token_type,
                "Token type mismatch"
            );
            return Err(AuthError::InvalidToken);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::email::Email;

    fn service() -> TokenService {
        TokenService::new(&AuthConfig::with_random_secret())
    }

    fn subject() -> TokenSubject {
        let user = User::new(
            Email::new("a@x.com").unwrap(),
            ProfileType::Facility,
            "A",
            "X",
            Some(crate::domain::value_object::ids::OrganizationId::new()),
        );
        TokenSubject::from_user(&user)
    }

    #[test]
    fn test_access_roundtrip_carries_identity() {
        let svc = service();
        let subject = subject();
        let issued = svc.sign_access(&subject).unwrap();

        let claims = svc.verify_access(&issued.token).unwrap();
        assert_eq!(claims.sub, subject.user_id);
        assert_eq!(claims.role, ProfileType::Facility);
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(claims.facility_id.is_some());
        assert!(claims.manufacturer_id.is_none());
        assert!(claims.permissions.contains(&"complaints:write".to_string()));
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_jti_is_session_id() {
        let svc = service();
        let session_id = RefreshTokenId::new();
        let issued = svc.sign_refresh(&subject(), session_id).unwrap();

        let claims = svc.verify_refresh(&issued.token).unwrap();
        assert_eq!(claims.jti, session_id.into_uuid());
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 3600);
    }

    #[test]
    fn test_token_type_confusion_rejected() {
        let svc = service();
        let access = svc.sign_access(&subject()).unwrap();
        let refresh = svc.sign_refresh(&subject(), RefreshTokenId::new()).unwrap();

        assert!(matches!(
            svc.verify_refresh(&access.token),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            svc.verify_access(&refresh.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = service().sign_access(&subject()).unwrap();
        assert!(matches!(
            service().verify_access(&issued.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_rejected() {
        let verifier = service();
        let mut signer = verifier.clone();
        signer.access_ttl = Duration::seconds(-3600);

        let issued = signer.sign_access(&subject()).unwrap();
        assert!(matches!(
            verifier.verify_access(&issued.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let config = AuthConfig::with_random_secret();
        let svc = TokenService::new(&config);
        let other = TokenService {
            issuer: "someone-else".to_string(),
            ..svc.clone()
        };

        let issued = other.sign_access(&subject()).unwrap();
        assert!(svc.verify_access(&issued.token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            service().verify_refresh("not.a.jwt"),
            Err(AuthError::InvalidToken)
        ));
    }
}
