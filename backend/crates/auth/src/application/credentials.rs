//! Credential Store
//!
//! Creates and verifies password hashes. Argon2id is CPU-bound, so the work
//! runs on the blocking pool instead of an async worker.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::domain::entity::credential::Credential;
use crate::domain::repository::AuthTransaction;
use crate::domain::value_object::{
    ids::UserId,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

#[derive(Clone)]
pub struct CredentialStore {
    pepper: Option<Arc<[u8]>>,
}

impl CredentialStore {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            pepper: config.pepper().map(Arc::from),
        }
    }

    /// Hash a raw password
    pub async fn hash(&self, raw: RawPassword) -> AuthResult<UserPassword> {
        let pepper = self.pepper.clone();
        tokio::task::spawn_blocking(move || UserPassword::from_raw(&raw, pepper.as_deref()))
            .await
            .map_err(|e| AuthError::Internal(format!("Hashing task failed: {}", e)))?
    }

    /// Verify a raw password against a stored hash
    ///
    /// With no stored hash a dummy verification runs so that the caller
    /// cannot tell a missing account from a wrong password by timing.
    pub async fn verify(&self, raw: RawPassword, stored: Option<UserPassword>) -> AuthResult<bool> {
        let pepper = self.pepper.clone();
        tokio::task::spawn_blocking(move || match stored {
            Some(hash) => hash.verify(&raw, pepper.as_deref()),
            None => UserPassword::verify_missing(&raw, pepper.as_deref()),
        })
        .await
        .map_err(|e| AuthError::Internal(format!("Verification task failed: {}", e)))
    }

    /// Create or replace the credential of `user_id`
    pub async fn store<T: AuthTransaction>(
        &self,
        tx: &mut T,
        user_id: UserId,
        password_hash: UserPassword,
    ) -> AuthResult<Credential> {
        let credential = Credential::new(user_id, password_hash);
        tx.upsert_credential(&credential).await?;
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let store = CredentialStore::new(&AuthConfig {
            password_pepper: Some(b"pepper".to_vec()),
            ..AuthConfig::default()
        });

        let hash = store
            .hash(RawPassword::new("Passw0rd1".to_string()).unwrap())
            .await
            .unwrap();

        let ok = RawPassword::for_login("Passw0rd1".to_string()).unwrap();
        assert!(store.verify(ok, Some(hash.clone())).await.unwrap());

        let bad = RawPassword::for_login("Passw0rd2".to_string()).unwrap();
        assert!(!store.verify(bad, Some(hash)).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_hash_never_verifies() {
        let store = CredentialStore::new(&AuthConfig::default());
        let raw = RawPassword::for_login("Passw0rd1".to_string()).unwrap();
        assert!(!store.verify(raw, None).await.unwrap());
    }
}
