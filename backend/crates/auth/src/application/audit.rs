//! Audit Logger
//!
//! Seals entries and writes them through the caller's transaction, so an
//! entry exists exactly when the change it documents was committed. After a
//! successful commit each entry is mirrored to the `audit` tracing target.

use std::sync::Arc;

use platform::client::ClientInfo;

use crate::domain::entity::audit_log::{AuditEvent, AuditLogEntry};
use crate::domain::value_object::ids::UserId;
use crate::domain::repository::AuthTransaction;
use crate::error::AuthResult;

#[derive(Clone)]
pub struct AuditLogger {
    key: Arc<[u8]>,
}

impl AuditLogger {
    pub fn new(key: &[u8]) -> Self {
        Self { key: Arc::from(key) }
    }

    /// Seal `entry` and append it inside `tx`
    pub async fn append<T: AuthTransaction>(
        &self,
        tx: &mut T,
        entry: AuditLogEntry,
    ) -> AuthResult<AuditLogEntry> {
        let entry = entry.seal_with(&self.key);
        tx.append_audit(&entry).await?;
        Ok(entry)
    }

    /// Commit `tx`, then emit the entries it carried
    pub async fn commit<T: AuthTransaction>(
        &self,
        tx: T,
        entries: &[AuditLogEntry],
    ) -> AuthResult<()> {
        tx.commit().await?;
        for entry in entries {
            emit(entry);
        }
        Ok(())
    }

    pub fn verify(&self, entry: &AuditLogEntry) -> bool {
        entry.verify_seal(&self.key)
    }
}

/// Unsealed entry stamped with the request origin
pub fn audit_entry(
    event: AuditEvent,
    user_id: Option<UserId>,
    message: impl Into<String>,
    client: &ClientInfo,
) -> AuditLogEntry {
    AuditLogEntry::new(event, user_id, message)
        .with_origin(client.ip_string(), client.user_agent.clone())
}

fn emit(entry: &AuditLogEntry) {
    tracing::info!(
        target: "audit",
        audit_id = %entry.id,
        event = %entry.event,
        user_id = ?entry.user_id.map(|id| id.to_string()),
        ip = ?entry.ip,
        metadata = %entry.metadata,
        "{}",
        entry.message
    );
}
