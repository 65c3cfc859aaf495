//! Organization and Registration Entities
//!
//! Facility and manufacturer accounts either join an existing organization
//! or create one together with a registration awaiting admin approval.

use chrono::{DateTime, Utc};
use derive_more::Display;

use crate::domain::value_object::{
    ids::{OrganizationId, RegistrationId, UserId},
    profile_type::ProfileType,
};

#[derive(Debug, Clone)]
pub struct Organization {
    pub organization_id: OrganizationId,
    pub name: String,
    pub profile_type: ProfileType,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>, profile_type: ProfileType) -> Self {
        Self {
            organization_id: OrganizationId::new(),
            name: name.into(),
            profile_type,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RegistrationStatus {
    #[display("PENDING")]
    Pending,
    #[display("APPROVED")]
    Approved,
    #[display("REJECTED")]
    Rejected,
}

impl RegistrationStatus {
    pub const fn code(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "PENDING",
            RegistrationStatus::Approved => "APPROVED",
            RegistrationStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "PENDING" => Some(RegistrationStatus::Pending),
            "APPROVED" => Some(RegistrationStatus::Approved),
            "REJECTED" => Some(RegistrationStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub registration_id: RegistrationId,
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub profile_type: ProfileType,
    pub status: RegistrationStatus,
    /// Signup metadata kept for the reviewing admin
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Registration {
    /// New registration awaiting admin approval
    pub fn pending(
        user_id: UserId,
        organization_id: OrganizationId,
        profile_type: ProfileType,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            registration_id: RegistrationId::new(),
            user_id,
            organization_id,
            profile_type,
            status: RegistrationStatus::Pending,
            metadata,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_registration() {
        let org = Organization::new("Acme Clinic", ProfileType::Facility);
        let reg = Registration::pending(
            UserId::new(),
            org.organization_id,
            ProfileType::Facility,
            serde_json::json!({}),
        );
        assert_eq!(reg.status, RegistrationStatus::Pending);
        assert_eq!(reg.status.to_string(), "PENDING");
        assert_eq!(RegistrationStatus::from_code("PENDING"), Some(reg.status));
    }
}
