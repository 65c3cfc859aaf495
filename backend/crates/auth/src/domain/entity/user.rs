//! User Entity
//!
//! Portal account identity. Password material lives in [`Credential`].
//!
//! [`Credential`]: super::credential::Credential

use chrono::{DateTime, Utc};

use crate::domain::value_object::{
    email::Email,
    ids::{OrganizationId, UserId},
    profile_type::ProfileType,
};

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    pub email: Email,
    pub profile_type: ProfileType,
    /// Inactive accounts cannot log in, refresh, or reset their password
    pub is_active: bool,
    pub organization_id: Option<OrganizationId>,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: Email,
        profile_type: ProfileType,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        organization_id: Option<OrganizationId>,
    ) -> Self {
        let now = Utc::now();

        Self {
            user_id: UserId::new(),
            email,
            profile_type,
            is_active: true,
            organization_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Organization id exposed as the facility claim
    pub fn facility_id(&self) -> Option<OrganizationId> {
        match self.profile_type {
            ProfileType::Facility => self.organization_id,
            _ => None,
        }
    }

    /// Organization id exposed as the manufacturer claim
    pub fn manufacturer_id(&self) -> Option<OrganizationId> {
        match self.profile_type {
            ProfileType::Manufacturer => self.organization_id,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_active() {
        let user = User::new(
            Email::new("a@x.com").unwrap(),
            ProfileType::Admin,
            "Ada",
            "Lovelace",
            None,
        );
        assert!(user.is_active);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_organization_claims_follow_profile() {
        let org = OrganizationId::new();
        let facility = User::new(
            Email::new("f@x.com").unwrap(),
            ProfileType::Facility,
            "F",
            "F",
            Some(org),
        );
        assert_eq!(facility.facility_id(), Some(org));
        assert_eq!(facility.manufacturer_id(), None);
    }
}
