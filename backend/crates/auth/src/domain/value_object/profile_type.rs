//! Profile Type Value Object
//!
//! Classifies a portal account. Also serves as the role claim in tokens.

use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileType {
    #[display("admin")]
    Admin,
    #[display("facility")]
    Facility,
    #[display("manufacturer")]
    Manufacturer,
}

impl ProfileType {
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            ProfileType::Admin => "admin",
            ProfileType::Facility => "facility",
            ProfileType::Manufacturer => "manufacturer",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "admin" => Some(ProfileType::Admin),
            "facility" => Some(ProfileType::Facility),
            "manufacturer" => Some(ProfileType::Manufacturer),
            _ => None,
        }
    }

    /// Facility and manufacturer accounts belong to an organization
    #[inline]
    pub const fn requires_organization(&self) -> bool {
        !matches!(self, ProfileType::Admin)
    }

    /// Flat permission list carried in access tokens
    pub const fn permissions(&self) -> &'static [&'static str] {
        match self {
            ProfileType::Admin => &[
                "users:read",
                "users:write",
                "registrations:review",
                "complaints:read",
                "recalls:read",
                "visits:read",
            ],
            ProfileType::Facility => &[
                "complaints:read",
                "complaints:write",
                "recalls:read",
                "visits:read",
            ],
            ProfileType::Manufacturer => &[
                "complaints:read",
                "recalls:read",
                "recalls:write",
                "visits:read",
                "visits:write",
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for profile in [
            ProfileType::Admin,
            ProfileType::Facility,
            ProfileType::Manufacturer,
        ] {
            assert_eq!(ProfileType::from_code(profile.code()), Some(profile));
            assert_eq!(profile.to_string(), profile.code());
        }
        assert_eq!(ProfileType::from_code("root"), None);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&ProfileType::Manufacturer).unwrap();
        assert_eq!(json, "\"manufacturer\"");
        let parsed: ProfileType = serde_json::from_str("\"facility\"").unwrap();
        assert_eq!(parsed, ProfileType::Facility);
    }

    #[test]
    fn test_requires_organization() {
        assert!(!ProfileType::Admin.requires_organization());
        assert!(ProfileType::Facility.requires_organization());
        assert!(ProfileType::Manufacturer.requires_organization());
    }
}
