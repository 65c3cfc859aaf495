//! Typed identifiers for auth entities

use kernel::id::Id;

pub struct UserMarker;
pub type UserId = Id<UserMarker>;

pub struct OrganizationMarker;
pub type OrganizationId = Id<OrganizationMarker>;

pub struct RegistrationMarker;
pub type RegistrationId = Id<RegistrationMarker>;

/// Session row id; also the `jti` of the refresh token minted for it
pub struct RefreshTokenMarker;
pub type RefreshTokenId = Id<RefreshTokenMarker>;

pub struct VerificationTokenMarker;
pub type VerificationTokenId = Id<VerificationTokenMarker>;

pub struct AuditLogMarker;
pub type AuditLogId = Id<AuditLogMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_new() {
        let user_id = UserId::new();
        assert_eq!(user_id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = uuid::Uuid::new_v4();
        let session_id = RefreshTokenId::from_uuid(uuid);
        assert_eq!(session_id.as_uuid(), &uuid);
    }
}
