//! Sign Up Use Case
//!
//! Registers a portal account and opens its first session. Facility and
//! manufacturer accounts either join an existing organization or create a
//! new one together with a PENDING registration for admin review.

use std::sync::Arc;

use platform::client::ClientInfo;
use platform::rate_limit::RateLimitStore;
use uuid::Uuid;

use crate::application::audit::audit_entry;
use crate::application::rate_limit::{RateLimitSection, email_identifier};
use crate::application::services::{AuthServices, SessionOutput, session_device};
use crate::domain::entity::{
    audit_log::AuditEvent,
    organization::{Organization, Registration},
    user::User,
};
use crate::domain::repository::{
    AuthStore, AuthTransaction, FindOrganizationById, FindUserByNormalizedEmail,
};
use crate::domain::value_object::{
    email::Email, ids::OrganizationId, profile_type::ProfileType, user_password::RawPassword,
};
use crate::error::{AuthError, AuthResult};

/// Metadata key naming an existing organization to join
const ORGANIZATION_ID_KEY: &str = "organizationId";
const ORGANIZATION_ID_FIELD: &str = "metadata.organizationId";

/// Sign up input
#[derive(Debug, Clone)]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub profile_type: ProfileType,
    pub first_name: String,
    pub last_name: String,
    /// New organization name; required unless metadata names an existing one
    pub organization: Option<String>,
    pub metadata: serde_json::Value,
    pub fingerprint: Option<String>,
}

/// How the new account is attached to an organization
#[derive(Debug)]
enum OrganizationPlan {
    None,
    Join(OrganizationId),
    Create(String),
}

impl OrganizationPlan {
    fn from_input(input: &SignUpInput) -> AuthResult<Self> {
        if !input.profile_type.requires_organization() {
            return Ok(OrganizationPlan::None);
        }

        if let Some(raw) = input.metadata.get(ORGANIZATION_ID_KEY) {
            let id = raw
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or_else(|| {
                    AuthError::field(ORGANIZATION_ID_FIELD, "Organization id is not a valid UUID")
                })?;
            return Ok(OrganizationPlan::Join(OrganizationId::from_uuid(id)));
        }

        match input.organization.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(OrganizationPlan::Create(name.to_string())),
            _ => Err(AuthError::field(
                "organization",
                "Organization name is required for this profile type",
            )),
        }
    }
}

/// Sign up use case
pub struct SignUpUseCase<S, L> {
    services: Arc<AuthServices<S, L>>,
}

impl<S, L> SignUpUseCase<S, L>
where
    S: AuthStore + Sync,
    L: RateLimitStore + Sync,
{
    pub fn new(services: Arc<AuthServices<S, L>>) -> Self {
        Self { services }
    }

    pub async fn execute(
        &self,
        input: SignUpInput,
        client: &ClientInfo,
    ) -> AuthResult<SessionOutput> {
        let s = &self.services;

        let email = Email::new(&input.email)?;
        let password = RawPassword::for_field(input.password.clone(), "password")?;
        let plan = OrganizationPlan::from_input(&input)?;

        s.rate_limiter
            .check(
                RateLimitSection::Signup,
                &email_identifier(email.normalized(), client),
            )
            .await?;

        // Cheap pre-check; the unique key on insert settles any race
        let existing = s
            .store
            .find_user_with_credential(FindUserByNormalizedEmail {
                normalized_email: email.normalized().to_string(),
            })
            .await?;
        if existing.is_some() {
            return Err(AuthError::EmailExists);
        }

        let password_hash = s.credentials.hash(password).await?;

        let mut tx = s.store.begin().await?;

        let (organization_id, new_organization) = match plan {
            OrganizationPlan::None => (None, None),
            OrganizationPlan::Join(id) => {
                let organization = tx
                    .find_organization(FindOrganizationById {
                        organization_id: id,
                    })
                    .await?
                    .filter(|org| org.profile_type == input.profile_type)
                    .ok_or_else(|| {
                        AuthError::field(ORGANIZATION_ID_FIELD, "Organization not found")
                    })?;
                (Some(organization.organization_id), None)
            }
            OrganizationPlan::Create(name) => {
                let organization = Organization::new(name, input.profile_type);
                tx.insert_organization(&organization).await?;
                (Some(organization.organization_id), Some(organization))
            }
        };

        let user = User::new(
            email,
            input.profile_type,
            input.first_name.trim(),
            input.last_name.trim(),
            organization_id,
        );
        tx.insert_user(&user).await?;

        let registration = match &new_organization {
            Some(organization) => {
                let registration = Registration::pending(
                    user.user_id,
                    organization.organization_id,
                    input.profile_type,
                    input.metadata.clone(),
                );
                tx.insert_registration(&registration).await?;
                Some(registration)
            }
            None => None,
        };

        s.credentials
            .store(&mut tx, user.user_id, password_hash)
            .await?;

        let device = session_device(client, input.fingerprint);
        let issued = s.sessions.create(&mut tx, &user, &device, true).await?;

        let entry = s
            .audit
            .append(
                &mut tx,
                audit_entry(AuditEvent::Signup, Some(user.user_id), "User signed up", client)
                    .with_metadata(serde_json::json!({
                        "profileType": user.profile_type.code(),
                        "organizationId": organization_id.map(|id| id.to_string()),
                        "registrationId": registration.as_ref().map(|r| r.registration_id.to_string()),
                    })),
            )
            .await?;

        s.audit.commit(tx, &[entry]).await?;

        tracing::info!(
            user_id = %user.user_id,
            profile_type = %user.profile_type,
            pending_registration = registration.is_some(),
            "User signed up"
        );

        Ok(SessionOutput::new(issued, user, &s.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(profile_type: ProfileType) -> SignUpInput {
        SignUpInput {
            email: "a@x.com".to_string(),
            password: "Passw0rd1".to_string(),
            profile_type,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            organization: None,
            metadata: serde_json::json!({}),
            fingerprint: None,
        }
    }

    #[test]
    fn test_admin_has_no_organization() {
        assert!(matches!(
            OrganizationPlan::from_input(&input(ProfileType::Admin)),
            Ok(OrganizationPlan::None)
        ));
    }

    #[test]
    fn test_facility_requires_organization_name() {
        let err = OrganizationPlan::from_input(&input(ProfileType::Facility)).unwrap_err();
        match err {
            AuthError::Validation(details) => assert!(details.contains_key("organization")),
            other => panic!("unexpected: {other:?}"),
        }

        let mut named = input(ProfileType::Facility);
        named.organization = Some("  Acme Clinic ".to_string());
        match OrganizationPlan::from_input(&named).unwrap() {
            OrganizationPlan::Create(name) => assert_eq!(name, "Acme Clinic"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_metadata_organization_id() {
        let mut joining = input(ProfileType::Manufacturer);
        let id = Uuid::new_v4();
        joining.metadata = serde_json::json!({ "organizationId": id.to_string() });
        match OrganizationPlan::from_input(&joining).unwrap() {
            OrganizationPlan::Join(org) => assert_eq!(org.into_uuid(), id),
            other => panic!("unexpected: {other:?}"),
        }

        joining.metadata = serde_json::json!({ "organizationId": "nope" });
        assert!(matches!(
            OrganizationPlan::from_input(&joining),
            Err(AuthError::Validation(_))
        ));
    }
}
