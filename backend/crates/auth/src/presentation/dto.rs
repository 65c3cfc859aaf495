//! API DTOs (Data Transfer Objects)
//!
//! Request fields default to empty so that a missing field surfaces as a
//! field-level validation error rather than a body parse failure.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::application::services::SessionOutput;
use crate::domain::entity::user::User;
use crate::domain::value_object::profile_type::ProfileType;

fn default_true() -> bool {
    true
}

fn accepted(value: &bool) -> Result<(), ValidationError> {
    if *value {
        Ok(())
    } else {
        Err(ValidationError::new("terms").with_message("Terms must be accepted".into()))
    }
}

// ============================================================================
// Sign Up
// ============================================================================

/// Sign up request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SignUpRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
    #[validate(required(message = "Profile type is required"))]
    pub profile_type: Option<ProfileType>,
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(max = 200, message = "Organization name is too long"))]
    pub organization: Option<String>,
    #[validate(custom(function = "accepted"))]
    pub terms_accepted: bool,
    pub metadata: Option<serde_json::Value>,
    pub fingerprint: Option<String>,
}

// ============================================================================
// Login
// ============================================================================

/// Login request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[serde(default = "default_true")]
    pub remember_me: bool,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

// ============================================================================
// Refresh / Logout
// ============================================================================

/// Refresh and logout request; the token falls back to the cookie
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
    pub fingerprint: Option<String>,
}

// ============================================================================
// Password Reset
// ============================================================================

/// Forgot password request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ForgotPasswordRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
}

/// Reset password request
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub profile_type: ProfileType,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub is_active: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.user_id.to_string(),
            email: user.email.original().to_string(),
            profile_type: user.profile_type,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            organization_id: user.organization_id.map(|id| id.to_string()),
            is_active: user.is_active,
        }
    }
}

/// Signup, login, and refresh response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

impl From<&SessionOutput> for AuthResponse {
    fn from(output: &SessionOutput) -> Self {
        Self {
            access_token: output.access_token.clone(),
            refresh_token: output.refresh_token.clone(),
            expires_in: output.expires_in,
            user: UserResponse::from(&output.user),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordResponse {
    pub success: bool,
    pub expires_in_minutes: i64,
}

/// Claims of the caller's access token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user_id: String,
    pub email: String,
    pub role: ProfileType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer_id: Option<String>,
    pub permissions: Vec<String>,
    pub expires_at: i64,
}
