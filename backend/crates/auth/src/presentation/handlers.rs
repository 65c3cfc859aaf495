//! HTTP Handlers

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use platform::cookie::CookiePolicy;
use platform::crypto::random_token;
use platform::rate_limit::RateLimitStore;
use validator::Validate;

use crate::application::config::AuthConfig;
use crate::application::token_service::TokenClaims;
use crate::application::{
    AuthServices, ForgotPasswordUseCase, RefreshInput, RefreshUseCase, ResetPasswordInput,
    ResetPasswordUseCase, SessionOutput, SignInInput, SignInUseCase, SignOutUseCase, SignUpInput,
    SignUpUseCase,
};
use crate::domain::repository::AuthStore;
use crate::error::AuthError;
use crate::presentation::context::{ApiError, RequestContext};
use crate::presentation::dto::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, RefreshRequest, ResetPasswordRequest,
    ResetPasswordResponse, SessionResponse, SignUpRequest, SuccessResponse,
};

/// Random bytes in a server-assigned device fingerprint
const FINGERPRINT_BYTES: usize = 16;

type Services<S, L> = State<Arc<AuthServices<S, L>>>;

fn malformed(rejection: JsonRejection) -> AuthError {
    AuthError::MalformedBody(rejection.body_text())
}

// ============================================================================
// Sign Up
// ============================================================================

/// POST /auth/signup
pub async fn sign_up<S, L>(
    State(services): Services<S, L>,
    ctx: RequestContext,
    body: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<Response, ApiError>
where
    S: AuthStore + Sync + 'static,
    L: RateLimitStore + Sync + 'static,
{
    let Json(req) = body.map_err(|e| ctx.fail(malformed(e)))?;
    req.validate().map_err(|e| ctx.fail(e))?;

    let profile_type = req
        .profile_type
        .ok_or_else(|| ctx.fail(AuthError::field("profileType", "Profile type is required")))?;
    let fingerprint = resolve_fingerprint(&ctx, &services.config, req.fingerprint);

    let input = SignUpInput {
        email: req.email,
        password: req.password,
        profile_type,
        first_name: req.first_name,
        last_name: req.last_name,
        organization: req.organization,
        metadata: req.metadata.unwrap_or_else(|| serde_json::json!({})),
        fingerprint: Some(fingerprint.clone()),
    };

    let output = SignUpUseCase::new(services.clone())
        .execute(input, &ctx.client)
        .await
        .map_err(|e| ctx.fail(e))?;

    Ok(session_response(
        StatusCode::CREATED,
        ctx.cookies,
        &services.config,
        &output,
        Some(&fingerprint),
    ))
}

// ============================================================================
// Login
// ============================================================================

/// POST /auth/login
pub async fn login<S, L>(
    State(services): Services<S, L>,
    ctx: RequestContext,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError>
where
    S: AuthStore + Sync + 'static,
    L: RateLimitStore + Sync + 'static,
{
    let Json(req) = body.map_err(|e| ctx.fail(malformed(e)))?;
    req.validate().map_err(|e| ctx.fail(e))?;

    let fingerprint = resolve_fingerprint(&ctx, &services.config, req.fingerprint);

    let input = SignInInput {
        email: req.email,
        password: req.password,
        remember_me: req.remember_me,
        fingerprint: Some(fingerprint.clone()),
    };

    let output = SignInUseCase::new(services.clone())
        .execute(input, &ctx.client)
        .await
        .map_err(|e| ctx.fail(e))?;

    Ok(session_response(
        StatusCode::OK,
        ctx.cookies,
        &services.config,
        &output,
        Some(&fingerprint),
    ))
}

// ============================================================================
// Refresh
// ============================================================================

/// POST /auth/refresh
pub async fn refresh<S, L>(
    State(services): Services<S, L>,
    ctx: RequestContext,
    body: Result<Option<Json<RefreshRequest>>, JsonRejection>,
) -> Result<Response, ApiError>
where
    S: AuthStore + Sync + 'static,
    L: RateLimitStore + Sync + 'static,
{
    let req = body
        .map_err(|e| ctx.fail(malformed(e)))?
        .map(|Json(req)| req)
        .unwrap_or_default();

    let refresh_token = presented_refresh_token(&ctx, &services.config, req.refresh_token)
        .ok_or_else(|| ctx.fail(AuthError::InvalidToken))?;
    let fingerprint = req
        .fingerprint
        .or_else(|| ctx.cookie(&services.config.fingerprint_cookie_name));

    let input = RefreshInput {
        refresh_token,
        fingerprint: fingerprint.clone(),
    };

    let output = RefreshUseCase::new(services.clone())
        .execute(input, &ctx.client)
        .await
        .map_err(|e| ctx.fail(e))?;

    Ok(session_response(
        StatusCode::OK,
        ctx.cookies,
        &services.config,
        &output,
        fingerprint.as_deref(),
    ))
}

// ============================================================================
// Logout
// ============================================================================

/// POST /auth/logout
pub async fn logout<S, L>(
    State(services): Services<S, L>,
    ctx: RequestContext,
    body: Result<Option<Json<RefreshRequest>>, JsonRejection>,
) -> Result<Response, ApiError>
where
    S: AuthStore + Sync + 'static,
    L: RateLimitStore + Sync + 'static,
{
    let req = body
        .map_err(|e| ctx.fail(malformed(e)))?
        .map(|Json(req)| req)
        .unwrap_or_default();

    let refresh_token = presented_refresh_token(&ctx, &services.config, req.refresh_token)
        .ok_or_else(|| {
            ctx.fail(AuthError::field("refreshToken", "Refresh token is required"))
        })?;

    SignOutUseCase::new(services.clone())
        .execute(&refresh_token, &ctx.client)
        .await
        .map_err(|e| ctx.fail(e))?;

    let policy = cookie_policy(&services.config);
    let jar = ctx
        .cookies
        .add(policy.clear(&services.config.access_cookie_name))
        .add(policy.clear(&services.config.refresh_cookie_name));

    Ok((StatusCode::OK, jar, Json(SuccessResponse { success: true })).into_response())
}

// ============================================================================
// Password Reset
// ============================================================================

/// POST /auth/forgot
pub async fn forgot_password<S, L>(
    State(services): Services<S, L>,
    ctx: RequestContext,
    body: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Response, ApiError>
where
    S: AuthStore + Sync + 'static,
    L: RateLimitStore + Sync + 'static,
{
    let Json(req) = body.map_err(|e| ctx.fail(malformed(e)))?;
    req.validate().map_err(|e| ctx.fail(e))?;

    ForgotPasswordUseCase::new(services.clone())
        .execute(&req.email, &ctx.client)
        .await
        .map_err(|e| ctx.fail(e))?;

    Ok((StatusCode::OK, Json(SuccessResponse { success: true })).into_response())
}

/// POST /auth/reset
pub async fn reset_password<S, L>(
    State(services): Services<S, L>,
    ctx: RequestContext,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Response, ApiError>
where
    S: AuthStore + Sync + 'static,
    L: RateLimitStore + Sync + 'static,
{
    let Json(req) = body.map_err(|e| ctx.fail(malformed(e)))?;
    req.validate().map_err(|e| ctx.fail(e))?;

    let input = ResetPasswordInput {
        token: req.token,
        password: req.password,
    };

    let output = ResetPasswordUseCase::new(services.clone())
        .execute(input, &ctx.client)
        .await
        .map_err(|e| ctx.fail(e))?;

    Ok((
        StatusCode::OK,
        Json(ResetPasswordResponse {
            success: true,
            expires_in_minutes: output.expires_in_minutes,
        }),
    )
        .into_response())
}

// ============================================================================
// Session
// ============================================================================

/// GET /auth/session (behind `require_access_token`)
pub async fn session(Extension(claims): Extension<TokenClaims>) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: true,
        user_id: claims.sub.to_string(),
        email: claims.email,
        role: claims.role,
        facility_id: claims.facility_id.map(|id| id.to_string()),
        manufacturer_id: claims.manufacturer_id.map(|id| id.to_string()),
        permissions: claims.permissions,
        expires_at: claims.exp,
    })
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn cookie_policy(config: &AuthConfig) -> CookiePolicy {
    CookiePolicy {
        secure: config.cookie_secure,
        same_site: config.cookie_same_site,
        path: "/".to_string(),
    }
}

/// Body value first, then the device cookie, then a fresh one
fn resolve_fingerprint(ctx: &RequestContext, config: &AuthConfig, body: Option<String>) -> String {
    body.filter(|fp| !fp.is_empty())
        .or_else(|| ctx.cookie(&config.fingerprint_cookie_name))
        .unwrap_or_else(|| random_token(FINGERPRINT_BYTES))
}

fn presented_refresh_token(
    ctx: &RequestContext,
    config: &AuthConfig,
    body: Option<String>,
) -> Option<String> {
    body.filter(|t| !t.is_empty())
        .or_else(|| ctx.cookie(&config.refresh_cookie_name))
}

/// Token pair body plus the access, refresh, and device cookies
fn session_response(
    status: StatusCode,
    jar: CookieJar,
    config: &AuthConfig,
    output: &SessionOutput,
    fingerprint: Option<&str>,
) -> Response {
    let policy = cookie_policy(config);

    // Without remember-me the refresh cookie is written with Max-Age=0, so
    // the browser drops it at once and the client must keep the token from
    // the body. The row itself keeps its full lifetime.
    let refresh_max_age = if output.remember_me {
        config.refresh_token_ttl_secs()
    } else {
        0
    };

    let mut jar = jar
        .add(policy.build(
            &config.access_cookie_name,
            &output.access_token,
            config.access_token_ttl_secs(),
            true,
        ))
        .add(policy.build(
            &config.refresh_cookie_name,
            &output.refresh_token,
            refresh_max_age,
            true,
        ));

    if let Some(fingerprint) = fingerprint {
        jar = jar.add(policy.build(
            &config.fingerprint_cookie_name,
            fingerprint,
            config.refresh_token_ttl_secs(),
            false,
        ));
    }

    (status, jar, Json(AuthResponse::from(output))).into_response()
}
