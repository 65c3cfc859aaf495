//! Auth Middleware
//!
//! Guards routes that require a valid access token.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;

use crate::application::token_service::TokenService;
use crate::error::AuthError;
use crate::presentation::context::{ApiError, RequestContext};

/// Middleware state
#[derive(Clone)]
pub struct AccessGate {
    pub tokens: TokenService,
    pub access_cookie_name: String,
}

/// Require a valid access token from `Authorization: Bearer` or the cookie
///
/// The verified [`crate::application::TokenClaims`] are placed in the
/// request extensions. Refresh tokens are rejected.
pub async fn require_access_token(
    State(gate): State<AccessGate>,
    ctx: RequestContext,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    let token = bearer
        .or_else(|| ctx.cookie(&gate.access_cookie_name))
        .ok_or_else(|| ctx.fail(AuthError::InvalidToken))?;

    let claims = gate
        .tokens
        .verify_access(&token)
        .map_err(|e| ctx.fail(e))?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
