//! Auth Router

use std::sync::Arc;

use axum::{
    BoxError, Extension, Router,
    error_handling::HandleErrorLayer,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use platform::rate_limit::RateLimitStore;
use tower::{ServiceBuilder, timeout::TimeoutLayer, timeout::error::Elapsed};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::application::AuthServices;
use crate::domain::repository::AuthStore;
use crate::error::AuthError;
use crate::presentation::context::{ApiError, RequestContext, TrustedProxies};
use crate::presentation::handlers;
use crate::presentation::middleware::{AccessGate, require_access_token};

/// Create the Auth router for any store implementation
///
/// Every response carries an `x-request-id` header, generated when the
/// client did not send one. Requests exceeding `request_timeout` get a 408
/// in the usual error envelope.
pub fn auth_router<S, L>(services: Arc<AuthServices<S, L>>) -> Router
where
    S: AuthStore + Sync + 'static,
    L: RateLimitStore + Sync + 'static,
{
    let gate = AccessGate {
        tokens: services.tokens.clone(),
        access_cookie_name: services.config.access_cookie_name.clone(),
    };
    let timeout = services.config.request_timeout;
    let trusted = TrustedProxies(services.config.trusted_proxies.as_slice().into());

    Router::new()
        .route("/signup", post(handlers::sign_up::<S, L>))
        .route("/login", post(handlers::login::<S, L>))
        .route("/refresh", post(handlers::refresh::<S, L>))
        .route("/logout", post(handlers::logout::<S, L>))
        .route("/forgot", post(handlers::forgot_password::<S, L>))
        .route("/reset", post(handlers::reset_password::<S, L>))
        .route(
            "/session",
            get(handlers::session).route_layer(from_fn_with_state(gate, require_access_token)),
        )
        .with_state(services)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(Extension(trusted))
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(timeout)),
        )
}

async fn handle_middleware_error(ctx: RequestContext, err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        ctx.fail(AuthError::Timeout)
    } else {
        ctx.fail(AuthError::Internal(err.to_string()))
    }
}
