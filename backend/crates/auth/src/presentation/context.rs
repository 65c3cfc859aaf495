//! Request Context
//!
//! Per-request details every handler needs: the request id stamped by the
//! request-id layer, the client origin, and the cookie jar.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use platform::client::ClientInfo;

use crate::error::AuthError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Proxy addresses allowed to report the client via `X-Forwarded-For`
///
/// Installed as a request extension by the router.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(pub Arc<[IpAddr]>);

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Option<String>,
    pub client: ClientInfo,
    pub cookies: CookieJar,
}

impl RequestContext {
    /// Attach the request id to a failure
    pub fn fail(&self, error: impl Into<AuthError>) -> ApiError {
        ApiError {
            error: error.into(),
            request_id: self.request_id.clone(),
        }
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies
            .get(name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let direct_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());

        let trusted = parts
            .extensions
            .get::<TrustedProxies>()
            .map(|proxies| proxies.0.clone())
            .unwrap_or_default();

        Ok(Self {
            request_id,
            client: ClientInfo::from_headers(&parts.headers, direct_ip, &trusted),
            cookies: CookieJar::from_headers(&parts.headers),
        })
    }
}

/// Auth failure rendered as the JSON error envelope
#[derive(Debug)]
pub struct ApiError {
    pub error: AuthError,
    pub request_id: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.error.log();

        let mut app_error = self.error.to_app_error();
        if let Some(request_id) = self.request_id {
            app_error = app_error.with_request_id(request_id);
        }
        app_error.into_response()
    }
}
