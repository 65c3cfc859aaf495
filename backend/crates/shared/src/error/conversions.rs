//! Error conversions - HTTP rendering for [`AppError`]
//!
//! Renders the JSON error envelope and any extra headers attached to the error.

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for super::app_error::AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::{HeaderName, HeaderValue, StatusCode};

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = (status, Json(self.envelope())).into_response();
        let headers = response.headers_mut();
        for (name, value) in self.headers() {
            // Invalid header values are dropped rather than failing the error response
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }
        response
    }
}

#[cfg(all(test, feature = "axum"))]
mod tests {
    use super::super::app_error::AppError;
    use axum::response::IntoResponse;

    #[test]
    fn test_into_response_status_and_headers() {
        let response = AppError::too_many_requests("Too many requests")
            .with_code("RATE_LIMIT_EXCEEDED")
            .with_header("retry-after", "42")
            .into_response();

        assert_eq!(response.status().as_u16(), 429);
        assert_eq!(response.headers()["retry-after"], "42");
    }
}
