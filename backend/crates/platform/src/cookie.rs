//! Cookie Management Infrastructure
//!
//! Builders for the `Set-Cookie` values issued by the HTTP layer.

use axum_extra::extract::cookie::{Cookie, SameSite as CookieSameSite};

/// SameSite policy for cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }

    fn to_cookie(self) -> CookieSameSite {
        match self {
            SameSite::Strict => CookieSameSite::Strict,
            SameSite::Lax => CookieSameSite::Lax,
            SameSite::None => CookieSameSite::None,
        }
    }
}

/// Attributes shared by every cookie the application issues
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            secure: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
        }
    }
}

impl CookiePolicy {
    /// Build a cookie carrying `value` for `max_age_secs` seconds
    ///
    /// A max-age of zero yields a cookie the browser discards immediately.
    pub fn build(
        &self,
        name: &str,
        value: &str,
        max_age_secs: i64,
        http_only: bool,
    ) -> Cookie<'static> {
        Cookie::build((name.to_string(), value.to_string()))
            .path(self.path.clone())
            .http_only(http_only)
            .secure(self.secure)
            .same_site(self.same_site.to_cookie())
            .max_age(time::Duration::seconds(max_age_secs.max(0)))
            .build()
    }

    /// Build an expired cookie that clears `name` on the client
    pub fn clear(&self, name: &str) -> Cookie<'static> {
        self.build(name, "", 0, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(secure: bool) -> CookiePolicy {
        CookiePolicy {
            secure,
            ..CookiePolicy::default()
        }
    }

    #[test]
    fn test_build_http_only_cookie() {
        let cookie = policy(true).build("access_token", "abc", 900, true);
        let rendered = cookie.to_string();

        assert!(rendered.starts_with("access_token=abc"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("SameSite=Lax"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=900"));
    }

    #[test]
    fn test_build_readable_cookie_without_secure() {
        let rendered = policy(false).build("device_fp", "fp-1", 60, false).to_string();
        assert!(!rendered.contains("HttpOnly"));
        assert!(!rendered.contains("Secure"));
    }

    #[test]
    fn test_clear_cookie() {
        let rendered = policy(true).clear("refresh_token").to_string();
        assert!(rendered.starts_with("refresh_token="));
        assert!(rendered.contains("Max-Age=0"));
    }

    #[test]
    fn test_negative_max_age_is_clamped() {
        let rendered = policy(true).build("a", "b", -5, true).to_string();
        assert!(rendered.contains("Max-Age=0"));
    }
}
