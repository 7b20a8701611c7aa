use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration;
use std::sync::Arc;

use crate::{
    config::Config,
    entities::enums::Role,
    error::ServiceError,
    handler::error::{ApiError, ApiResult},
    service::scope::Caller,
    state::AppState,
};

pub const SESSION_COOKIE: &str = "sid";

/// Caller resolved from `Authorization: Bearer <sid>` or the `sid` cookie.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub session_id: String,
    pub caller: Caller,
}

impl CurrentUser {
    /// The caller, when its role is one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> ApiResult<Caller> {
        if roles.contains(&self.caller.role) {
            Ok(self.caller)
        } else {
            Err(ServiceError::Forbidden.into())
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session_id = session_token(&parts.headers).ok_or(ServiceError::Unauthorized)?;
        let session = state
            .sessions()
            .get(&session_id)
            .await
            .map_err(ServiceError::from)?
            .ok_or(ServiceError::Unauthorized)?;
        Ok(Self {
            session_id,
            caller: Caller {
                account_id: session.account_id,
                role: session.role,
            },
        })
    }
}

fn base_cookie(config: &Config, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::Lax);
    if config.cookie_secure {
        cookie.set_secure(true);
    }
    if let Some(domain) = &config.cookie_domain {
        cookie.set_domain(domain.to_string());
    }
    cookie
}

pub fn session_cookie(config: &Config, session_id: String) -> Cookie<'static> {
    let mut cookie = base_cookie(config, session_id);
    cookie.set_max_age(Duration::seconds(config.session_ttl_seconds as i64));
    cookie
}

pub fn cleared_cookie(config: &Config) -> Cookie<'static> {
    let mut cookie = base_cookie(config, String::new());
    cookie.set_max_age(Duration::seconds(0));
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        headers.insert("cookie", HeaderValue::from_static("sid=fromcookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));

        headers.remove(AUTHORIZATION);
        assert_eq!(session_token(&headers).as_deref(), Some("fromcookie"));
    }

    #[test]
    fn malformed_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(session_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn cookies_follow_configuration() {
        let config = Config {
            cookie_secure: true,
            cookie_domain: Some("example.org".to_string()),
            ..Config::default()
        };
        let cookie = session_cookie(&config, "abc".to_string());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.domain(), Some("example.org"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(60 * 60 * 24 * 7)));
        assert_eq!(cleared_cookie(&config).max_age(), Some(Duration::ZERO));
    }
}
