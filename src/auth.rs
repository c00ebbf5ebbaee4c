use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{config::AppConfig, i18n::Locale};

/// Credential
///
/// The ambient credential of a request: the backend's session cookie. The full
/// `Cookie` header is kept so it can be forwarded verbatim to the backend; the
/// session cookie's value alone keys the session cache. Callers without one
/// are never cached.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credential {
    session_id: Option<String>,
    cookie_header: Option<String>,
}

impl Credential {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_cookie_header(header: Option<&str>, cookie_name: &str) -> Self {
        let session_id = header.and_then(|h| find_cookie(h, cookie_name));
        Self {
            session_id,
            cookie_header: header.map(str::to_string),
        }
    }

    /// Convenience for callers that only know the session id.
    pub fn session(cookie_name: &str, session_id: &str) -> Self {
        Self::from_cookie_header(Some(&format!("{cookie_name}={session_id}")), cookie_name)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn cookie_header(&self) -> Option<&str> {
        self.cookie_header.as_deref()
    }

    /// The credential the caller will hold once the backend's `Set-Cookie`
    /// headers are applied. Only name/value pairs are considered.
    pub fn with_set_cookies(&self, set_cookies: &[String], cookie_name: &str) -> Credential {
        let mut pairs: Vec<(String, String)> = self
            .cookie_header
            .as_deref()
            .map(parse_pairs)
            .unwrap_or_default();

        for set_cookie in set_cookies {
            let Some((name, value)) = set_cookie
                .split(';')
                .next()
                .and_then(|pair| pair.split_once('='))
            else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            pairs.retain(|(n, _)| n != name);
            pairs.push((name.to_string(), value.to_string()));
        }

        if pairs.is_empty() {
            return Credential::anonymous();
        }
        let header = pairs
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        Credential::from_cookie_header(Some(&header), cookie_name)
    }
}

fn parse_pairs(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .filter(|(n, _)| !n.is_empty())
        .collect()
}

fn find_cookie(header: &str, name: &str) -> Option<String> {
    parse_pairs(header)
        .into_iter()
        .find(|(n, v)| n == name && !v.is_empty())
        .map(|(_, v)| v)
}

impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let header = parts
            .headers
            .get(header::COOKIE)
            .and_then(|value| value.to_str().ok());
        Ok(Credential::from_cookie_header(header, &config.session_cookie))
    }
}

/// RequestLocale
///
/// Locale negotiated from `Accept-Language`, falling back to the configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLocale(pub Locale);

impl<S> FromRequestParts<S> for RequestLocale
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let locale = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok())
            .and_then(Locale::from_accept_language)
            .unwrap_or(config.default_locale);
        Ok(RequestLocale(locale))
    }
}
