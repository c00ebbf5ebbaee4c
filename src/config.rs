use std::{env, path::PathBuf, time::Duration};

use crate::i18n::Locale;

/// AppConfig
///
/// Immutable configuration loaded once at startup and shared through the
/// application state.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Selects log format and how strict loading is.
    pub env: Env,
    // Base URL of the session backend, e.g. `https://backend.example.com/obj`.
    pub backend_url: String,
    // Address the HTTP server binds to.
    pub bind_addr: String,
    // Name of the backend's session cookie; its value keys the session cache.
    pub session_cookie: String,
    // How long a session checked for a path is reused for that same path.
    pub session_ttl: Duration,
    // Timeout for every backend call.
    pub backend_timeout: Duration,
    // Built SPA (index.html + assets/). Without it a minimal shell is served.
    pub static_dir: Option<PathBuf>,
    pub default_locale: Locale,
}

/// Env
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/obj";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SESSION_COOKIE: &str = "PHPSESSID";
const DEFAULT_SESSION_TTL_SECS: u64 = 30;
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 10;

impl Default for AppConfig {
    /// Local settings that need no environment; used by tests.
    fn default() -> Self {
        Self {
            env: Env::Local,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            backend_timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
            static_dir: None,
            default_locale: Locale::EnGb,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment.
    ///
    /// # Panics
    /// Panics when `SESSION_BACKEND_URL` is missing in production, or when a
    /// numeric or locale variable is set to something unparseable. A gate that
    /// starts with a wrong backend would sign everybody out.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let backend_url = match env {
            Env::Production => env::var("SESSION_BACKEND_URL")
                .expect("FATAL: SESSION_BACKEND_URL must be set in production."),
            Env::Local => env::var("SESSION_BACKEND_URL")
                .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
        };

        let default_locale = match env::var("DEFAULT_LOCALE") {
            Ok(tag) => Locale::parse(&tag)
                .unwrap_or_else(|| panic!("FATAL: unsupported DEFAULT_LOCALE {tag:?}")),
            Err(_) => Locale::EnGb,
        };

        Self {
            env,
            backend_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            session_cookie: env::var("SESSION_COOKIE")
                .unwrap_or_else(|_| DEFAULT_SESSION_COOKIE.to_string()),
            session_ttl: Duration::from_secs(secs_var("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)),
            backend_timeout: Duration::from_secs(secs_var(
                "BACKEND_TIMEOUT_SECS",
                DEFAULT_BACKEND_TIMEOUT_SECS,
            )),
            static_dir: env::var("PORTAL_STATIC_DIR").ok().map(PathBuf::from),
            default_locale,
        }
    }
}

fn secs_var(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {name} must be a whole number of seconds, got {raw:?}")),
        Err(_) => default,
    }
}
