use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use crate::{
    auth::Credential,
    error::BackendError,
    models::{BackendEnvelope, Group, Session, SessionData},
};

const CHECK_PATH: &str = "/Common/User/check";
const LOGIN_PATH: &str = "/Common/Login/login";
const LOGOUT_PATH: &str = "/Common/User/logout";

/// LoginForm
///
/// The credentials the backend's login endpoint expects, form-encoded.
#[derive(Debug, Clone, Serialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub captcha: String,
}

/// BackendReply
///
/// A successful login/logout. `set_cookies` holds the backend's raw `Set-Cookie`
/// values, which must reach the browser unchanged.
#[derive(Debug, Clone, Default)]
pub struct BackendReply {
    pub set_cookies: Vec<String>,
}

/// SessionBackend
///
/// Contract for the external service that owns sessions. The real client speaks
/// HTTP to it; tests use [`MockSessionBackend`].
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Asks who owns `credential`. A business error (`status != 0`) and a transport
    /// failure are both errors; the caller decides how to collapse them.
    async fn check(&self, credential: &Credential) -> Result<Session, BackendError>;

    async fn login(
        &self,
        credential: &Credential,
        form: &LoginForm,
    ) -> Result<BackendReply, BackendError>;

    async fn logout(&self, credential: &Credential) -> Result<BackendReply, BackendError>;
}

/// BackendState
///
/// The shared handle to the session backend.
pub type BackendState = Arc<dyn SessionBackend>;

// --- HTTP Implementation ---

/// HttpSessionBackend
///
/// Talks to the backend over HTTP with `reqwest`. The caller's `Cookie` header
/// is forwarded as-is since the backend authenticates by cookie.
#[derive(Clone)]
pub struct HttpSessionBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessionBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<F, T>(
        &self,
        path: &str,
        credential: &Credential,
        form: Option<&F>,
    ) -> Result<(Vec<String>, BackendEnvelope<T>), BackendError>
    where
        F: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(cookie) = credential.cookie_header() {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        request = match form {
            Some(form) => request.form(form),
            None => request.header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            ),
        };

        let response = request.send().await?;
        let set_cookies = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect();

        let http_status = response.status();
        let body = response.bytes().await?;
        let envelope = serde_json::from_slice::<BackendEnvelope<T>>(&body).map_err(|e| {
            BackendError::Malformed(format!("{path} answered {http_status}: {e}"))
        })?;

        if envelope.status != 0 {
            return Err(BackendError::Rejected {
                status: envelope.status,
                message: envelope.message.unwrap_or_default(),
            });
        }
        Ok((set_cookies, envelope))
    }
}

#[async_trait]
impl SessionBackend for HttpSessionBackend {
    async fn check(&self, credential: &Credential) -> Result<Session, BackendError> {
        let (_, envelope) = self
            .post::<(), SessionData>(CHECK_PATH, credential, None)
            .await?;
        let data = envelope
            .data
            .ok_or_else(|| BackendError::Malformed("session check returned no data".into()))?;
        Ok(Session::authenticated(data.group, data.name))
    }

    async fn login(
        &self,
        credential: &Credential,
        form: &LoginForm,
    ) -> Result<BackendReply, BackendError> {
        let (set_cookies, _) = self
            .post::<_, serde_json::Value>(LOGIN_PATH, credential, Some(form))
            .await?;
        Ok(BackendReply { set_cookies })
    }

    async fn logout(&self, credential: &Credential) -> Result<BackendReply, BackendError> {
        let (set_cookies, _) = self
            .post::<(), serde_json::Value>(LOGOUT_PATH, credential, None)
            .await?;
        Ok(BackendReply { set_cookies })
    }
}

// --- Mock Implementation (For Tests) ---

struct MockAccount {
    password: String,
    group: Group,
}

/// MockSessionBackend
///
/// In-memory backend used by tests. Sessions are keyed by session cookie value;
/// accounts can log in and receive a fresh session cookie. Every `check` is
/// counted so tests can assert how many round trips a navigation cost.
pub struct MockSessionBackend {
    cookie_name: String,
    sessions: Mutex<HashMap<String, Group>>,
    accounts: Mutex<HashMap<String, MockAccount>>,
    unreachable: AtomicBool,
    delay: Option<Duration>,
    checks: AtomicUsize,
    issued: AtomicUsize,
}

impl MockSessionBackend {
    pub fn new(cookie_name: &str) -> Self {
        Self {
            cookie_name: cookie_name.to_string(),
            sessions: Mutex::new(HashMap::new()),
            accounts: Mutex::new(HashMap::new()),
            unreachable: AtomicBool::new(false),
            delay: None,
            checks: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
        }
    }

    pub fn with_session(self, session_id: &str, group: Group) -> Self {
        self.set_session(session_id, group);
        self
    }

    pub fn with_account(self, email: &str, password: &str, group: Group) -> Self {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(
                email.to_string(),
                MockAccount {
                    password: password.to_string(),
                    group,
                },
            );
        }
        self
    }

    /// Every call fails as if the network were down.
    pub fn unreachable(self) -> Self {
        self.set_unreachable(true);
        self
    }

    /// Every `check` sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_session(&self, session_id: &str, group: Group) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(session_id.to_string(), group);
        }
    }

    pub fn expire_session(&self, session_id: &str) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(session_id);
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn check_calls(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    fn transport_check(&self) -> Result<(), BackendError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable(
                "mock backend unreachable".to_string(),
            ));
        }
        Ok(())
    }

    fn lookup(&self, credential: &Credential) -> Option<Group> {
        let id = credential.session_id()?;
        self.sessions.lock().ok()?.get(id).copied()
    }
}

#[async_trait]
impl SessionBackend for MockSessionBackend {
    async fn check(&self, credential: &Credential) -> Result<Session, BackendError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.transport_check()?;
        match self.lookup(credential) {
            Some(group) => Ok(Session::authenticated(group, None)),
            None => Err(BackendError::Rejected {
                status: 1,
                message: "not logged in".to_string(),
            }),
        }
    }

    async fn login(
        &self,
        _credential: &Credential,
        form: &LoginForm,
    ) -> Result<BackendReply, BackendError> {
        self.transport_check()?;
        let group = self
            .accounts
            .lock()
            .ok()
            .and_then(|accounts| {
                accounts
                    .get(&form.email)
                    .filter(|a| a.password == form.password)
                    .map(|a| a.group)
            })
            .ok_or_else(|| BackendError::Rejected {
                status: 2,
                message: "wrong email or password".to_string(),
            })?;

        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let session_id = format!("mock-session-{n}");
        self.set_session(&session_id, group);
        Ok(BackendReply {
            set_cookies: vec![format!("{}={}; Path=/; HttpOnly", self.cookie_name, session_id)],
        })
    }

    async fn logout(&self, credential: &Credential) -> Result<BackendReply, BackendError> {
        self.transport_check()?;
        if let Some(id) = credential.session_id() {
            self.expire_session(id);
        }
        Ok(BackendReply::default())
    }
}
