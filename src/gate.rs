use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::Credential,
    backend::{BackendReply, BackendState, LoginForm},
    error::BackendError,
    i18n::{Locale, MessageKey, Notice},
    models::{Area, Decision, Group, GroupSet, NavigationResponse, Phase, Session},
    route_table::{RouteTable, normalize},
    session::{Refresh, SessionStore},
};

/// Path used for session probes that are not navigations.
pub const SESSION_PROBE_PATH: &str = "/api/session";

/// authorize
///
/// The pure gate decision. `session` is `None` when no session is known or the
/// check failed; an unauthenticated session is treated the same way.
///
/// Order matters: an authenticated caller landing on a login page is sent home
/// first, public pages render next, and group membership is only consulted
/// once authentication is established.
pub fn authorize(
    table: &RouteTable,
    path: &str,
    session: Option<&Session>,
    required: GroupSet,
) -> Decision {
    let route = table.classify(path);
    let session = session.filter(|s| s.is_authenticated);

    if let (Some(session), Some(login_area)) = (session, route.login_for()) {
        return Decision::redirect(landing_for(session.group, login_area));
    }
    if route.is_public() {
        return Decision::Render;
    }
    let Some(session) = session else {
        return Decision::redirect(route.area.login_path());
    };
    if required.admits(session.group) {
        Decision::Render
    } else {
        Decision::Forbidden
    }
}

/// Where a signed-in caller belongs after hitting the login page of `login_area`.
pub fn landing_for(group: Group, login_area: Area) -> &'static str {
    match group {
        Group::Normal => Area::Client.home_path(),
        Group::Admin => Area::Admin.home_path(),
        Group::Both => login_area.home_path(),
    }
}

/// LoginOutcome
///
/// A login the backend accepted, with the session it produced.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: Session,
    pub redirect_to: &'static str,
    pub set_cookies: Vec<String>,
}

/// SessionGate
///
/// Decides every navigation: render, redirect to a login page, or forbid. The
/// session store and backend are injected so the gate carries no global state.
pub struct SessionGate {
    table: RouteTable,
    store: Arc<SessionStore>,
    backend: BackendState,
    cookie_name: String,
}

impl SessionGate {
    pub fn new(
        table: RouteTable,
        store: Arc<SessionStore>,
        backend: BackendState,
        cookie_name: &str,
    ) -> Self {
        Self {
            table,
            store,
            backend,
            cookie_name: cookie_name.to_string(),
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// [`authorize`] against this gate's route table.
    pub fn authorize(&self, path: &str, session: Option<&Session>, required: GroupSet) -> Decision {
        authorize(&self.table, path, session, required)
    }

    /// navigate
    ///
    /// Runs one navigation through the state machine. Public paths never reach
    /// the backend; every other path costs at most one session check, which is
    /// abandoned if the same caller navigates again before it resolves.
    pub async fn navigate(
        &self,
        path: &str,
        credential: &Credential,
        locale: Locale,
    ) -> NavigationResponse {
        let navigation_id = Uuid::new_v4();
        let path = normalize(path).to_string();
        let route = self.table.classify(&path);
        let mut phase = Phase::Idle;

        let session = if route.is_public() {
            self.store.cached(credential).await
        } else {
            advance(&mut phase, Phase::Checking, navigation_id);
            let mut ticket = self.store.begin_navigation(credential, &path).await;
            match self
                .store
                .refresh(&mut ticket, credential, self.backend.as_ref())
                .await
            {
                Refresh::Cached(session) => Some(session),
                Refresh::Checked(session) => {
                    debug!(%navigation_id, group = ?session.group, "session confirmed");
                    Some(session)
                }
                Refresh::Failed(err) => {
                    if err.is_transport() {
                        warn!(%navigation_id, error = %err, "session check failed, treating as signed out");
                    } else {
                        debug!(%navigation_id, error = %err, "no session");
                    }
                    None
                }
                Refresh::Superseded => {
                    advance(&mut phase, Phase::Superseded, navigation_id);
                    info!(%navigation_id, %path, "navigation superseded");
                    return NavigationResponse {
                        navigation_id,
                        path,
                        phase,
                        decision: None,
                        notice: None,
                    };
                }
            }
        };

        let decision = authorize(&self.table, &path, session.as_ref(), route.required());
        let (next, notice) = match &decision {
            Decision::Render => (Phase::Authorized, None),
            Decision::RedirectTo { .. } if session.as_ref().is_some_and(|s| s.is_authenticated) => {
                (Phase::Authorized, None)
            }
            Decision::RedirectTo { .. } => (
                Phase::Unauthorized,
                Some(Notice::error(locale, MessageKey::PleaseLoginFirst)),
            ),
            Decision::Forbidden => (
                Phase::Forbidden,
                Some(Notice::error(locale, MessageKey::GroupNotAuthorized)),
            ),
        };
        advance(&mut phase, next, navigation_id);
        info!(%navigation_id, %path, ?decision, ?phase, "navigation decided");

        NavigationResponse {
            navigation_id,
            path,
            phase,
            decision: Some(decision),
            notice,
        }
    }

    /// The caller's current session, re-checked unless a fresh one is cached.
    /// Neither supersedes nor is superseded by navigations; only logout
    /// cancels it.
    pub async fn session(&self, credential: &Credential) -> Option<Session> {
        let mut ticket = self.store.begin_probe(credential, SESSION_PROBE_PATH).await;
        self.store
            .refresh(&mut ticket, credential, self.backend.as_ref())
            .await
            .into_session()
    }

    /// Forwards a login to the backend and, on success, caches the session
    /// bound to the cookie the backend issued.
    pub async fn login(
        &self,
        credential: &Credential,
        form: &LoginForm,
        area: Area,
    ) -> Result<LoginOutcome, BackendError> {
        let BackendReply { set_cookies } = self.backend.login(credential, form).await?;
        let signed_in = credential.with_set_cookies(&set_cookies, &self.cookie_name);

        let mut ticket = self.store.begin_probe(&signed_in, SESSION_PROBE_PATH).await;
        let session = match self
            .store
            .refresh(&mut ticket, &signed_in, self.backend.as_ref())
            .await
        {
            Refresh::Cached(s) | Refresh::Checked(s) => s,
            Refresh::Failed(err) => return Err(err),
            Refresh::Superseded => {
                return Err(BackendError::Unavailable(
                    "login superseded by logout".to_string(),
                ));
            }
        };

        info!(group = ?session.group, ?area, "login accepted");
        Ok(LoginOutcome {
            redirect_to: landing_for(session.group, area),
            session,
            set_cookies,
        })
    }

    /// Forwards a logout. The cached session is dropped whatever the backend says.
    pub async fn logout(&self, credential: &Credential) -> Result<BackendReply, BackendError> {
        let result = self.backend.logout(credential).await;
        self.store.clear(credential).await;
        if let Err(err) = &result {
            warn!(error = %err, "backend logout failed; local session cleared anyway");
        }
        result
    }
}

fn advance(phase: &mut Phase, next: Phase, navigation_id: Uuid) {
    debug_assert!(
        phase.can_advance_to(next),
        "illegal navigation step {phase:?} -> {next:?}"
    );
    debug!(%navigation_id, from = ?*phase, to = ?next, "navigation phase");
    *phase = next;
}
