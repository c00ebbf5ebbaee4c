use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::i18n::Notice;

// --- Groups ---

/// Group
///
/// The coarse role attached to a backend session. The backend encodes it as an
/// integer (`1` client, `2` administrator, `3` both); anything else is rejected
/// when the envelope is decoded, so an unknown code can never reach the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Group {
    Normal = 1,
    Admin = 2,
    Both = 3,
}

impl Group {
    pub const ALL: [Group; 3] = [Group::Normal, Group::Admin, Group::Both];

    pub const fn code(self) -> u8 {
        self as u8
    }

    const fn slot(self) -> usize {
        self as usize - 1
    }
}

impl TryFrom<u8> for Group {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Group::Normal),
            2 => Ok(Group::Admin),
            3 => Ok(Group::Both),
            other => Err(format!("unknown group code {other}")),
        }
    }
}

impl From<Group> for u8 {
    fn from(group: Group) -> u8 {
        group.code()
    }
}

/// GroupSet
///
/// Set-membership type over [`Group`]. The empty set is meaningful: a route
/// with no required groups admits any authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupSet {
    members: [bool; 3],
}

impl GroupSet {
    /// Any authenticated caller.
    pub const fn any() -> Self {
        Self { members: [false; 3] }
    }

    pub const fn of(groups: &[Group]) -> Self {
        let mut members = [false; 3];
        let mut i = 0;
        while i < groups.len() {
            members[groups[i].slot()] = true;
            i += 1;
        }
        Self { members }
    }

    pub const fn contains(&self, group: Group) -> bool {
        self.members[group.slot()]
    }

    pub const fn is_empty(&self) -> bool {
        !self.members[0] && !self.members[1] && !self.members[2]
    }

    pub const fn union(self, other: GroupSet) -> GroupSet {
        GroupSet {
            members: [
                self.members[0] || other.members[0],
                self.members[1] || other.members[1],
                self.members[2] || other.members[2],
            ],
        }
    }

    /// True when the set is empty or contains `group`.
    pub const fn admits(&self, group: Group) -> bool {
        self.is_empty() || self.contains(group)
    }

    pub fn iter(&self) -> impl Iterator<Item = Group> + '_ {
        Group::ALL.into_iter().filter(|g| self.contains(*g))
    }
}

impl FromIterator<Group> for GroupSet {
    fn from_iter<I: IntoIterator<Item = Group>>(iter: I) -> Self {
        iter.into_iter()
            .fold(GroupSet::any(), |set, g| set.union(GroupSet::of(&[g])))
    }
}

// --- Session ---

/// Session
///
/// Snapshot of the caller's authentication state as last reported by the backend.
/// Produced by a successful check or login; dropped on logout or failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Session {
    pub is_authenticated: bool,
    #[ts(type = "1 | 2 | 3")]
    #[schema(value_type = u8, example = 2)]
    pub group: Group,
    pub display_name: Option<String>,
    #[ts(type = "string")]
    pub checked_at: DateTime<Utc>,
    /// The navigation path that triggered the check. Login sessions carry `None`.
    pub checked_path: Option<String>,
}

impl Session {
    pub fn authenticated(group: Group, display_name: Option<String>) -> Self {
        Self {
            is_authenticated: true,
            group,
            display_name,
            checked_at: Utc::now(),
            checked_path: None,
        }
    }

    pub fn checked_for(mut self, path: &str) -> Self {
        self.checked_path = Some(path.to_string());
        self
    }
}

// --- Decisions ---

/// Decision
///
/// The gate's answer for one navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum Decision {
    Render,
    RedirectTo { location: String },
    Forbidden,
}

impl Decision {
    pub fn redirect(location: &str) -> Self {
        Decision::RedirectTo {
            location: location.to_string(),
        }
    }
}

/// Phase
///
/// Per-navigation state machine: `Idle → Checking → {Authorized, Unauthorized,
/// Forbidden}`. `Superseded` ends a navigation whose check was cancelled by a
/// newer one from the same caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Phase {
    Idle,
    Checking,
    Authorized,
    Unauthorized,
    Forbidden,
    Superseded,
}

impl Phase {
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::Authorized | Phase::Unauthorized | Phase::Forbidden | Phase::Superseded
        )
    }

    /// Whether `self → next` is a legal step for a single navigation.
    pub const fn can_advance_to(self, next: Phase) -> bool {
        match self {
            Phase::Idle => matches!(
                next,
                Phase::Checking | Phase::Authorized | Phase::Unauthorized
            ),
            Phase::Checking => next.is_terminal(),
            _ => false,
        }
    }
}

// --- Backend Wire Format ---

/// BackendEnvelope
///
/// Every backend endpoint answers `{status, message?, data?}`; `status == 0` is success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendEnvelope<T> {
    pub status: i64,
    pub message: Option<String>,
    pub data: Option<T>,
}

/// SessionData
///
/// The `data` payload of a successful session check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub group: Group,
    #[serde(default, alias = "username", alias = "nickname")]
    pub name: Option<String>,
}

// --- API Payloads ---

/// NavigationRequest
///
/// Body of `POST /api/navigate`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavigationRequest {
    #[schema(example = "/admin/product")]
    pub path: String,
}

/// NavigationResponse
///
/// The tagged result of a gate decision as seen by the SPA.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavigationResponse {
    pub navigation_id: Uuid,
    pub path: String,
    pub phase: Phase,
    /// Absent when the navigation was superseded.
    pub decision: Option<Decision>,
    pub notice: Option<Notice>,
}

/// SessionResponse
///
/// Body of `GET /api/session`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionResponse {
    #[ts(type = "1 | 2 | 3")]
    #[schema(value_type = u8, example = 1)]
    pub group: Group,
    pub display_name: Option<String>,
    #[ts(type = "string")]
    pub checked_at: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            group: session.group,
            display_name: session.display_name.clone(),
            checked_at: session.checked_at,
        }
    }
}

/// LoginRequest
///
/// Form body of `POST /api/session/login`; forwarded to the backend minus `area`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub captcha: String,
    /// Which login page submitted the form. Defaults to the client area.
    #[serde(default)]
    pub area: Option<Area>,
}

/// LoginResponse
///
/// Where the SPA should go after a successful login, plus the localized notice.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub redirect_to: String,
    pub session: SessionResponse,
    pub notice: Notice,
}

/// LogoutResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LogoutResponse {
    pub redirect_to: String,
    pub notice: Notice,
}

/// Area
///
/// The two halves of the portal. Each has its own login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Area {
    Client,
    Admin,
}

impl Area {
    /// Segment-aware: `/admin` and `/admin/...` belong to the admin area,
    /// `/administrator` does not.
    pub fn of_path(path: &str) -> Area {
        match path.strip_prefix("/admin") {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => Area::Admin,
            _ => Area::Client,
        }
    }

    pub const fn login_path(self) -> &'static str {
        match self {
            Area::Client => "/login",
            Area::Admin => "/admin/login",
        }
    }

    pub const fn home_path(self) -> &'static str {
        match self {
            Area::Client => "/",
            Area::Admin => "/admin",
        }
    }
}
