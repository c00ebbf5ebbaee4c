use chrono::{Duration as ChronoDuration, Utc};
use std::{collections::HashMap, time::Duration};
use tokio::sync::{RwLock, watch};

use crate::{
    auth::Credential,
    backend::SessionBackend,
    error::BackendError,
    models::Session,
};

struct Entry {
    session: Option<Session>,
    /// Number of the most recent navigation for this credential.
    latest: watch::Sender<u64>,
}

impl Entry {
    fn new() -> Self {
        let (latest, _) = watch::channel(0);
        Self {
            session: None,
            latest,
        }
    }

    fn current(&self) -> u64 {
        *self.latest.borrow()
    }
}

/// Ticket
///
/// Issued for every session lookup. A navigation ticket advances the
/// credential's navigation counter, which supersedes any navigation issued
/// before it. A probe ticket only observes the counter: it is cancelled by
/// logout alone and skips the cache write when a navigation overtook it.
///
/// Callers without a session cookie get a detached ticket. They share no
/// state, so nothing can supersede them and nothing is cached for them.
pub struct Ticket {
    path: String,
    slot: Option<Slot>,
}

struct Slot {
    key: String,
    number: u64,
    navigation: bool,
    latest: watch::Receiver<u64>,
}

impl Ticket {
    /// Resolves when the ticket's check should be abandoned. Never resolves
    /// for detached tickets.
    pub async fn superseded(&mut self) {
        let Some(slot) = self.slot.as_mut() else {
            return std::future::pending().await;
        };
        let number = slot.number;
        let navigation = slot.navigation;
        // A closed channel means the entry was cleared; that cancels every ticket.
        let _ = slot
            .latest
            .wait_for(|latest| navigation && *latest != number)
            .await;
    }
}

/// Refresh
///
/// Outcome of [`SessionStore::refresh`].
#[derive(Debug)]
pub enum Refresh {
    /// A fresh cached session was reused; no backend call.
    Cached(Session),
    /// The backend confirmed the session. Cached unless the ticket was stale
    /// or detached.
    Checked(Session),
    /// The check failed; a current ticket also dropped the cached session.
    Failed(BackendError),
    /// Cancelled by a newer navigation or by logout; nothing was written.
    Superseded,
}

impl Refresh {
    pub fn into_session(self) -> Option<Session> {
        match self {
            Refresh::Cached(s) | Refresh::Checked(s) => Some(s),
            Refresh::Failed(_) | Refresh::Superseded => None,
        }
    }
}

/// SessionStore
///
/// Per-credential cache of backend sessions. All writes go through the inner
/// `RwLock`, and no lock is held while the backend is being queried.
///
/// A cached session is fresh for a navigation when it was checked for the same
/// path less than `ttl` ago. Every other navigation re-checks.
pub struct SessionStore {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: ChronoDuration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX),
        }
    }

    /// Starts a navigation to `path`, cancelling any navigation still in
    /// flight for the same credential.
    pub async fn begin_navigation(&self, credential: &Credential, path: &str) -> Ticket {
        self.issue(credential, path, true).await
    }

    /// A ticket that reads the session without superseding navigations.
    pub async fn begin_probe(&self, credential: &Credential, path: &str) -> Ticket {
        self.issue(credential, path, false).await
    }

    async fn issue(&self, credential: &Credential, path: &str, navigation: bool) -> Ticket {
        let Some(key) = credential.session_id() else {
            return Ticket {
                path: path.to_string(),
                slot: None,
            };
        };

        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.to_string()).or_insert_with(Entry::new);
        let mut number = entry.current();
        if navigation {
            number += 1;
            entry.latest.send_replace(number);
        }
        Ticket {
            path: path.to_string(),
            slot: Some(Slot {
                key: key.to_string(),
                number,
                navigation,
                latest: entry.latest.subscribe(),
            }),
        }
    }

    /// The last known session for `credential`, fresh or not.
    pub async fn cached(&self, credential: &Credential) -> Option<Session> {
        let key = credential.session_id()?;
        let entries = self.entries.read().await;
        entries.get(key).and_then(|entry| entry.session.clone())
    }

    async fn fresh(&self, ticket: &Ticket) -> Option<Session> {
        let slot = ticket.slot.as_ref()?;
        let entries = self.entries.read().await;
        let session = entries.get(&slot.key)?.session.as_ref()?;
        let same_path = session.checked_path.as_deref() == Some(ticket.path.as_str());
        let young = Utc::now() - session.checked_at < self.ttl;
        (same_path && young).then(|| session.clone())
    }

    /// The single refresh entry point: reuse a fresh session or run exactly one
    /// backend check, racing it against cancellation of the ticket.
    pub async fn refresh(
        &self,
        ticket: &mut Ticket,
        credential: &Credential,
        backend: &dyn SessionBackend,
    ) -> Refresh {
        if let Some(session) = self.fresh(ticket).await {
            return Refresh::Cached(session);
        }

        let result = tokio::select! {
            result = backend.check(credential) => result,
            _ = ticket.superseded() => return Refresh::Superseded,
        };
        let result = result.map(|session| session.checked_for(&ticket.path));

        let Some(slot) = ticket.slot.as_ref() else {
            return match result {
                Ok(session) => Refresh::Checked(session),
                Err(err) => Refresh::Failed(err),
            };
        };

        let mut entries = self.entries.write().await;
        // A closed channel means the ticket's entry was cleared, even if a new
        // entry has since been created under the same key.
        let entry = match entries.get_mut(&slot.key) {
            Some(entry) if slot.latest.has_changed().is_ok() => entry,
            _ => return Refresh::Superseded,
        };
        let current = entry.current() == slot.number;
        if !current && slot.navigation {
            return Refresh::Superseded;
        }

        // Stale probes report what they saw but leave the cache to the navigation.
        match result {
            Ok(session) => {
                if current {
                    entry.session = Some(session.clone());
                }
                Refresh::Checked(session)
            }
            Err(err) => {
                if current {
                    entry.session = None;
                }
                Refresh::Failed(err)
            }
        }
    }

    /// Drops the session and cancels in-flight checks for `credential`.
    pub async fn clear(&self, credential: &Credential) {
        if let Some(key) = credential.session_id() {
            self.entries.write().await.remove(key);
        }
    }

    /// Removes entries whose session is missing or older than the TTL and that
    /// have no navigation in flight.
    pub async fn prune(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Utc::now();
        entries.retain(|_, entry| {
            let live = entry
                .session
                .as_ref()
                .is_some_and(|s| now - s.checked_at < self.ttl);
            live || entry.latest.receiver_count() > 0
        });
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
