//! Persistence and live-update ports for sessions.
//!
//! [`SessionStore`] is the read/write/delete edge the draw service drives.
//! [`SessionFeed`] is the push edge: subscribers hear about every write to a
//! session. Adapters map their own failures into [`StoreError`] so callers
//! see predictable variants.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::debug;

use crate::session::{Session, SessionId};

/// Errors surfaced by session store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("session store connection failed: {message}")]
    Connection {
        /// Description of the failure.
        message: String,
    },
    /// A read or write failed during execution.
    #[error("session store query failed: {message}")]
    Query {
        /// Description of the failure.
        message: String,
    },
    /// Stored data could not be decoded into a valid session.
    #[error("stored session is corrupt: {message}")]
    Corrupt {
        /// Description of the failure.
        message: String,
    },
}

/// Port for loading and saving whole sessions.
///
/// Implementations must make [`SessionStore::save`] atomic: a concurrent
/// reader sees either the previous session or the new one.
/// [`SessionStore::save_if_unchanged`] must also be atomic with respect to
/// other writers so read-modify-write cycles never lose an update.
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    /// Load a session, returning `None` if it does not exist.
    fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

    /// Insert or replace a session.
    fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Replace a stored session only if its revision is still
    /// `expected_revision`.
    ///
    /// Returns `false`, leaving the store untouched, when another writer has
    /// saved in the meantime or the session no longer exists.
    fn save_if_unchanged(
        &self,
        session: &Session,
        expected_revision: u64,
    ) -> Result<bool, StoreError>;

    /// Delete a session, returning `true` if it existed.
    fn delete(&self, id: &SessionId) -> Result<bool, StoreError>;
}

/// Handle returned by [`SessionFeed::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked with the new session state, or `None` after deletion.
pub type SessionListener = Arc<dyn Fn(Option<&Session>) + Send + Sync>;

/// Port for live session change notifications.
pub trait SessionFeed {
    /// Register `listener` for changes to the session `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the adapter cannot record the subscription.
    fn subscribe(
        &self,
        id: &SessionId,
        listener: SessionListener,
    ) -> Result<SubscriptionId, StoreError>;

    /// Remove a subscription, returning `true` if it was registered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the adapter cannot update its subscriptions.
    fn unsubscribe(&self, subscription: SubscriptionId) -> Result<bool, StoreError>;
}

struct Subscriber {
    id: SubscriptionId,
    session_id: SessionId,
    listener: SessionListener,
}

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<SessionId, Session>,
    subscribers: Vec<Subscriber>,
    next_subscription: u64,
}

/// Process-local store that notifies subscribers after every write.
///
/// # Example
///
/// ```
/// use std::sync::{Arc, Mutex};
///
/// use gift_exchange::{InMemorySessionStore, Session, SessionFeed, SessionStore};
///
/// let store = InMemorySessionStore::new();
/// let session = Session::new("Office party", "Dana");
/// let seen = Arc::new(Mutex::new(0));
/// let counter = Arc::clone(&seen);
/// store
///     .subscribe(
///         session.id(),
///         Arc::new(move |_: Option<&Session>| *counter.lock().expect("counter") += 1),
///     )
///     .expect("subscribe");
///
/// store.save(&session).expect("save");
/// assert_eq!(*seen.lock().expect("counter"), 1);
/// ```
#[derive(Default)]
pub struct InMemorySessionStore {
    state: Mutex<MemoryState>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Connection {
            message: "in-memory session store lock poisoned".to_owned(),
        })
    }

    fn listeners_for(state: &MemoryState, id: &SessionId) -> Vec<SessionListener> {
        state
            .subscribers
            .iter()
            .filter(|s| s.session_id == *id)
            .map(|s| Arc::clone(&s.listener))
            .collect()
    }

    fn notify_saved(session: &Session, listeners: Vec<SessionListener>) {
        debug!(
            session_id = %session.id(),
            revision = session.revision(),
            listeners = listeners.len(),
            "session saved"
        );
        for listener in listeners {
            listener(Some(session));
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.lock()?.sessions.get(id).cloned())
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        let listeners = {
            let mut state = self.lock()?;
            state.sessions.insert(session.id().clone(), session.clone());
            Self::listeners_for(&state, session.id())
        };
        Self::notify_saved(session, listeners);
        Ok(())
    }

    fn save_if_unchanged(
        &self,
        session: &Session,
        expected_revision: u64,
    ) -> Result<bool, StoreError> {
        let listeners = {
            let mut state = self.lock()?;
            let current = state.sessions.get(session.id()).map(Session::revision);
            if current != Some(expected_revision) {
                return Ok(false);
            }
            state.sessions.insert(session.id().clone(), session.clone());
            Self::listeners_for(&state, session.id())
        };
        Self::notify_saved(session, listeners);
        Ok(true)
    }

    fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        let (existed, listeners) = {
            let mut state = self.lock()?;
            let existed = state.sessions.remove(id).is_some();
            (existed, Self::listeners_for(&state, id))
        };
        if existed {
            for listener in listeners {
                listener(None);
            }
        }
        Ok(existed)
    }
}

impl SessionFeed for InMemorySessionStore {
    fn subscribe(
        &self,
        id: &SessionId,
        listener: SessionListener,
    ) -> Result<SubscriptionId, StoreError> {
        let mut state = self.lock()?;
        let subscription = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.subscribers.push(Subscriber {
            id: subscription,
            session_id: id.clone(),
            listener,
        });
        Ok(subscription)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let before = state.subscribers.len();
        state.subscribers.retain(|s| s.id != subscription);
        Ok(state.subscribers.len() != before)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the in-memory session store.

    use std::sync::Mutex;

    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn store() -> InMemorySessionStore {
        InMemorySessionStore::new()
    }

    fn recorder() -> (Arc<Mutex<Vec<Option<String>>>>, SessionListener) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let listener: SessionListener = Arc::new(move |session: Option<&Session>| {
            sink.lock()
                .expect("events lock")
                .push(session.map(|s| s.name().to_owned()));
        });
        (events, listener)
    }

    #[rstest]
    fn load_returns_none_for_unknown_session(store: InMemorySessionStore) {
        let id = SessionId::new("missing").expect("id");
        assert_eq!(store.load(&id), Ok(None));
    }

    #[rstest]
    fn save_then_load_round_trips(store: InMemorySessionStore) {
        let mut session = Session::new("Office party", "Dana");
        session.join("Alice").expect("join");

        store.save(&session).expect("save");

        assert_eq!(store.load(session.id()), Ok(Some(session)));
    }

    #[rstest]
    fn subscribers_hear_saves_and_deletes(store: InMemorySessionStore) {
        let session = Session::new("Office party", "Dana");
        let (events, listener) = recorder();
        store.subscribe(session.id(), listener).expect("subscribe");

        store.save(&session).expect("save");
        assert_eq!(store.delete(session.id()), Ok(true));
        assert_eq!(store.delete(session.id()), Ok(false));

        let seen = events.lock().expect("events lock").clone();
        assert_eq!(seen, vec![Some("Office party".to_owned()), None]);
    }

    #[rstest]
    fn subscribers_only_hear_their_session(store: InMemorySessionStore) {
        let watched = Session::new("Watched", "Dana");
        let other = Session::new("Other", "Dana");
        let (events, listener) = recorder();
        store.subscribe(watched.id(), listener).expect("subscribe");

        store.save(&other).expect("save");

        assert!(events.lock().expect("events lock").is_empty());
    }

    #[rstest]
    fn unsubscribed_listeners_stop_hearing(store: InMemorySessionStore) {
        let session = Session::new("Office party", "Dana");
        let (events, listener) = recorder();
        let subscription = store.subscribe(session.id(), listener).expect("subscribe");

        assert_eq!(store.unsubscribe(subscription), Ok(true));
        assert_eq!(store.unsubscribe(subscription), Ok(false));
        store.save(&session).expect("save");

        assert!(events.lock().expect("events lock").is_empty());
    }

    #[rstest]
    fn conditional_saves_reject_stale_revisions(store: InMemorySessionStore) {
        let session = Session::new("Office party", "Dana");
        store.save(&session).expect("save");
        let mut first = session.clone();
        first.advance_revision();
        first.join("Alice").expect("join");
        let mut second = session.clone();
        second.advance_revision();
        second.join("Bob").expect("join");

        assert_eq!(store.save_if_unchanged(&first, 0), Ok(true));
        assert_eq!(store.save_if_unchanged(&second, 0), Ok(false));

        let stored = store.load(session.id()).expect("load").expect("exists");
        assert_eq!(stored, first);
    }

    #[rstest]
    fn conditional_saves_need_an_existing_session(store: InMemorySessionStore) {
        let session = Session::new("Office party", "Dana");
        let (events, listener) = recorder();
        store.subscribe(session.id(), listener).expect("subscribe");

        assert_eq!(store.save_if_unchanged(&session, 0), Ok(false));
        assert_eq!(store.load(session.id()), Ok(None));
        assert!(events.lock().expect("events lock").is_empty());
    }

    #[rstest]
    fn listeners_may_read_the_store(store: InMemorySessionStore) {
        let shared = Arc::new(store);
        let session = Session::new("Office party", "Dana");
        let reader = Arc::clone(&shared);
        let id = session.id().clone();
        let loaded = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&loaded);
        shared
            .subscribe(
                session.id(),
                Arc::new(move |_: Option<&Session>| {
                    *sink.lock().expect("sink lock") = Some(reader.load(&id));
                }),
            )
            .expect("subscribe");

        shared.save(&session).expect("save");

        let observed = loaded.lock().expect("sink lock").clone();
        assert_eq!(observed, Some(Ok(Some(session))));
    }
}
