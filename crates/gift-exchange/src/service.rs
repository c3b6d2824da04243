//! Session orchestration over the store port.
//!
//! [`DrawService`] loads a session, applies one state transition, and saves
//! the result. Failed transitions leave the stored session untouched. Saves
//! are conditional on the revision that was loaded; when another writer got
//! there first the transition is replayed on the fresh copy.

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::assignment::Assignments;
use crate::config::DrawSettings;
use crate::error::SessionError;
use crate::session::{DrawProgress, Participant, ParticipantId, Session, SessionId};
use crate::store::{SessionStore, StoreError};

/// How many times a transition is replayed after losing a save race.
pub const MAX_UPDATE_ATTEMPTS: u32 = 16;

/// Errors surfaced by [`DrawService`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// No session is stored under the identifier.
    #[error("session '{id}' not found")]
    SessionNotFound {
        /// Identifier that was looked up.
        id: SessionId,
    },
    /// Concurrent writers kept replacing the session.
    #[error("session '{id}' kept changing; gave up after {attempts} attempts")]
    Conflict {
        /// Identifier of the contended session.
        id: SessionId,
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// The requested transition was rejected by the session.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The store failed to load or save.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Applies session operations against a [`SessionStore`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use gift_exchange::{DrawService, DrawSettings, InMemorySessionStore};
///
/// let settings = DrawSettings {
///     seed: Some(7),
///     ..DrawSettings::default()
/// };
/// let service = DrawService::new(Arc::new(InMemorySessionStore::new()), settings);
///
/// let session = service.create_session("Office party", "Dana").expect("create");
/// for name in ["Alice", "Bob", "Carol"] {
///     service.join(session.id(), name).expect("join");
/// }
/// service.start_draw(session.id()).expect("draw");
///
/// let receiver = service.draw_for_name(session.id(), "Alice").expect("reveal");
/// assert_ne!(receiver, "Alice");
/// ```
pub struct DrawService<S: ?Sized> {
    store: Arc<S>,
    settings: DrawSettings,
}

impl<S> DrawService<S>
where
    S: SessionStore + ?Sized,
{
    /// Creates a service over `store` using `settings` for draws.
    #[must_use]
    pub const fn new(store: Arc<S>, settings: DrawSettings) -> Self {
        Self { store, settings }
    }

    /// Returns the settings used for draws.
    #[must_use]
    pub const fn settings(&self) -> &DrawSettings {
        &self.settings
    }

    /// Creates and stores an empty session with a generated organiser key.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] if the session cannot be saved.
    pub fn create_session(&self, name: &str, created_by: &str) -> Result<Session, ServiceError> {
        self.create_session_with_id(SessionId::random(), name, created_by, None)
    }

    /// Creates and stores an empty session under a caller-chosen identifier.
    ///
    /// A key is generated unless `organiser_key` supplies one.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] if the session cannot be saved.
    pub fn create_session_with_id(
        &self,
        id: SessionId,
        name: &str,
        created_by: &str,
        organiser_key: Option<&str>,
    ) -> Result<Session, ServiceError> {
        let generated = Session::with_id(id, name, created_by);
        let session = match organiser_key {
            Some(key) => generated.with_organiser_key(key),
            None => generated,
        };
        self.store.save(&session)?;
        info!(session_id = %session.id(), created_by, "session created");
        Ok(session)
    }

    /// Loads a session.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] for unknown identifiers.
    pub fn session(&self, id: &SessionId) -> Result<Session, ServiceError> {
        self.store
            .load(id)?
            .ok_or_else(|| ServiceError::SessionNotFound { id: id.clone() })
    }

    /// Loads a session after checking the caller's organiser key.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Session`] wrapping
    /// [`SessionError::OrganiserKeyMismatch`] for a wrong key.
    pub fn authorize_organiser(&self, id: &SessionId, key: &str) -> Result<Session, ServiceError> {
        let session = self.session(id)?;
        if let Err(err) = session.authorize_organiser(key) {
            warn!(session_id = %id, "organiser key rejected");
            return Err(err.into());
        }
        Ok(session)
    }

    /// Returns the full assignment map to the organiser.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Session`] for a wrong key or when no draw has
    /// run.
    pub fn assignments(&self, id: &SessionId, key: &str) -> Result<Assignments, ServiceError> {
        self.authorize_organiser(id, key)?
            .assignments()
            .cloned()
            .ok_or(ServiceError::Session(SessionError::DrawNotStarted))
    }

    /// Registers a participant through the join flow.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Session`] when the session rejects the name.
    pub fn join(&self, id: &SessionId, name: &str) -> Result<ParticipantId, ServiceError> {
        let participant = self.update(id, |session| session.join(name))?;
        info!(session_id = %id, participant_id = %participant, "participant joined");
        Ok(participant)
    }

    /// Registers a participant on the organiser's behalf.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Session`] when the session rejects the name.
    pub fn add_participant(&self, id: &SessionId, name: &str) -> Result<ParticipantId, ServiceError> {
        let participant = self.update(id, |session| session.add_participant_manually(name))?;
        info!(session_id = %id, participant_id = %participant, "participant added");
        Ok(participant)
    }

    /// Removes a participant and the restrictions that mention them.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Session`] for unknown participants or once the
    /// draw has started.
    pub fn remove_participant(
        &self,
        id: &SessionId,
        participant: &ParticipantId,
    ) -> Result<Participant, ServiceError> {
        let removed = self.update(id, |session| session.remove_participant(participant))?;
        info!(session_id = %id, participant_id = %participant, "participant removed");
        Ok(removed)
    }

    /// Flips whether a participant is left out of the draw.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Session`] for unknown participants or once the
    /// draw has started.
    pub fn toggle_exclusion(
        &self,
        id: &SessionId,
        participant: &ParticipantId,
    ) -> Result<bool, ServiceError> {
        let excluded = self.update(id, |session| session.toggle_exclusion(participant))?;
        info!(session_id = %id, participant_id = %participant, excluded, "exclusion toggled");
        Ok(excluded)
    }

    /// Opens or closes registration, returning `true` when now closed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] or [`ServiceError::Store`].
    pub fn toggle_registration(&self, id: &SessionId) -> Result<bool, ServiceError> {
        let closed = self.update(id, |session| Ok(session.toggle_registration()))?;
        info!(session_id = %id, closed, "registration toggled");
        Ok(closed)
    }

    /// Replaces the receivers `giver` may not draw.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Session`] if any name is not registered.
    pub fn set_restrictions(
        &self,
        id: &SessionId,
        giver: &str,
        receivers: &[String],
    ) -> Result<(), ServiceError> {
        self.update(id, |session| {
            session.set_restrictions(giver, receivers.iter().cloned())
        })?;
        info!(session_id = %id, giver, restricted = receivers.len(), "restrictions replaced");
        Ok(())
    }

    /// Adds one receiver to the set `giver` may not draw.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Session`] if either name is not registered.
    pub fn forbid(&self, id: &SessionId, giver: &str, receiver: &str) -> Result<(), ServiceError> {
        self.update(id, |session| {
            let mut receivers: Vec<String> = session
                .restrictions()
                .for_giver(giver)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default();
            receivers.push(receiver.to_owned());
            session.set_restrictions(giver, receivers)
        })?;
        info!(session_id = %id, giver, receiver, "restriction added");
        Ok(())
    }

    /// Generates assignments for the session's included participants.
    ///
    /// Uses a `ChaCha8Rng` seeded from the settings when they carry a seed,
    /// and one seeded from the thread RNG otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Session`] when the draw is already running or
    /// generation fails.
    pub fn start_draw(&self, id: &SessionId) -> Result<Assignments, ServiceError> {
        let generator = self.settings.generator();
        let seed = self.settings.seed;
        let mut rng = seed.map_or_else(
            || ChaCha8Rng::from_rng(&mut rand::rng()),
            ChaCha8Rng::seed_from_u64,
        );
        let assignments = self.update(id, |session| {
            session.start_draw(&generator, &mut rng).cloned()
        })?;
        info!(
            session_id = %id,
            participants = assignments.len(),
            seeded = seed.is_some(),
            "draw started"
        );
        Ok(assignments)
    }

    /// Reveals a participant's receiver and records the reveal.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Session`] when the draw has not started or the
    /// participant has no assignment.
    pub fn draw_for(
        &self,
        id: &SessionId,
        participant: &ParticipantId,
    ) -> Result<String, ServiceError> {
        let receiver = self.update(id, |session| session.draw_for(participant))?;
        info!(session_id = %id, participant_id = %participant, "assignment revealed");
        Ok(receiver)
    }

    /// Reveals the receiver for the participant called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Session`] for unknown names and the failures of
    /// [`DrawService::draw_for`].
    pub fn draw_for_name(&self, id: &SessionId, name: &str) -> Result<String, ServiceError> {
        let receiver = self.update(id, |session| {
            let participant = session
                .participant_by_name(name)
                .map(|p| p.id)
                .ok_or_else(|| SessionError::UnknownParticipant {
                    name: name.to_owned(),
                })?;
            session.draw_for(&participant)
        })?;
        info!(session_id = %id, participant = name, "assignment revealed");
        Ok(receiver)
    }

    /// Reports how many included participants have revealed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] for unknown identifiers.
    pub fn progress(&self, id: &SessionId) -> Result<DrawProgress, ServiceError> {
        Ok(self.session(id)?.progress())
    }

    /// Returns the session to the setup phase.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] or [`ServiceError::Store`].
    pub fn reset(&self, id: &SessionId) -> Result<(), ServiceError> {
        self.update(id, |session| {
            session.reset();
            Ok(())
        })?;
        info!(session_id = %id, "draw reset");
        Ok(())
    }

    /// Deletes a session, returning `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] when the store fails.
    pub fn delete_session(&self, id: &SessionId) -> Result<bool, ServiceError> {
        let existed = self.store.delete(id)?;
        info!(session_id = %id, existed, "session deleted");
        Ok(existed)
    }

    fn update<T, F>(&self, id: &SessionId, mut apply: F) -> Result<T, ServiceError>
    where
        F: FnMut(&mut Session) -> Result<T, SessionError>,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut session = self.session(id)?;
            let expected = session.revision();
            let outcome = apply(&mut session)?;
            session.advance_revision();
            if self.store.save_if_unchanged(&session, expected)? {
                return Ok(outcome);
            }
            debug!(session_id = %id, attempt, "session changed during update, retrying");
        }
        warn!(session_id = %id, attempts = MAX_UPDATE_ATTEMPTS, "gave up on contended session");
        Err(ServiceError::Conflict {
            id: id.clone(),
            attempts: MAX_UPDATE_ATTEMPTS,
        })
    }
}
