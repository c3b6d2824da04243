//! Gift exchange session state.
//!
//! A [`Session`] owns everything one exchange needs: who joined, who is
//! excluded from the draw, the organiser's restrictions, and the current
//! assignments. Every transition is an explicit method returning a typed
//! error so orchestration code can load a session, apply one operation, and
//! save it back.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::assignment::Assignments;
use crate::error::{AssignmentViolation, SessionError};
use crate::generator::AssignmentGenerator;
use crate::restrictions::Restrictions;
use crate::validation::is_valid_participant_name;

const SESSION_ID_PREFIX: &str = "session_";

/// Identifier of a session, safe to use as a file stem or store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Validates and wraps a session identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SessionIdValidationError`] if the value is empty or contains
    /// characters other than ASCII letters, digits, `-`, and `_`.
    ///
    /// # Examples
    /// ```
    /// use gift_exchange::SessionId;
    ///
    /// let id = SessionId::new("office-party").expect("valid id");
    /// assert_eq!(id.as_str(), "office-party");
    /// assert!(SessionId::new("../etc").is_err());
    /// ```
    pub fn new(value: impl Into<String>) -> Result<Self, SessionIdValidationError> {
        let raw = value.into();
        if raw.is_empty() {
            return Err(SessionIdValidationError::Empty);
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(SessionIdValidationError::InvalidCharacter { character: c });
        }
        Ok(Self(raw))
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(format!("{SESSION_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.0
    }
}

/// Validation errors returned when constructing [`SessionId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionIdValidationError {
    /// Identifier is empty.
    #[error("session id must not be empty")]
    Empty,
    /// Identifier contains a character outside the allowed set.
    #[error("session id contains invalid character '{character}'")]
    InvalidCharacter {
        /// The offending character.
        character: char,
    },
}

/// Stable identifier of a participant within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A person registered in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Identifier assigned when the participant joined.
    pub id: ParticipantId,
    /// Name used as the giver key in restrictions and assignments.
    pub name: String,
    /// Whether the participant has revealed their receiver.
    #[serde(default)]
    pub has_drawn: bool,
    /// Whether the organiser left this participant out of the draw.
    #[serde(default)]
    pub is_excluded: bool,
    /// Whether the organiser added this participant directly.
    #[serde(default)]
    pub added_manually: bool,
}

/// Phase of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Participants join and restrictions are edited.
    #[default]
    Setup,
    /// Assignments exist and participants may reveal them.
    Drawing,
}

/// How many included participants have revealed their receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawProgress {
    /// Included participants who have drawn.
    pub drawn: usize,
    /// Included participants overall.
    pub total: usize,
}

impl DrawProgress {
    /// Returns `true` when every included participant has drawn.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.total > 0 && self.drawn == self.total
    }
}

/// State of one gift exchange.
///
/// # Example
///
/// ```
/// use gift_exchange::{AssignmentGenerator, Session, SessionStatus};
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
///
/// let mut session = Session::new("Office party", "Dana");
/// let alice = session.join("Alice").expect("join");
/// session.join("Bob").expect("join");
/// session.join("Carol").expect("join");
///
/// let mut rng = ChaCha8Rng::seed_from_u64(1);
/// session
///     .start_draw(&AssignmentGenerator::new(), &mut rng)
///     .expect("draw");
/// assert_eq!(session.status(), SessionStatus::Drawing);
///
/// let receiver = session.draw_for(&alice).expect("reveal");
/// assert_ne!(receiver, "Alice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    id: SessionId,
    name: String,
    created_by: String,
    #[serde(default)]
    status: SessionStatus,
    #[serde(default)]
    registration_closed: bool,
    #[serde(default)]
    participants: Vec<Participant>,
    #[serde(default)]
    restrictions: Restrictions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assignments: Option<Assignments>,
    #[serde(default)]
    organiser_key: String,
    #[serde(default)]
    revision: u64,
}

impl Session {
    /// Creates a session in the setup phase with a random identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self::with_id(SessionId::random(), name, created_by)
    }

    /// Creates a session in the setup phase with the given identifier.
    #[must_use]
    pub fn with_id(id: SessionId, name: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            created_by: created_by.into(),
            status: SessionStatus::Setup,
            registration_closed: false,
            participants: Vec::new(),
            restrictions: Restrictions::new(),
            assignments: None,
            organiser_key: Uuid::new_v4().simple().to_string(),
            revision: 0,
        }
    }

    /// Replaces the generated organiser key.
    #[must_use]
    pub fn with_organiser_key(mut self, key: impl Into<String>) -> Self {
        self.organiser_key = key.into();
        self
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the session's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the organiser's name.
    #[must_use]
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    /// Returns the secret that unlocks organiser operations.
    #[must_use]
    pub fn organiser_key(&self) -> &str {
        &self.organiser_key
    }

    /// Checks a caller-supplied organiser key.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::OrganiserKeyMismatch`] when `key` is empty or
    /// differs from the stored key.
    pub fn authorize_organiser(&self, key: &str) -> Result<(), SessionError> {
        if key.is_empty() || key != self.organiser_key {
            return Err(SessionError::OrganiserKeyMismatch);
        }
        Ok(())
    }

    /// Number of saved changes this session has seen.
    ///
    /// Stores compare it before overwriting so concurrent updates cannot
    /// silently replace each other.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) const fn advance_revision(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Returns `true` if new participants may not join.
    #[must_use]
    pub const fn is_registration_closed(&self) -> bool {
        self.registration_closed
    }

    /// Returns participants in join order.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Looks up a participant by identifier.
    #[must_use]
    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == *id)
    }

    /// Looks up a participant by name.
    #[must_use]
    pub fn participant_by_name(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name == name)
    }

    /// Returns the organiser's restrictions.
    #[must_use]
    pub const fn restrictions(&self) -> &Restrictions {
        &self.restrictions
    }

    /// Returns the full assignment map.
    ///
    /// Only organiser-facing views should call this; participants see their
    /// own entry through [`Session::draw_for`].
    #[must_use]
    pub const fn assignments(&self) -> Option<&Assignments> {
        self.assignments.as_ref()
    }

    /// Returns the receiver assigned to `giver`, if a draw has happened.
    #[must_use]
    pub fn receiver_for(&self, giver: &str) -> Option<&str> {
        self.assignments.as_ref()?.receiver_for(giver)
    }

    /// Registers a participant through the public join flow.
    ///
    /// The name is trimmed before validation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RegistrationClosed`] when registration is
    /// closed, [`SessionError::InvalidName`] for names that fail validation,
    /// and [`SessionError::DuplicateName`] if the name is taken.
    pub fn join(&mut self, name: &str) -> Result<ParticipantId, SessionError> {
        if self.registration_closed {
            return Err(SessionError::RegistrationClosed);
        }
        self.register(name, false)
    }

    /// Registers a participant on the organiser's behalf.
    ///
    /// Works even when registration is closed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidName`] or [`SessionError::DuplicateName`].
    pub fn add_participant_manually(&mut self, name: &str) -> Result<ParticipantId, SessionError> {
        self.register(name, true)
    }

    fn register(&mut self, name: &str, added_manually: bool) -> Result<ParticipantId, SessionError> {
        let trimmed = name.trim();
        if !is_valid_participant_name(trimmed) {
            return Err(SessionError::InvalidName {
                name: name.to_owned(),
            });
        }
        if self.participant_by_name(trimmed).is_some() {
            return Err(SessionError::DuplicateName {
                name: trimmed.to_owned(),
            });
        }

        let id = ParticipantId::random();
        self.participants.push(Participant {
            id,
            name: trimmed.to_owned(),
            has_drawn: false,
            is_excluded: false,
            added_manually,
        });
        Ok(id)
    }

    /// Removes a participant and any restrictions that mention them.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DrawAlreadyStarted`] once assignments exist
    /// and [`SessionError::ParticipantNotFound`] for unknown identifiers.
    pub fn remove_participant(&mut self, id: &ParticipantId) -> Result<Participant, SessionError> {
        self.require_setup()?;
        let position = self
            .participants
            .iter()
            .position(|p| p.id == *id)
            .ok_or_else(|| not_found(id))?;
        let removed = self.participants.remove(position);
        self.restrictions.remove_participant(&removed.name);
        Ok(removed)
    }

    /// Flips whether a participant is left out of the draw.
    ///
    /// Returns the new exclusion state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DrawAlreadyStarted`] once assignments exist
    /// and [`SessionError::ParticipantNotFound`] for unknown identifiers.
    pub fn toggle_exclusion(&mut self, id: &ParticipantId) -> Result<bool, SessionError> {
        self.require_setup()?;
        let participant = self.participant_mut(id)?;
        participant.is_excluded = !participant.is_excluded;
        Ok(participant.is_excluded)
    }

    /// Opens or closes registration, returning `true` when now closed.
    pub const fn toggle_registration(&mut self) -> bool {
        self.registration_closed = !self.registration_closed;
        self.registration_closed
    }

    /// Replaces the receivers `giver` may not be assigned to.
    ///
    /// An empty set clears the giver's restrictions.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownParticipant`] if the giver or any
    /// receiver is not registered.
    pub fn set_restrictions<I, S>(&mut self, giver: &str, receivers: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require_name(giver)?;
        let receiver_names: Vec<String> = receivers.into_iter().map(Into::into).collect();
        for receiver in &receiver_names {
            self.require_name(receiver)?;
        }
        self.restrictions.set_for_giver(giver, receiver_names);
        Ok(())
    }

    /// Names of participants taking part in the draw, in join order.
    #[must_use]
    pub fn included_names(&self) -> Vec<String> {
        self.participants
            .iter()
            .filter(|p| !p.is_excluded)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Generates assignments for the included participants.
    ///
    /// Restrictions that mention excluded or removed participants are ignored
    /// for this draw but kept for later ones.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DrawAlreadyStarted`] outside the setup phase,
    /// or [`SessionError::Draw`] when generation fails (including fewer than
    /// three included participants).
    pub fn start_draw<R>(
        &mut self,
        generator: &AssignmentGenerator,
        rng: &mut R,
    ) -> Result<&Assignments, SessionError>
    where
        R: Rng + ?Sized,
    {
        self.require_setup()?;

        let names = self.included_names();
        let restrictions = self
            .restrictions
            .retained(|name| names.iter().any(|n| n == name));
        let assignments = generator.generate(&names, &restrictions, rng)?;

        self.status = SessionStatus::Drawing;
        Ok(&*self.assignments.insert(assignments))
    }

    /// Reveals a participant's receiver and marks them as drawn.
    ///
    /// Revealing again returns the same receiver.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DrawNotStarted`] during setup,
    /// [`SessionError::ParticipantNotFound`] for unknown identifiers, and
    /// [`SessionError::NoAssignmentFor`] for participants left out of the draw.
    pub fn draw_for(&mut self, id: &ParticipantId) -> Result<String, SessionError> {
        if self.status != SessionStatus::Drawing {
            return Err(SessionError::DrawNotStarted);
        }

        let name = self
            .participant(id)
            .map(|p| p.name.clone())
            .ok_or_else(|| not_found(id))?;
        let receiver = self
            .receiver_for(&name)
            .map(str::to_owned)
            .ok_or(SessionError::NoAssignmentFor { name })?;

        self.participant_mut(id)?.has_drawn = true;
        Ok(receiver)
    }

    /// Counts reveals among included participants.
    #[must_use]
    pub fn progress(&self) -> DrawProgress {
        let included = self.participants.iter().filter(|p| !p.is_excluded);
        let (drawn, total) = included.fold((0, 0), |(drawn, total), p| {
            (drawn + usize::from(p.has_drawn), total + 1)
        });
        DrawProgress { drawn, total }
    }

    /// Returns to the setup phase, discarding assignments and reveals.
    pub fn reset(&mut self) {
        self.status = SessionStatus::Setup;
        self.assignments = None;
        for participant in &mut self.participants {
            participant.has_drawn = false;
        }
    }

    /// Checks that stored assignments still form a derangement of their givers
    /// and only name registered participants.
    ///
    /// Restrictions are not rechecked because the organiser may edit them
    /// after a draw. Participants who joined after the draw may lack an entry.
    ///
    /// # Errors
    ///
    /// Returns the first [`AssignmentViolation`] found.
    pub fn verify_assignments(&self) -> Result<(), AssignmentViolation> {
        let Some(assignments) = &self.assignments else {
            return Ok(());
        };
        let givers: Vec<String> = assignments.iter().map(|(g, _)| g.to_owned()).collect();
        assignments.verify(&givers, &Restrictions::new())?;

        for (giver, receiver) in assignments.iter() {
            if self.participant_by_name(giver).is_none() {
                return Err(AssignmentViolation::UnknownGiver {
                    giver: giver.to_owned(),
                });
            }
            if self.participant_by_name(receiver).is_none() {
                return Err(AssignmentViolation::UnknownReceiver {
                    giver: giver.to_owned(),
                    receiver: receiver.to_owned(),
                });
            }
        }
        Ok(())
    }

    fn require_setup(&self) -> Result<(), SessionError> {
        if self.status == SessionStatus::Setup {
            Ok(())
        } else {
            Err(SessionError::DrawAlreadyStarted)
        }
    }

    fn participant_mut(&mut self, id: &ParticipantId) -> Result<&mut Participant, SessionError> {
        self.participants
            .iter_mut()
            .find(|p| p.id == *id)
            .ok_or_else(|| not_found(id))
    }

    fn require_name(&self, name: &str) -> Result<(), SessionError> {
        self.participant_by_name(name)
            .map(|_| ())
            .ok_or_else(|| SessionError::UnknownParticipant {
                name: name.to_owned(),
            })
    }
}

fn not_found(id: &ParticipantId) -> SessionError {
    SessionError::ParticipantNotFound { id: id.to_string() }
}
