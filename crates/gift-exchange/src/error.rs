//! Error types for the gift-exchange crate.
//!
//! This module defines semantic error enums for assignment generation,
//! assignment verification, session state transitions, and session documents,
//! following the project's error handling conventions with `thiserror`.

use std::path::PathBuf;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while generating assignments.
///
/// [`DrawError::NoValidAssignmentFound`] is the anticipated outcome for tight
/// restriction sets; the remaining variants indicate malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawError {
    /// Too few participants were supplied for a draw.
    #[error("at least {minimum} participants are required, found {count}")]
    InsufficientParticipants {
        /// Number of participants supplied.
        count: usize,
        /// Minimum number of participants accepted.
        minimum: usize,
    },

    /// The attempt budget was exhausted without a complete assignment.
    #[error("no valid assignment found after {max_attempts} attempts; relax the restrictions")]
    NoValidAssignmentFound {
        /// Number of attempts made before giving up.
        max_attempts: usize,
    },

    /// A participant name appears more than once.
    #[error("participant '{name}' appears more than once")]
    DuplicateParticipant {
        /// The duplicated name.
        name: String,
    },

    /// A restriction entry names a giver outside the participant list.
    #[error("restriction giver '{giver}' is not a participant")]
    UnknownRestrictionGiver {
        /// The unknown giver.
        giver: String,
    },

    /// A restriction entry names a receiver outside the participant list.
    #[error("restriction for '{giver}' names unknown receiver '{receiver}'")]
    UnknownRestrictedReceiver {
        /// Giver owning the restriction.
        giver: String,
        /// The unknown receiver.
        receiver: String,
    },
}

impl DrawError {
    /// Returns `true` when the inputs were well formed but no assignment was
    /// found, so relaxing restrictions or retrying may help.
    #[must_use]
    pub const fn is_unsatisfiable(&self) -> bool {
        matches!(self, Self::NoValidAssignmentFound { .. })
    }
}

/// Ways an assignment map can break its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentViolation {
    /// A participant has no receiver.
    #[error("participant '{giver}' has no assignment")]
    MissingGiver {
        /// Participant without an entry.
        giver: String,
    },

    /// An entry exists for someone outside the participant list.
    #[error("assignment for '{giver}' does not belong to a participant")]
    UnknownGiver {
        /// Giver outside the participant list.
        giver: String,
    },

    /// A giver is assigned to someone outside the participant list.
    #[error("'{giver}' is assigned to unknown receiver '{receiver}'")]
    UnknownReceiver {
        /// Giver with the bad entry.
        giver: String,
        /// Receiver outside the participant list.
        receiver: String,
    },

    /// A giver is assigned to themselves.
    #[error("'{giver}' is assigned to themselves")]
    SelfAssignment {
        /// Giver assigned to themselves.
        giver: String,
    },

    /// A giver is assigned to a receiver they are restricted from.
    #[error("'{giver}' is restricted from giving to '{receiver}'")]
    RestrictedPair {
        /// Giver with the restricted entry.
        giver: String,
        /// Restricted receiver.
        receiver: String,
    },

    /// A receiver appears more than once.
    #[error("'{receiver}' receives from more than one giver")]
    DuplicateReceiver {
        /// Receiver appearing more than once.
        receiver: String,
    },
}

/// Errors raised by session state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The organiser has closed registration.
    #[error("registration is closed for this session")]
    RegistrationClosed,

    /// The participant name is already taken within the session.
    #[error("participant name '{name}' is already taken")]
    DuplicateName {
        /// The name that collided.
        name: String,
    },

    /// The participant name fails validation.
    #[error("invalid participant name '{name}'")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// No participant has the given identifier.
    #[error("participant {id} not found")]
    ParticipantNotFound {
        /// Identifier that was not found.
        id: String,
    },

    /// No participant has the given name.
    #[error("'{name}' is not a participant in this session")]
    UnknownParticipant {
        /// Name that was not found.
        name: String,
    },

    /// The draw has already started and must be reset first.
    #[error("the draw has already started")]
    DrawAlreadyStarted,

    /// The draw has not started yet.
    #[error("the draw has not started")]
    DrawNotStarted,

    /// The caller did not present the session's organiser key.
    #[error("organiser key does not match this session")]
    OrganiserKeyMismatch,

    /// The participant has no assignment in the current draw.
    #[error("no assignment recorded for '{name}'")]
    NoAssignmentFor {
        /// Name without an assignment.
        name: String,
    },

    /// Assignment generation failed.
    #[error(transparent)]
    Draw(#[from] DrawError),
}

/// Errors that can occur when reading or writing session documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionFileError {
    /// The session file could not be read.
    #[error("failed to read session file at '{path}': {message}")]
    IoError {
        /// Path to the session file or directory.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// The session JSON is malformed or missing required fields.
    #[error("invalid session JSON: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
    },

    /// The session document version is not supported.
    #[error("unsupported session version: expected {expected}, found {actual}")]
    UnsupportedVersion {
        /// Expected version number.
        expected: u32,
        /// Actual version found in the document.
        actual: u32,
    },

    /// The stored assignments break the assignment invariants.
    #[error("stored assignments are invalid: {source}")]
    CorruptAssignments {
        /// The violated invariant.
        #[from]
        source: AssignmentViolation,
    },

    /// The document holds a different session than its file name says.
    #[error("session file for '{expected}' holds session '{actual}'")]
    MismatchedId {
        /// Identifier the file was looked up by.
        expected: String,
        /// Identifier stored in the document.
        actual: String,
    },

    /// Another writer held the session's lock file for too long.
    #[error("session file at '{path}' is locked by another writer")]
    Locked {
        /// Path to the lock file.
        path: Utf8PathBuf,
    },

    /// The session could not be encoded as JSON.
    #[error("failed to encode session JSON: {message}")]
    EncodeError {
        /// Description of the encoding error.
        message: String,
    },

    /// The session file could not be written.
    #[error("failed to write session file at '{path}': {message}")]
    WriteError {
        /// Path to the session file.
        path: Utf8PathBuf,
        /// Description of the write error.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_error_insufficient_formats_correctly() {
        let err = DrawError::InsufficientParticipants {
            count: 2,
            minimum: 3,
        };
        assert_eq!(
            err.to_string(),
            "at least 3 participants are required, found 2"
        );
    }

    #[test]
    fn draw_error_exhausted_formats_correctly() {
        let err = DrawError::NoValidAssignmentFound { max_attempts: 1000 };
        assert_eq!(
            err.to_string(),
            "no valid assignment found after 1000 attempts; relax the restrictions"
        );
    }

    #[test]
    fn draw_error_unknown_receiver_formats_correctly() {
        let err = DrawError::UnknownRestrictedReceiver {
            giver: "Alice".to_owned(),
            receiver: "Zed".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "restriction for 'Alice' names unknown receiver 'Zed'"
        );
    }

    #[test]
    fn only_exhaustion_is_unsatisfiable() {
        assert!(DrawError::NoValidAssignmentFound { max_attempts: 1 }.is_unsatisfiable());
        assert!(
            !DrawError::DuplicateParticipant {
                name: "Bob".to_owned()
            }
            .is_unsatisfiable()
        );
    }

    #[test]
    fn violation_restricted_pair_formats_correctly() {
        let err = AssignmentViolation::RestrictedPair {
            giver: "Alice".to_owned(),
            receiver: "Bob".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "'Alice' is restricted from giving to 'Bob'"
        );
    }

    #[test]
    fn session_error_wraps_draw_error_transparently() {
        let err = SessionError::from(DrawError::NoValidAssignmentFound { max_attempts: 5 });
        assert_eq!(
            err.to_string(),
            "no valid assignment found after 5 attempts; relax the restrictions"
        );
    }

    #[test]
    fn session_file_error_mismatched_id_formats_correctly() {
        let err = SessionFileError::MismatchedId {
            expected: "party".to_owned(),
            actual: "other".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "session file for 'party' holds session 'other'"
        );
    }

    #[test]
    fn session_file_error_version_formats_correctly() {
        let err = SessionFileError::UnsupportedVersion {
            expected: 1,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "unsupported session version: expected 1, found 2"
        );
    }

    #[test]
    fn session_file_error_io_formats_correctly() {
        let err = SessionFileError::IoError {
            path: PathBuf::from("/tmp/session.json"),
            message: "file not found".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "failed to read session file at '/tmp/session.json': file not found"
        );
    }
}
