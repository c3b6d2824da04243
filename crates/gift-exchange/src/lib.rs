//! Restriction-aware gift exchange draws.
//!
//! Given an ordered list of participant names and, for each giver, a set of
//! receivers they must not draw, this crate produces a complete
//! giver-to-receiver mapping where nobody draws themselves, every participant
//! receives exactly once, and no restriction is broken. Generation is a
//! bounded randomized retry: when the attempt budget runs out the caller gets
//! a typed error instead of a partial result.
//!
//! # Overview
//!
//! The crate supports:
//!
//! - Generating assignments with an injected or seeded random source
//! - Sessions covering registration, restrictions, draws, and reveals
//! - A storage port with in-memory and JSON file adapters and conflict-safe
//!   updates
//! - Layered configuration via `ortho_config`
//! - A `gift-exchange` command-line front end
//!
//! # Example
//!
//! ```
//! use gift_exchange::{DrawError, Restrictions, generate_seeded_assignments};
//!
//! let names: Vec<String> = ["Alice", "Bob", "Carol", "Dave"]
//!     .into_iter()
//!     .map(str::to_owned)
//!     .collect();
//! let mut restrictions = Restrictions::new();
//! restrictions.forbid("Alice", "Bob");
//!
//! let assignments = generate_seeded_assignments(&names, &restrictions, 2026)
//!     .expect("four names leave plenty of room");
//! assert_ne!(assignments.receiver_for("Alice"), Some("Bob"));
//!
//! let pair = vec!["Alice".to_owned(), "Bob".to_owned()];
//! let err = generate_seeded_assignments(&pair, &Restrictions::new(), 1)
//!     .expect_err("two names are too few");
//! assert!(matches!(err, DrawError::InsufficientParticipants { .. }));
//! ```

mod assignment;
mod atomic_io;
pub mod cli;
mod config;
mod error;
mod file_store;
mod generator;
mod restrictions;
mod service;
mod session;
mod store;
mod validation;

pub use assignment::Assignments;
pub use config::DrawSettings;
pub use error::{AssignmentViolation, DrawError, SessionError, SessionFileError};
pub use file_store::{FileSessionStore, session_from_json, session_to_json};
pub use generator::{
    AssignmentGenerator, DEFAULT_MAX_ATTEMPTS, generate_assignments, generate_seeded_assignments,
};
pub use restrictions::Restrictions;
pub use service::{DrawService, MAX_UPDATE_ATTEMPTS, ServiceError};
pub use session::{
    DrawProgress, Participant, ParticipantId, Session, SessionId, SessionIdValidationError,
    SessionStatus,
};
pub use store::{
    InMemorySessionStore, SessionFeed, SessionListener, SessionStore, StoreError, SubscriptionId,
};
pub use validation::{MIN_PARTICIPANTS, PARTICIPANT_NAME_MAX, is_valid_participant_name};
