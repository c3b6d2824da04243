//! Error types for the gift-exchange CLI.

use thiserror::Error;

use crate::error::SessionFileError;
use crate::service::ServiceError;

/// Errors surfaced by CLI parsing and command execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CliError {
    /// No command was supplied.
    #[error("missing command; run with --help for usage")]
    MissingCommand,
    /// The command name is not recognised.
    #[error("unknown command: {value}")]
    UnknownCommand {
        /// Command name that was not recognised.
        value: String,
    },
    /// A command received the wrong number of arguments.
    #[error("{command} expects {expected} argument(s), found {found}")]
    WrongArgumentCount {
        /// Command that was invoked.
        command: &'static str,
        /// Number of arguments the command takes.
        expected: usize,
        /// Number of arguments supplied.
        found: usize,
    },
    /// A command received fewer arguments than it needs.
    #[error("{command} expects at least {minimum} argument(s), found {found}")]
    TooFewArguments {
        /// Command that was invoked.
        command: &'static str,
        /// Smallest number of arguments the command takes.
        minimum: usize,
        /// Number of arguments supplied.
        found: usize,
    },
    /// The command operates on a session but none was named.
    #[error("missing required flag for {command}: --session")]
    MissingSession {
        /// Command that needs a session.
        command: &'static str,
    },
    /// An organiser command was run without the organiser key.
    #[error("missing required flag for {command}: --key")]
    MissingKey {
        /// Command reserved for the organiser.
        command: &'static str,
    },
    /// The session identifier is malformed.
    #[error("invalid session id '{value}': {message}")]
    InvalidSessionId {
        /// Raw value supplied for `--session`.
        value: String,
        /// Validation error message.
        message: String,
    },
    /// A flag expected a value but none was provided.
    #[error("missing value for {flag}")]
    MissingValue {
        /// Flag that was missing its value.
        flag: &'static str,
    },
    /// An unsupported flag was supplied.
    #[error("unknown argument: {value}")]
    UnknownArgument {
        /// Argument value that was not recognised.
        value: String,
    },
    /// A numeric value failed to parse.
    #[error("invalid number for {flag}: '{value}' ({message})")]
    InvalidNumber {
        /// Flag associated with the invalid number.
        flag: &'static str,
        /// Raw value supplied for the flag.
        value: String,
        /// Parser error message.
        message: String,
    },
    /// The session directory could not be opened.
    #[error("session store error: {source}")]
    StoreOpen {
        /// Underlying file error.
        #[from]
        #[source]
        source: SessionFileError,
    },
    /// The command was rejected or the store failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
}
