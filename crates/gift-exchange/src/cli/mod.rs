//! CLI support for running gift exchange sessions from a terminal.
//!
//! The binary delegates to these functions so parsing and command execution
//! can be exercised in tests without spawning a subprocess. Sessions live in
//! a [`FileSessionStore`] directory between invocations.
//!
//! `create` prints an organiser key. Commands that edit the roster, change
//! restrictions, run or discard the draw, or show every assignment need that
//! key via `--key`.

mod error;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub use error::CliError;

use crate::config::DrawSettings;
use crate::error::SessionError;
use crate::file_store::FileSessionStore;
use crate::service::{DrawService, ServiceError};
use crate::session::{ParticipantId, Session, SessionId};

/// A session operation selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a session.
    Create {
        /// Display name of the session.
        name: String,
        /// Name of the organiser.
        organiser: String,
    },
    /// Register a participant.
    Join {
        /// Participant name.
        name: String,
    },
    /// Reveal one participant's receiver.
    Reveal {
        /// Participant name.
        name: String,
    },
    /// Report how many participants have drawn.
    Progress,
    /// An operation reserved for the holder of the organiser key.
    Organiser(OrganiserCommand),
}

/// Operations that need the session's organiser key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganiserCommand {
    /// Add a participant even when registration is closed.
    Add {
        /// Participant name.
        name: String,
    },
    /// Remove a participant before the draw.
    Remove {
        /// Participant name.
        name: String,
    },
    /// Toggle whether a participant is left out of the draw.
    Exclude {
        /// Participant name.
        name: String,
    },
    /// Open or close registration.
    Registration,
    /// Forbid `giver` from drawing `receiver`.
    Forbid {
        /// Restricted giver.
        giver: String,
        /// Receiver the giver may not draw.
        receiver: String,
    },
    /// Replace every receiver `giver` may not draw.
    Restrict {
        /// Restricted giver.
        giver: String,
        /// Receivers the giver may not draw; empty clears them.
        receivers: Vec<String>,
    },
    /// Generate assignments.
    Draw,
    /// List every assignment.
    Assignments,
    /// Discard assignments and return to setup.
    Reset,
    /// Delete the session.
    Delete,
}

impl Command {
    /// Returns the command's name as typed on the command line.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Join { .. } => "join",
            Self::Reveal { .. } => "reveal",
            Self::Progress => "progress",
            Self::Organiser(command) => command.name(),
        }
    }

    fn from_words(words: Vec<String>) -> Result<Self, CliError> {
        let mut remaining = words.into_iter();
        let command = remaining.next().ok_or(CliError::MissingCommand)?;
        let rest: Vec<String> = remaining.collect();
        match command.as_str() {
            "create" => {
                let [name, organiser] = exact_args::<2>("create", rest)?;
                Ok(Self::Create { name, organiser })
            }
            "join" => {
                let [name] = exact_args::<1>("join", rest)?;
                Ok(Self::Join { name })
            }
            "reveal" => {
                let [name] = exact_args::<1>("reveal", rest)?;
                Ok(Self::Reveal { name })
            }
            "progress" => exact_args::<0>("progress", rest).map(|[]| Self::Progress),
            _ => OrganiserCommand::from_words(command, rest).map(Self::Organiser),
        }
    }
}

impl OrganiserCommand {
    /// Returns the command's name as typed on the command line.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Exclude { .. } => "exclude",
            Self::Registration => "registration",
            Self::Forbid { .. } => "forbid",
            Self::Restrict { .. } => "restrict",
            Self::Draw => "draw",
            Self::Assignments => "assignments",
            Self::Reset => "reset",
            Self::Delete => "delete",
        }
    }

    fn from_words(command: String, rest: Vec<String>) -> Result<Self, CliError> {
        match command.as_str() {
            "add" => {
                let [name] = exact_args::<1>("add", rest)?;
                Ok(Self::Add { name })
            }
            "remove" => {
                let [name] = exact_args::<1>("remove", rest)?;
                Ok(Self::Remove { name })
            }
            "exclude" => {
                let [name] = exact_args::<1>("exclude", rest)?;
                Ok(Self::Exclude { name })
            }
            "registration" => exact_args::<0>("registration", rest).map(|[]| Self::Registration),
            "forbid" => {
                let [giver, receiver] = exact_args::<2>("forbid", rest)?;
                Ok(Self::Forbid { giver, receiver })
            }
            "restrict" => {
                let mut names = rest.into_iter();
                let giver = names.next().ok_or(CliError::TooFewArguments {
                    command: "restrict",
                    minimum: 1,
                    found: 0,
                })?;
                Ok(Self::Restrict {
                    giver,
                    receivers: names.collect(),
                })
            }
            "draw" => exact_args::<0>("draw", rest).map(|[]| Self::Draw),
            "assignments" => exact_args::<0>("assignments", rest).map(|[]| Self::Assignments),
            "reset" => exact_args::<0>("reset", rest).map(|[]| Self::Reset),
            "delete" => exact_args::<0>("delete", rest).map(|[]| Self::Delete),
            _ => Err(CliError::UnknownCommand { value: command }),
        }
    }
}

/// Parsed options for the gift-exchange CLI.
#[derive(Debug, Clone)]
pub struct Options {
    store_dir: Option<PathBuf>,
    session: Option<SessionId>,
    key: Option<String>,
    seed: Option<u64>,
    max_attempts: Option<usize>,
    command: Command,
}

impl Options {
    /// Returns the command to run.
    ///
    /// # Example
    ///
    /// ```
    /// use gift_exchange::cli::{Command, OrganiserCommand, ParseOutcome, parse_args};
    ///
    /// let args = ["--session", "party", "--key", "secret", "draw"].map(str::to_owned);
    /// let ParseOutcome::Options(options) = parse_args(args.into_iter()).expect("parse") else {
    ///     panic!("expected options");
    /// };
    ///
    /// assert_eq!(options.command(), &Command::Organiser(OrganiserCommand::Draw));
    /// assert_eq!(options.key(), Some("secret"));
    /// ```
    #[must_use]
    pub const fn command(&self) -> &Command {
        &self.command
    }

    /// Returns the session named with `--session`, if any.
    #[must_use]
    pub const fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// Returns the organiser key passed with `--key`, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Layers the command-line overrides on top of loaded settings.
    #[must_use]
    pub fn apply_to(&self, settings: DrawSettings) -> DrawSettings {
        DrawSettings {
            max_attempts: self.max_attempts.unwrap_or(settings.max_attempts),
            seed: self.seed.or(settings.seed),
            store_dir: self.store_dir.clone().or(settings.store_dir),
        }
    }
}

/// Outcome of parsing CLI arguments.
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// Show help output and exit successfully.
    Help,
    /// Continue with the parsed options.
    Options(Options),
}

/// Parses CLI arguments into options.
///
/// Flags may appear before or after the command words.
///
/// # Errors
///
/// Returns [`CliError`] when flags are unknown, values cannot be parsed, the
/// command is missing or has the wrong number of arguments, or an organiser
/// command lacks `--key`.
///
/// # Example
///
/// ```
/// use gift_exchange::cli::{ParseOutcome, parse_args};
///
/// let args = vec![
///     "--session".to_owned(),
///     "party".to_owned(),
///     "join".to_owned(),
///     "Alice".to_owned(),
/// ];
///
/// let outcome = parse_args(args.into_iter()).expect("parse args");
/// assert!(matches!(outcome, ParseOutcome::Options(_)));
/// ```
pub fn parse_args<I>(mut args: I) -> Result<ParseOutcome, CliError>
where
    I: Iterator<Item = String>,
{
    let mut store_dir: Option<PathBuf> = None;
    let mut session: Option<SessionId> = None;
    let mut key: Option<String> = None;
    let mut seed: Option<u64> = None;
    let mut max_attempts: Option<usize> = None;
    let mut words: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(ParseOutcome::Help),
            "--store" => {
                let value = next_value(&mut args, "--store")?;
                store_dir = Some(PathBuf::from(value));
            }
            "--session" => {
                let value = next_value(&mut args, "--session")?;
                session = Some(parse_session_id(value)?);
            }
            "--key" => key = Some(next_value(&mut args, "--key")?),
            "--seed" => {
                let value = next_value(&mut args, "--seed")?;
                seed = Some(parse_number(&value, "--seed")?);
            }
            "--max-attempts" => {
                let value = next_value(&mut args, "--max-attempts")?;
                max_attempts = Some(parse_number(&value, "--max-attempts")?);
            }
            _ if arg.starts_with('-') => return Err(CliError::UnknownArgument { value: arg }),
            _ => words.push(arg),
        }
    }

    let command = Command::from_words(words)?;
    if session.is_none() && !matches!(command, Command::Create { .. }) {
        return Err(CliError::MissingSession {
            command: command.name(),
        });
    }
    if key.is_none() && matches!(command, Command::Organiser(_)) {
        return Err(CliError::MissingKey {
            command: command.name(),
        });
    }

    Ok(ParseOutcome::Options(Options {
        store_dir,
        session,
        key,
        seed,
        max_attempts,
        command,
    }))
}

/// Runs the parsed command against the session directory and returns the
/// message to print.
///
/// # Errors
///
/// Returns [`CliError`] when the store cannot be opened or the command is
/// rejected.
pub fn run(options: &Options, settings: DrawSettings) -> Result<String, CliError> {
    let resolved = options.apply_to(settings);
    let store = FileSessionStore::open(&resolved.store_dir())?;
    let service = DrawService::new(Arc::new(store), resolved);
    execute(&service, options)
}

fn execute(service: &DrawService<FileSessionStore>, options: &Options) -> Result<String, CliError> {
    let message = match &options.command {
        Command::Create { name, organiser } => {
            let session = match &options.session {
                Some(id) => {
                    service.create_session_with_id(id.clone(), name, organiser, options.key())?
                }
                None => service.create_session(name, organiser)?,
            };
            format!(
                "Created session \"{}\" with id {}\nOrganiser key: {}",
                session.name(),
                session.id(),
                session.organiser_key()
            )
        }
        Command::Join { name } => {
            service.join(session_id(options)?, name)?;
            format!("{} joined the session", name.trim())
        }
        Command::Reveal { name } => {
            let receiver = service.draw_for_name(session_id(options)?, name)?;
            format!("{name} gives a gift to {receiver}")
        }
        Command::Progress => {
            let progress = service.progress(session_id(options)?)?;
            format!(
                "{} of {} participants have drawn",
                progress.drawn, progress.total
            )
        }
        Command::Organiser(command) => {
            let session = authorized_session(service, options)?;
            organise(service, &session, command)?
        }
    };
    Ok(message)
}

fn organise(
    service: &DrawService<FileSessionStore>,
    session: &Session,
    command: &OrganiserCommand,
) -> Result<String, CliError> {
    let id = session.id();
    let message = match command {
        OrganiserCommand::Add { name } => {
            service.add_participant(id, name)?;
            format!("{} was added to the session", name.trim())
        }
        OrganiserCommand::Remove { name } => {
            let removed = service.remove_participant(id, &participant_named(session, name)?)?;
            format!("{} was removed from the session", removed.name)
        }
        OrganiserCommand::Exclude { name } => {
            let participant = participant_named(session, name)?;
            if service.toggle_exclusion(id, &participant)? {
                format!("{name} is excluded from the draw")
            } else {
                format!("{name} is back in the draw")
            }
        }
        OrganiserCommand::Registration => {
            if service.toggle_registration(id)? {
                "Registration is now closed".to_owned()
            } else {
                "Registration is now open".to_owned()
            }
        }
        OrganiserCommand::Forbid { giver, receiver } => {
            service.forbid(id, giver, receiver)?;
            format!("{giver} may no longer draw {receiver}")
        }
        OrganiserCommand::Restrict { giver, receivers } => {
            service.set_restrictions(id, giver, receivers)?;
            if receivers.is_empty() {
                format!("{giver} may draw anyone")
            } else {
                format!("{giver} may not draw {}", receivers.join(", "))
            }
        }
        OrganiserCommand::Draw => {
            let assignments = service.start_draw(id)?;
            format!(
                "Drew assignments for {} participants in session {id}",
                assignments.len()
            )
        }
        OrganiserCommand::Assignments => service
            .assignments(id, session.organiser_key())?
            .iter()
            .map(|(giver, receiver)| format!("{giver} -> {receiver}"))
            .collect::<Vec<_>>()
            .join("\n"),
        OrganiserCommand::Reset => {
            service.reset(id)?;
            format!("Session {id} reset to setup")
        }
        OrganiserCommand::Delete => {
            if service.delete_session(id)? {
                format!("Deleted session {id}")
            } else {
                format!("Session {id} did not exist")
            }
        }
    };
    Ok(message)
}

fn authorized_session(
    service: &DrawService<FileSessionStore>,
    options: &Options,
) -> Result<Session, CliError> {
    let id = session_id(options)?;
    let key = options.key().ok_or(CliError::MissingKey {
        command: options.command.name(),
    })?;
    Ok(service.authorize_organiser(id, key)?)
}

fn participant_named(session: &Session, name: &str) -> Result<ParticipantId, CliError> {
    session
        .participant_by_name(name.trim())
        .map(|participant| participant.id)
        .ok_or_else(|| {
            ServiceError::Session(SessionError::UnknownParticipant {
                name: name.to_owned(),
            })
            .into()
        })
}

fn session_id(options: &Options) -> Result<&SessionId, CliError> {
    options.session.as_ref().ok_or(CliError::MissingSession {
        command: options.command.name(),
    })
}

/// Usage text printed for `--help`.
#[must_use]
pub const fn usage() -> &'static str {
    concat!(
        "Usage: gift-exchange [options] <command> [args]\n",
        "\n",
        "Commands:\n",
        "  create <name> <organiser>   Create a session and print its organiser key\n",
        "                              (uses --session and --key if given)\n",
        "  join <name>                 Register a participant\n",
        "  reveal <name>               Show who <name> gives a gift to\n",
        "  progress                    Show how many participants have drawn\n",
        "\n",
        "Organiser commands (need --key):\n",
        "  add <name>                  Add a participant even when registration is closed\n",
        "  remove <name>               Remove a participant before the draw\n",
        "  exclude <name>              Toggle leaving <name> out of the draw\n",
        "  registration                Open or close registration\n",
        "  forbid <giver> <receiver>   Stop <giver> from drawing <receiver>\n",
        "  restrict <giver> [names]    Replace who <giver> may not draw\n",
        "  draw                        Generate assignments\n",
        "  assignments                 List every assignment\n",
        "  reset                       Discard assignments and return to setup\n",
        "  delete                      Delete the session\n",
        "\n",
        "Options:\n",
        "  --store <dir>          Directory holding session files (defaults to ./sessions)\n",
        "  --session <id>         Session to operate on\n",
        "  --key <key>            Organiser key printed by create\n",
        "  --seed <seed>          RNG seed for reproducible draws\n",
        "  --max-attempts <n>     Attempts before a draw is reported as unsatisfiable\n",
        "  -h, --help             Print this help output\n",
    )
}

fn exact_args<const N: usize>(
    command: &'static str,
    rest: Vec<String>,
) -> Result<[String; N], CliError> {
    let found = rest.len();
    rest.try_into().map_err(|_| CliError::WrongArgumentCount {
        command,
        expected: N,
        found,
    })
}

fn parse_session_id(value: String) -> Result<SessionId, CliError> {
    SessionId::new(value.clone()).map_err(|err| CliError::InvalidSessionId {
        value,
        message: err.to_string(),
    })
}

fn next_value<I>(args: &mut I, flag: &'static str) -> Result<String, CliError>
where
    I: Iterator<Item = String>,
{
    args.next().ok_or(CliError::MissingValue { flag })
}

fn parse_number<T>(value: &str, flag: &'static str) -> Result<T, CliError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.parse::<T>().map_err(|err| CliError::InvalidNumber {
        flag,
        value: value.to_owned(),
        message: err.to_string(),
    })
}
