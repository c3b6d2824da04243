//! JSON file adapter for the session store port.
//!
//! Each session lives in `<session-id>.json` inside one directory. Documents
//! carry a `version` field so the layout can evolve, and stored assignments
//! are re-verified on load. Writes hold a `.lock` sibling of the document so
//! conditional saves from several processes cannot interleave.

use std::io;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use serde::{Deserialize, Serialize};

use crate::atomic_io::{WriteLock, write_atomic};
use crate::error::SessionFileError;
use crate::session::{Session, SessionId};
use crate::store::{SessionStore, StoreError};

/// Current supported session document version.
const SUPPORTED_VERSION: u32 = 1;

/// Parses a session document.
///
/// # Errors
///
/// Returns [`SessionFileError`] if:
/// - The JSON is malformed or missing required fields
/// - The version is unsupported
/// - Stored assignments break the assignment invariants or name people who
///   are not participants
///
/// # Example
///
/// ```
/// use gift_exchange::session_from_json;
///
/// let json = r#"{
///     "version": 1,
///     "id": "office-party",
///     "name": "Office party",
///     "createdBy": "Dana",
///     "participants": [
///         {"id": "3fa85f64-5717-4562-b3fc-2c963f66afa6", "name": "Alice"}
///     ],
///     "restrictions": {"Alice": ["Bob"]}
/// }"#;
///
/// let session = session_from_json(json).expect("valid session");
/// assert_eq!(session.participants().len(), 1);
/// ```
pub fn session_from_json(json: &str) -> Result<Session, SessionFileError> {
    let raw: RawSessionDocument =
        serde_json::from_str(json).map_err(|e| SessionFileError::ParseError {
            message: e.to_string(),
        })?;

    if raw.version != SUPPORTED_VERSION {
        return Err(SessionFileError::UnsupportedVersion {
            expected: SUPPORTED_VERSION,
            actual: raw.version,
        });
    }

    raw.session.verify_assignments()?;
    Ok(raw.session)
}

/// Serialises a session as a versioned, pretty-printed document.
///
/// # Errors
///
/// Returns [`SessionFileError::EncodeError`] if serialisation fails.
pub fn session_to_json(session: &Session) -> Result<String, SessionFileError> {
    let document = SessionDocument {
        version: SUPPORTED_VERSION,
        session,
    };
    serde_json::to_string_pretty(&document).map_err(|e| SessionFileError::EncodeError {
        message: e.to_string(),
    })
}

/// Session store keeping one JSON document per session in a directory.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// use gift_exchange::{FileSessionStore, Session, SessionStore};
///
/// let store = FileSessionStore::open(Path::new("sessions")).expect("open store");
/// let session = Session::new("Office party", "Dana");
/// store.save(&session).expect("save");
/// assert!(store.load(session.id()).expect("load").is_some());
/// ```
pub struct FileSessionStore {
    root: PathBuf,
    dir: Dir,
}

impl FileSessionStore {
    /// Opens (creating if needed) the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionFileError::IoError`] if the directory cannot be
    /// created or opened.
    pub fn open(path: &Path) -> Result<Self, SessionFileError> {
        let io_error = |err: io::Error| SessionFileError::IoError {
            path: path.to_path_buf(),
            message: err.to_string(),
        };
        Dir::create_ambient_dir_all(path, ambient_authority()).map_err(io_error)?;
        let dir = Dir::open_ambient_dir(path, ambient_authority()).map_err(io_error)?;
        Ok(Self {
            root: path.to_path_buf(),
            dir,
        })
    }

    /// Returns the directory this store writes to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads one session document, returning `None` if no file exists.
    ///
    /// # Errors
    ///
    /// Returns [`SessionFileError`] when the file cannot be read or parsed,
    /// or [`SessionFileError::MismatchedId`] when it holds another session.
    pub fn read_session(&self, id: &SessionId) -> Result<Option<Session>, SessionFileError> {
        let file_name = file_name_for(id);
        match self.dir.read_to_string(&file_name) {
            Ok(contents) => {
                let session = session_from_json(&contents)?;
                if session.id() != id {
                    return Err(SessionFileError::MismatchedId {
                        expected: id.to_string(),
                        actual: session.id().to_string(),
                    });
                }
                Ok(Some(session))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(SessionFileError::IoError {
                path: self.root.join(&file_name),
                message: err.to_string(),
            }),
        }
    }

    /// Writes one session document atomically.
    ///
    /// # Errors
    ///
    /// Returns [`SessionFileError`] when encoding or writing fails.
    pub fn write_session(&self, session: &Session) -> Result<(), SessionFileError> {
        let file_name = file_name_for(session.id());
        let _lock = WriteLock::acquire(&self.dir, &file_name)?;
        self.write_unlocked(session, &file_name)
    }

    /// Writes `session` only if the stored copy is still at
    /// `expected_revision`, holding the document's lock throughout.
    ///
    /// Returns `false` without writing when the revision moved on or the
    /// document is missing.
    ///
    /// # Errors
    ///
    /// Returns [`SessionFileError`] when the lock cannot be taken or the
    /// document cannot be read or written.
    pub fn write_session_if_unchanged(
        &self,
        session: &Session,
        expected_revision: u64,
    ) -> Result<bool, SessionFileError> {
        let file_name = file_name_for(session.id());
        let _lock = WriteLock::acquire(&self.dir, &file_name)?;
        let current = self.read_session(session.id())?.map(|s| s.revision());
        if current != Some(expected_revision) {
            return Ok(false);
        }
        self.write_unlocked(session, &file_name)?;
        Ok(true)
    }

    fn write_unlocked(
        &self,
        session: &Session,
        file_name: &Utf8Path,
    ) -> Result<(), SessionFileError> {
        let contents = session_to_json(session)?;
        write_atomic(&self.dir, file_name, &contents)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        self.read_session(id).map_err(StoreError::from)
    }

    fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.write_session(session).map_err(StoreError::from)
    }

    fn save_if_unchanged(
        &self,
        session: &Session,
        expected_revision: u64,
    ) -> Result<bool, StoreError> {
        self.write_session_if_unchanged(session, expected_revision)
            .map_err(StoreError::from)
    }

    fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        match self.dir.remove_file(file_name_for(id)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::Query {
                message: err.to_string(),
            }),
        }
    }
}

impl From<SessionFileError> for StoreError {
    fn from(err: SessionFileError) -> Self {
        let message = err.to_string();
        match err {
            SessionFileError::IoError { .. }
            | SessionFileError::WriteError { .. }
            | SessionFileError::Locked { .. }
            | SessionFileError::EncodeError { .. } => Self::Query { message },
            SessionFileError::ParseError { .. }
            | SessionFileError::UnsupportedVersion { .. }
            | SessionFileError::MismatchedId { .. }
            | SessionFileError::CorruptAssignments { .. } => Self::Corrupt { message },
        }
    }
}

fn file_name_for(id: &SessionId) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{id}.json"))
}

/// Borrowed JSON representation for serialisation.
#[derive(Serialize)]
struct SessionDocument<'a> {
    version: u32,
    #[serde(flatten)]
    session: &'a Session,
}

/// Raw JSON representation for deserialisation.
#[derive(Deserialize)]
struct RawSessionDocument {
    version: u32,
    #[serde(flatten)]
    session: Session,
}

#[cfg(test)]
mod tests {
    //! Unit tests for session documents and the file store.

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::error::AssignmentViolation;
    use crate::generator::AssignmentGenerator;

    struct StoreFixture {
        store: FileSessionStore,
    }

    impl Drop for StoreFixture {
        fn drop(&mut self) {
            drop(std::fs::remove_dir_all(self.store.root()));
        }
    }

    #[fixture]
    fn fixture() -> StoreFixture {
        let root = PathBuf::from("target")
            .join("gift-exchange-unit")
            .join(SessionId::random().as_str());
        StoreFixture {
            store: FileSessionStore::open(&root).expect("open store"),
        }
    }

    fn drawn_session() -> Session {
        let mut session =
            Session::with_id(SessionId::new("office-party").expect("id"), "Office party", "Dana");
        for name in ["Alice", "Bob", "Carol"] {
            session.join(name).expect("join");
        }
        session
            .start_draw(
                &AssignmentGenerator::new(),
                &mut ChaCha8Rng::seed_from_u64(3),
            )
            .expect("draw");
        session
    }

    #[test]
    fn documents_round_trip() {
        let session = drawn_session();
        let json = session_to_json(&session).expect("encode");

        assert!(json.contains("\"version\": 1"));
        assert_eq!(session_from_json(&json), Ok(session));
    }

    #[rstest]
    #[case::malformed_json("not valid json")]
    #[case::missing_version(r#"{"id": "a", "name": "n", "createdBy": "c"}"#)]
    #[case::bad_session_id(r#"{"version": 1, "id": "a/b", "name": "n", "createdBy": "c"}"#)]
    fn rejects_unparseable_documents(#[case] json: &str) {
        assert!(matches!(
            session_from_json(json),
            Err(SessionFileError::ParseError { .. })
        ));
    }

    #[test]
    fn rejects_unsupported_versions() {
        let json = r#"{"version": 99, "id": "a", "name": "n", "createdBy": "c"}"#;
        assert_eq!(
            session_from_json(json),
            Err(SessionFileError::UnsupportedVersion {
                expected: 1,
                actual: 99
            })
        );
    }

    #[test]
    fn rejects_self_assignments_in_stored_documents() {
        let json = r#"{
            "version": 1, "id": "a", "name": "n", "createdBy": "c", "status": "drawing",
            "assignments": {"Alice": "Alice", "Bob": "Carol", "Carol": "Bob"}
        }"#;
        assert_eq!(
            session_from_json(json),
            Err(SessionFileError::CorruptAssignments {
                source: AssignmentViolation::SelfAssignment {
                    giver: "Alice".to_owned()
                }
            })
        );
    }

    #[rstest]
    fn store_saves_loads_and_deletes(fixture: StoreFixture) {
        let session = drawn_session();

        fixture.store.save(&session).expect("save");
        assert_eq!(fixture.store.load(session.id()), Ok(Some(session.clone())));

        assert_eq!(fixture.store.delete(session.id()), Ok(true));
        assert_eq!(fixture.store.delete(session.id()), Ok(false));
        assert_eq!(fixture.store.load(session.id()), Ok(None));
    }

    #[rstest]
    fn conditional_writes_compare_revisions(fixture: StoreFixture) {
        let session = drawn_session();
        fixture.store.save(&session).expect("save");
        let mut updated = session.clone();
        updated.advance_revision();
        updated.join("Dave").expect("join");

        assert_eq!(fixture.store.save_if_unchanged(&updated, 1), Ok(false));
        assert_eq!(fixture.store.save_if_unchanged(&updated, 0), Ok(true));
        assert_eq!(fixture.store.save_if_unchanged(&session, 0), Ok(false));
        assert_eq!(fixture.store.load(session.id()), Ok(Some(updated)));
    }

    #[rstest]
    fn renamed_documents_are_rejected(fixture: StoreFixture) {
        let session = drawn_session();
        fixture.store.save(&session).expect("save");
        std::fs::rename(
            fixture.store.root().join("office-party.json"),
            fixture.store.root().join("someone-else.json"),
        )
        .expect("rename document");
        let requested = SessionId::new("someone-else").expect("id");

        assert_eq!(
            fixture.store.read_session(&requested),
            Err(SessionFileError::MismatchedId {
                expected: "someone-else".to_owned(),
                actual: "office-party".to_owned(),
            })
        );
        assert!(matches!(
            fixture.store.load(&requested),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn rejects_assignments_naming_non_participants() {
        let json = r#"{
            "version": 1, "id": "a", "name": "n", "createdBy": "c", "status": "drawing",
            "assignments": {"Alice": "Bob", "Bob": "Carol", "Carol": "Alice"}
        }"#;
        assert_eq!(
            session_from_json(json),
            Err(SessionFileError::CorruptAssignments {
                source: AssignmentViolation::UnknownGiver {
                    giver: "Alice".to_owned()
                }
            })
        );
    }

    #[test]
    fn corrupt_file_errors_map_to_corrupt_store_errors() {
        let err = StoreError::from(SessionFileError::ParseError {
            message: "eof".to_owned(),
        });
        assert_eq!(
            err,
            StoreError::Corrupt {
                message: "invalid session JSON: eof".to_owned()
            }
        );
    }
}
