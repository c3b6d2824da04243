//! Temp-file-and-rename writes for session documents.
//!
//! A session file is either the previous document or the new one; readers
//! never see a torn write. Writers that must read before they write hold a
//! [`WriteLock`] on the document for the whole cycle.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use camino::{Utf8Component, Utf8Path};
use cap_std::fs::{Dir, OpenOptions};
use tracing::debug;

use crate::error::SessionFileError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How often a writer polls for a held lock before giving up.
const LOCK_ATTEMPTS: u32 = 200;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Exclusive hold on one document, backed by a hidden `.lock` sibling file.
///
/// The lock file is created with `create_new`, so only one writer across
/// threads and processes can hold it. Dropping the guard removes the file.
pub(crate) struct WriteLock<'a> {
    dir: &'a Dir,
    lock_name: String,
}

impl<'a> WriteLock<'a> {
    /// Takes the lock for `path`, polling while another writer holds it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionFileError::Locked`] if the lock stays held, or
    /// [`SessionFileError::WriteError`] if the lock file cannot be created.
    pub(crate) fn acquire(dir: &'a Dir, path: &Utf8Path) -> Result<Self, SessionFileError> {
        Self::acquire_within(dir, path, LOCK_ATTEMPTS)
    }

    fn acquire_within(
        dir: &'a Dir,
        path: &Utf8Path,
        attempts: u32,
    ) -> Result<Self, SessionFileError> {
        let file_name = bare_file_name(path)?;
        let lock_name = format!(".{file_name}.lock");
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);

        for attempt in 1..=attempts {
            match dir.open_with(&lock_name, &options) {
                Ok(_) => return Ok(Self { dir, lock_name }),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(lock = %lock_name, attempt, "session file busy");
                    if attempt < attempts {
                        thread::sleep(LOCK_RETRY_DELAY);
                    }
                }
                Err(err) => return Err(write_error(&path.with_file_name(&lock_name), err)),
            }
        }
        Err(SessionFileError::Locked {
            path: path.with_file_name(&lock_name),
        })
    }
}

impl Drop for WriteLock<'_> {
    fn drop(&mut self) {
        discard(self.dir, &self.lock_name);
    }
}

/// Writes `contents` to `path` inside `dir` via a hidden sibling temp file.
///
/// `path` must be a bare file name; the temp file is created with
/// `create_new` and removed again if any step fails.
///
/// # Errors
///
/// Returns [`SessionFileError::WriteError`] if the path is not a file name or
/// the temp file cannot be written, synced, or renamed into place.
pub(crate) fn write_atomic(
    dir: &Dir,
    path: &Utf8Path,
    contents: &str,
) -> Result<(), SessionFileError> {
    let file_name = bare_file_name(path)?;
    let tmp_name = temp_name_for(file_name);
    if let Err(err) = write_and_sync(dir, &tmp_name, contents) {
        discard(dir, &tmp_name);
        return Err(write_error(&path.with_file_name(&tmp_name), err));
    }
    if let Err(err) = replace(dir, &tmp_name, file_name) {
        discard(dir, &tmp_name);
        return Err(write_error(path, err));
    }

    // Directory sync is best effort; the rename has already landed.
    if let Ok(handle) = dir.open(".") {
        drop(handle.sync_all());
    }
    Ok(())
}

fn bare_file_name(path: &Utf8Path) -> Result<&str, SessionFileError> {
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Utf8Component::Normal(file_name)), None) => Ok(file_name),
        _ => Err(write_error(path, "session path must be a file name")),
    }
}

fn temp_name_for(file_name: &str) -> String {
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    format!(".{file_name}.tmp.{}.{nanos}.{counter}", std::process::id())
}

fn write_and_sync(dir: &Dir, tmp_name: &str, contents: &str) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    let mut file = dir.open_with(tmp_name, &options)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

#[cfg(windows)]
fn replace(dir: &Dir, tmp_name: &str, target_name: &str) -> io::Result<()> {
    // Windows rename refuses to overwrite an existing target.
    match dir.remove_file(target_name) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    dir.rename(tmp_name, dir, target_name)
}

#[cfg(not(windows))]
fn replace(dir: &Dir, tmp_name: &str, target_name: &str) -> io::Result<()> {
    dir.rename(tmp_name, dir, target_name)
}

fn discard(dir: &Dir, tmp_name: &str) {
    drop(dir.remove_file(tmp_name));
}

fn write_error(path: &Utf8Path, err: impl Display) -> SessionFileError {
    SessionFileError::WriteError {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
