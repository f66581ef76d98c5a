//! Durable single-slot storage for the in-progress session.
//!
//! The slot holds at most one `SessionState`. `FileSessionRepository` keeps it
//! in a JSON file replaced atomically, with reads and writes serialized
//! through a lock on a sidecar `.lock` file;
//! `MemorySessionRepository` is the in-process equivalent.

use crate::{Error, Result, SessionState, CURRENT_SCHEMA_VERSION};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Single-key get/put/delete contract for the session slot
pub trait SessionRepository {
    /// Read the slot. `Ok(None)` if it is empty.
    fn get(&self) -> Result<Option<SessionState>>;

    /// Overwrite the slot with `state`
    fn put(&self, state: &SessionState) -> Result<()>;

    /// Empty the slot. Deleting an empty slot is not an error.
    fn delete(&self) -> Result<()>;
}

/// Session slot backed by a single JSON file
pub struct FileSessionRepository {
    path: PathBuf,
}

impl FileSessionRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sidecar file that readers and writers lock
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn open_lock(&self) -> Result<File> {
        Ok(OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(self.lock_path())?)
    }
}

impl SessionRepository for FileSessionRepository {
    /// Load the slot with shared locking
    ///
    /// A missing file is an empty slot. A corrupted file, or one written by a
    /// newer schema, logs a warning and also reads as empty.
    fn get(&self) -> Result<Option<SessionState>> {
        if !self.path.exists() {
            tracing::debug!("No session slot at {:?}", self.path);
            return Ok(None);
        }

        let lock = self.open_lock()?;
        lock.lock_shared()?;

        let mut contents = String::new();
        let read = File::open(&self.path)
            .and_then(|file| std::io::BufReader::new(file).read_to_string(&mut contents));
        let _ = lock.unlock();
        match read {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let state = match serde_json::from_str::<SessionState>(&contents) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    "Failed to parse session slot {:?}: {}. Treating as empty.",
                    self.path,
                    e
                );
                return Ok(None);
            }
        };

        if state.schema_version > CURRENT_SCHEMA_VERSION {
            tracing::warn!(
                "Session slot {:?} has schema version {} (supported: {}). Treating as empty.",
                self.path,
                state.schema_version,
                CURRENT_SCHEMA_VERSION
            );
            return Ok(None);
        }

        tracing::debug!("Loaded session {} from {:?}", state.session_id, self.path);
        Ok(Some(state))
    }

    /// Atomically replace the slot: temp file, fsync, rename
    fn put(&self, state: &SessionState) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::State(format!("slot path {:?} has no parent", self.path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, state)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;

        let lock = self.open_lock()?;
        lock.lock_exclusive()?;
        let persisted = temp.persist(&self.path).map_err(|e| Error::Io(e.error));
        let _ = lock.unlock();
        persisted?;

        tracing::debug!("Saved session {} to {:?}", state.session_id, self.path);
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let lock = self.open_lock()?;
        lock.lock_exclusive()?;
        let removed = std::fs::remove_file(&self.path);
        let _ = lock.unlock();

        match removed {
            Ok(()) => {
                tracing::debug!("Cleared session slot {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory session slot
///
/// `set_failing(true)` makes every operation return an IO error, which lets
/// callers exercise the degraded path.
#[derive(Default)]
pub struct MemorySessionRepository {
    slot: Mutex<Option<SessionState>>,
    failing: AtomicBool,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "session slot unavailable",
            )));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<SessionState>>> {
        self.slot
            .lock()
            .map_err(|_| Error::State("session slot lock poisoned".into()))
    }
}

impl SessionRepository for MemorySessionRepository {
    fn get(&self) -> Result<Option<SessionState>> {
        self.check()?;
        Ok(self.lock()?.clone())
    }

    fn put(&self, state: &SessionState) -> Result<()> {
        self.check()?;
        *self.lock()? = Some(state.clone());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        self.check()?;
        *self.lock()? = None;
        Ok(())
    }
}

/// Mirrors in-memory session state into a repository
///
/// Storage failures are logged and absorbed: losing the mirror only costs the
/// ability to resume, so the session keeps running in memory.
pub struct SessionMirror<'a> {
    repo: &'a dyn SessionRepository,
}

impl<'a> SessionMirror<'a> {
    pub fn new(repo: &'a dyn SessionRepository) -> Self {
        Self { repo }
    }

    /// Write `state` to the slot. Returns false if the write failed.
    pub fn save(&self, state: &SessionState) -> bool {
        match self.repo.put(state) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Unable to mirror session {}: {}. Continuing in memory.",
                    state.session_id,
                    e
                );
                false
            }
        }
    }

    /// Read the slot and accept it only if it belongs to `workout_id`
    pub fn load(&self, workout_id: &str) -> Option<SessionState> {
        SessionState::restore(self.load_any()?, workout_id)
    }

    /// Read whatever session the slot holds
    pub fn load_any(&self) -> Option<SessionState> {
        match self.repo.get() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Unable to read session slot: {}. Starting without it.", e);
                None
            }
        }
    }

    /// Empty the slot. Returns false if the delete failed.
    pub fn clear(&self) -> bool {
        match self.repo.delete() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Unable to clear session slot: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExerciseDefinition, SetField, WorkoutDefinition};
    use chrono::Utc;

    fn test_state(workout_id: &str) -> SessionState {
        let workout = WorkoutDefinition {
            id: workout_id.into(),
            name: "Test".into(),
            description: String::new(),
            exercises: vec![ExerciseDefinition {
                id: "e1".into(),
                name: "E1".into(),
                description: String::new(),
                repetitions: 10,
                sets: 3,
                weight: 20.0,
                rest_seconds: 60,
                note: String::new(),
            }],
        };
        SessionState::initialize(&workout, Utc::now()).unwrap()
    }

    #[test]
    fn test_file_put_and_get_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = FileSessionRepository::new(temp_dir.path().join("session.json"));

        let mut state = test_state("w1");
        state.update_set("e1", 1, SetField::Completed(true)).unwrap();
        repo.put(&state).unwrap();

        let loaded = repo.get().unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_file_get_missing_is_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = FileSessionRepository::new(temp_dir.path().join("nope.json"));
        assert!(repo.get().unwrap().is_none());
    }

    #[test]
    fn test_file_corrupted_slot_reads_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("session.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        let repo = FileSessionRepository::new(&path);
        assert!(repo.get().unwrap().is_none());
    }

    #[test]
    fn test_file_newer_schema_reads_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = FileSessionRepository::new(temp_dir.path().join("session.json"));

        let mut state = test_state("w1");
        state.schema_version = CURRENT_SCHEMA_VERSION + 1;
        repo.put(&state).unwrap();

        assert!(repo.get().unwrap().is_none());
    }

    #[test]
    fn test_file_put_overwrites_and_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = FileSessionRepository::new(temp_dir.path().join("session.json"));

        repo.put(&test_state("w1")).unwrap();
        let second = test_state("w2");
        repo.put(&second).unwrap();

        assert_eq!(repo.get().unwrap().unwrap().workout_id, "w2");
        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "session.json" && e.file_name() != "session.json.lock")
            .collect();
        assert!(extras.is_empty(), "Found stray files: {:?}", extras);
    }

    #[test]
    fn test_writer_waits_for_reader_lock() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = FileSessionRepository::new(temp_dir.path().join("session.json"));
        repo.put(&test_state("w1")).unwrap();

        // Hold the lock the way a concurrent reader would
        let held = File::open(repo.lock_path()).unwrap();
        held.lock_shared().unwrap();
        assert!(repo.open_lock().unwrap().try_lock_exclusive().is_err());

        let path = repo.path().to_path_buf();
        let writer = std::thread::spawn(move || {
            FileSessionRepository::new(path).put(&test_state("w2")).unwrap();
        });
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(repo.get().unwrap().unwrap().workout_id, "w1");

        held.unlock().unwrap();
        writer.join().unwrap();
        assert_eq!(repo.get().unwrap().unwrap().workout_id, "w2");
    }

    #[test]
    fn test_file_delete_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = FileSessionRepository::new(temp_dir.path().join("session.json"));

        repo.put(&test_state("w1")).unwrap();
        repo.delete().unwrap();
        repo.delete().unwrap();
        assert!(repo.get().unwrap().is_none());
        assert!(!repo.path().exists());
    }

    #[test]
    fn test_mirror_load_discards_other_workout() {
        let repo = MemorySessionRepository::new();
        let mirror = SessionMirror::new(&repo);

        assert!(mirror.save(&test_state("w2")));
        assert!(mirror.load("w1").is_none());
        assert_eq!(mirror.load("w2").unwrap().workout_id, "w2");
    }

    #[test]
    fn test_mirror_degrades_on_failure() {
        let repo = MemorySessionRepository::new();
        let mirror = SessionMirror::new(&repo);
        repo.set_failing(true);

        assert!(!mirror.save(&test_state("w1")));
        assert!(mirror.load("w1").is_none());
        assert!(!mirror.clear());

        repo.set_failing(false);
        assert!(mirror.save(&test_state("w1")));
        assert!(mirror.clear());
        assert!(mirror.load_any().is_none());
    }
}
