//! Archival store for finished sessions.
//!
//! Finished sessions are appended to a JSONL (JSON Lines) file with file
//! locking to ensure safe concurrent access.

use crate::{ArchivedSession, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Destination for finished sessions
pub trait ArchiveSink {
    /// Durably record `session`. `Ok` is the acknowledgment.
    fn submit(&mut self, session: &ArchivedSession) -> Result<()>;
}

/// JSONL-based archive with file locking
pub struct JsonlArchive {
    path: PathBuf,
}

impl JsonlArchive {
    /// Create a new JSONL archive for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl ArchiveSink for JsonlArchive {
    fn submit(&mut self, session: &ArchivedSession) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut line = serde_json::to_string(session)?;
        line.push('\n');
        // Terminate a partial line left by an interrupted write
        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            (&file).seek(SeekFrom::End(-1))?;
            (&file).read_exact(&mut last)?;
            if last[0] != b'\n' {
                line.insert(0, '\n');
            }
        }
        {
            let mut writer = std::io::BufWriter::new(&file);
            writer.write_all(line.as_bytes())?;
            writer.flush()?;
        }
        file.sync_data()?;
        file.unlock()?;

        tracing::debug!(
            "Archived session {} ({}) to {:?}",
            session.session_id,
            session.workout_id,
            self.path
        );
        Ok(())
    }
}

/// Read all archived sessions from a JSONL file
///
/// Malformed lines are logged and skipped.
pub fn read_archive(path: &Path) -> Result<Vec<ArchivedSession>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut sessions = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ArchivedSession>(&line) {
            Ok(session) => sessions.push(session),
            Err(e) => {
                tracing::warn!("Failed to parse archived session at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} archived sessions", sessions.len());
    Ok(sessions)
}

/// Archive that keeps sessions in memory
///
/// `fail_next` rejects the following submissions until cleared.
#[derive(Default)]
pub struct MemoryArchive {
    pub sessions: Vec<ArchivedSession>,
    pub fail_next: bool,
}

impl ArchiveSink for MemoryArchive {
    fn submit(&mut self, session: &ArchivedSession) -> Result<()> {
        if self.fail_next {
            return Err(crate::Error::Archive("archive unavailable".into()));
        }
        self.sessions.push(session.clone());
        Ok(())
    }
}
