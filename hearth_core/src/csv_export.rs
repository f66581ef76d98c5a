//! CSV export of archived sessions.
//!
//! Each performed set becomes one row so the file can be pivoted in a
//! spreadsheet without further parsing.

use crate::{ArchivedSession, Error, Result};
use std::collections::HashSet;
use std::path::Path;
use tempfile::NamedTempFile;

const HEADERS: [&str; 8] = [
    "session_id",
    "workout_id",
    "day",
    "exercise_id",
    "set",
    "completed",
    "reps",
    "weight",
];

/// A row in the CSV output
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CsvRow {
    session_id: String,
    workout_id: String,
    day: String,
    exercise_id: String,
    set: usize,
    completed: bool,
    reps: u32,
    weight: f64,
}

fn rows(session: &ArchivedSession) -> impl Iterator<Item = CsvRow> + '_ {
    session.progress.iter().flat_map(move |(exercise_id, result)| {
        result.sets.iter().enumerate().map(move |(i, set)| CsvRow {
            session_id: session.session_id.to_string(),
            workout_id: session.workout_id.clone(),
            day: session.day_of_exercise.to_string(),
            exercise_id: exercise_id.clone(),
            set: i + 1,
            completed: set.completed,
            reps: set.reps,
            weight: set.weight,
        })
    })
}

/// Write `sessions` to the CSV at `csv_path`, one row per set
///
/// The export is derived from the archive, so each call replaces the file
/// rather than appending to it. A session archived more than once is written
/// once. The new file is fsynced and renamed over the old one. Returns the
/// number of rows written.
pub fn export_sessions(sessions: &[ArchivedSession], csv_path: &Path) -> Result<usize> {
    let parent = match csv_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    let mut writer = csv::Writer::from_writer(temp.as_file());

    let mut seen = HashSet::new();
    let mut exported = 0;
    let mut count = 0;
    for session in sessions.iter().filter(|s| seen.insert(s.session_id)) {
        for row in rows(session) {
            writer.serialize(row)?;
            count += 1;
        }
        exported += 1;
    }
    if count == 0 {
        writer.write_record(HEADERS)?;
    }

    writer.flush()?;
    drop(writer);
    temp.as_file().sync_all()?;
    temp.persist(csv_path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Exported {} sets from {} sessions to {:?}", count, exported, csv_path);
    Ok(count)
}
