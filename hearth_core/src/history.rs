//! Session history loading over a trailing window of days.

use crate::{ArchivedSession, Error, Result};
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::path::Path;

/// Load archived sessions that ended within the last `days` days
///
/// Returns sessions sorted by end time (newest first). A session submitted
/// twice (same session id) is reported once. `days` must be positive; a
/// window reaching past the earliest representable time covers everything.
pub fn load_recent_sessions(archive_path: &Path, days: i64) -> Result<Vec<ArchivedSession>> {
    if days <= 0 {
        return Err(Error::InvalidValue(format!(
            "history window must be a positive number of days, got {}",
            days
        )));
    }
    let cutoff = Duration::try_days(days).and_then(|span| Utc::now().checked_sub_signed(span));

    let mut sessions: Vec<_> = dedup_sessions(crate::archive::read_archive(archive_path)?)
        .into_iter()
        .filter(|s| cutoff.map_or(true, |cutoff| s.end_time >= cutoff))
        .collect();

    sessions.sort_by(|a, b| b.end_time.cmp(&a.end_time));

    tracing::info!(
        "Loaded {} sessions from last {} days",
        sessions.len(),
        days
    );
    Ok(sessions)
}

/// Keep the first record of each session id, preserving archive order
pub fn dedup_sessions(sessions: Vec<ArchivedSession>) -> Vec<ArchivedSession> {
    let mut seen = HashSet::new();
    sessions
        .into_iter()
        .filter(|s| seen.insert(s.session_id))
        .collect()
}

/// Find the most recent session of a given workout
pub fn find_last_session_for_workout<'a>(
    sessions: &'a [ArchivedSession],
    workout_id: &str,
) -> Option<&'a ArchivedSession> {
    // Sessions should already be sorted newest first
    sessions.iter().find(|s| s.workout_id == workout_id)
}
