//! Guided workout session controller.
//!
//! Ties the pieces together: resolves the workout, restores or starts the
//! session, mirrors every mutation into the session slot, and hands the
//! finished session to the archive.
//!
//! ## Lifecycle
//!
//! ```text
//! Absent --start--> Active(0..N-1) --finish--> Archived
//!                      |
//!                      +--discard--> Discarded
//! ```
//!
//! The elapsed-time ticker, when running, belongs to the active session and
//! stops when that session ends.

use crate::archive::ArchiveSink;
use crate::catalog::WorkoutStore;
use crate::elapsed::ElapsedTicker;
use crate::repository::{SessionMirror, SessionRepository};
use crate::session::{ExerciseView, SessionSummary};
use crate::{
    ArchivedSession, Error, ExerciseResult, Result, SessionState, SetField, WorkoutDefinition,
};
use chrono::{DateTime, Local, Utc};
use uuid::Uuid;

/// How `start` treats a session already in the slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartMode {
    /// Resume a saved session of the same workout, otherwise start fresh
    ResumeOrFresh,
    /// Always start fresh, discarding whatever the slot holds
    Fresh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    Resumed,
}

/// Where the controller is in the session lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Absent,
    Active { index: usize, total: usize },
    Submitting,
}

pub struct WorkoutSessionController<'a> {
    store: &'a dyn WorkoutStore,
    mirror: SessionMirror<'a>,
    workout: Option<WorkoutDefinition>,
    state: Option<SessionState>,
    submission_pending: bool,
    mirrored: bool,
    ticker: Option<ElapsedTicker>,
}

impl<'a> WorkoutSessionController<'a> {
    pub fn new(store: &'a dyn WorkoutStore, repo: &'a dyn SessionRepository) -> Self {
        Self {
            store,
            mirror: SessionMirror::new(repo),
            workout: None,
            state: None,
            submission_pending: false,
            mirrored: false,
            ticker: None,
        }
    }

    /// Begin (or resume) a session of `workout_id`
    pub fn start(&mut self, workout_id: &str, mode: StartMode, now: DateTime<Utc>) -> Result<StartOutcome> {
        if self.submission_pending {
            return Err(Error::SubmissionInProgress);
        }

        let workout = match self.store.get(workout_id) {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!("Cannot start workout {}: {}", workout_id, e);
                return Err(e);
            }
        };

        let restored = match mode {
            StartMode::ResumeOrFresh => self
                .mirror
                .load(workout_id)
                .filter(|s| consistent_or_warn(s, &workout)),
            StartMode::Fresh => None,
        };

        let (state, outcome) = match restored {
            Some(state) => (state, StartOutcome::Resumed),
            None => (SessionState::initialize(&workout, now)?, StartOutcome::Started),
        };

        tracing::info!(
            "{} session {} for workout {}",
            if outcome == StartOutcome::Resumed { "Resumed" } else { "Started" },
            state.session_id,
            workout.id
        );

        self.stop_ticker();
        self.mirrored = self.mirror.save(&state);
        self.workout = Some(workout);
        self.state = Some(state);
        Ok(outcome)
    }

    /// Reattach to whatever session the slot holds, of any workout
    ///
    /// Returns `Ok(false)` when the slot is empty, or holds a session whose
    /// workout is gone or no longer fits it (that session is discarded).
    pub fn resume(&mut self) -> Result<bool> {
        let Some(state) = self.mirror.load_any() else {
            return Ok(false);
        };
        let workout = match self.store.get(&state.workout_id) {
            Ok(workout) => workout,
            Err(Error::InvalidWorkout(reason)) => {
                tracing::warn!(
                    "Saved session {} refers to a workout that is unavailable ({}); discarding",
                    state.session_id,
                    reason
                );
                self.mirror.clear();
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if !consistent_or_warn(&state, &workout) {
            self.mirror.clear();
            return Ok(false);
        }

        tracing::debug!("Reattached to session {}", state.session_id);
        self.mirrored = true;
        self.workout = Some(workout);
        self.state = Some(state);
        Ok(true)
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn workout(&self) -> Option<&WorkoutDefinition> {
        self.workout.as_ref()
    }

    /// Whether the last write to the session slot succeeded
    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn phase(&self) -> SessionPhase {
        if self.submission_pending {
            return SessionPhase::Submitting;
        }
        match &self.state {
            Some(state) => SessionPhase::Active {
                index: state.current_exercise_index,
                total: state.exercise_count(),
            },
            None => SessionPhase::Absent,
        }
    }

    pub fn current_view(&self) -> Option<ExerciseView<'_>> {
        self.state.as_ref()?.current_view(self.workout.as_ref()?)
    }

    pub fn summary(&self) -> Option<SessionSummary> {
        self.state.as_ref().map(SessionState::summary)
    }

    /// Report the active session's elapsed time to `on_tick` every `interval`
    ///
    /// Replaces any ticker already running. The ticker stops on `finish`,
    /// `discard` or `stop_ticker`.
    pub fn start_ticker<F>(&mut self, interval: std::time::Duration, on_tick: F) -> Result<()>
    where
        F: FnMut(String) + Send + 'static,
    {
        let start_time = self.state.as_ref().ok_or(Error::NoActiveSession)?.start_time;
        self.stop_ticker();
        self.ticker = Some(ElapsedTicker::start(start_time, interval, on_tick));
        Ok(())
    }

    pub fn stop_ticker(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(ElapsedTicker::is_running)
    }

    /// Move to the next exercise. Returns false at the last one.
    pub fn advance(&mut self) -> Result<bool> {
        self.mutate(|s| Ok(s.advance()))
    }

    /// Move to the previous exercise. Returns false at the first one.
    pub fn retreat(&mut self) -> Result<bool> {
        self.mutate(|s| Ok(s.retreat()))
    }

    pub fn update_set(&mut self, exercise_id: &str, set_index: usize, field: SetField) -> Result<()> {
        self.update_set_fields(exercise_id, set_index, &[field])
    }

    /// Apply several edits to one set as a single change
    ///
    /// Either every field is applied and the session saved once, or the first
    /// invalid field is reported and nothing changes.
    pub fn update_set_fields(
        &mut self,
        exercise_id: &str,
        set_index: usize,
        fields: &[SetField],
    ) -> Result<()> {
        self.mutate(|s| {
            let mut draft = s.clone();
            for field in fields {
                draft.update_set(exercise_id, set_index, *field)?;
            }
            *s = draft;
            Ok(!fields.is_empty())
        })?;
        Ok(())
    }

    /// Append a set to `exercise_id`; returns the new set count
    pub fn add_set(&mut self, exercise_id: &str) -> Result<usize> {
        let mut count = 0;
        self.mutate(|s| {
            count = s.add_set(exercise_id)?;
            Ok(true)
        })?;
        Ok(count)
    }

    /// Apply `f` to the active state and mirror it if `f` reports a change
    fn mutate<F>(&mut self, f: F) -> Result<bool>
    where
        F: FnOnce(&mut SessionState) -> Result<bool>,
    {
        if self.submission_pending {
            return Err(Error::SubmissionInProgress);
        }
        let state = self.state.as_mut().ok_or(Error::NoActiveSession)?;
        let changed = f(state)?;
        if changed {
            self.mirrored = self.mirror.save(state);
        }
        Ok(changed)
    }

    /// Package the active session for archival and mark a submission in flight
    ///
    /// Until `complete_submission` is called, further submissions and edits
    /// fail with `Error::SubmissionInProgress`.
    pub fn begin_submission(&mut self, now: DateTime<Utc>) -> Result<ArchivedSession> {
        if self.submission_pending {
            return Err(Error::SubmissionInProgress);
        }
        let (Some(state), Some(_)) = (&self.state, &self.workout) else {
            return Err(Error::NoActiveSession);
        };

        let record = ArchivedSession {
            id: Uuid::new_v4(),
            session_id: state.session_id,
            workout_id: state.workout_id.clone(),
            progress: state
                .exercise_progress
                .iter()
                .map(|(id, sets)| (id.clone(), ExerciseResult { sets: sets.clone() }))
                .collect(),
            day_of_exercise: now.with_timezone(&Local).date_naive(),
            start_time: state.start_time,
            end_time: now,
        };

        self.submission_pending = true;
        Ok(record)
    }

    /// Record the archive's answer to the in-flight submission
    ///
    /// On acknowledgment the slot and in-memory session are cleared. On
    /// failure both are kept so the submission can be retried.
    pub fn complete_submission(&mut self, ack: Result<()>) -> Result<()> {
        if !self.submission_pending {
            return Err(Error::NoActiveSession);
        }
        self.submission_pending = false;

        if let Err(e) = ack {
            tracing::error!("Failed to archive session: {}", e);
            return Err(match e {
                Error::Archive(msg) => Error::Archive(msg),
                other => Error::Archive(other.to_string()),
            });
        }

        if let Some(state) = self.state.take() {
            tracing::info!("Archived session {} ({})", state.session_id, state.workout_id);
        }
        self.stop_ticker();
        self.workout = None;
        self.mirror.clear();
        self.mirrored = false;
        Ok(())
    }

    /// Submit the active session to `archive` and clear it on success
    pub fn finish(&mut self, archive: &mut dyn ArchiveSink, now: DateTime<Utc>) -> Result<ArchivedSession> {
        let record = self.begin_submission(now)?;
        let ack = archive.submit(&record);
        self.complete_submission(ack)?;
        Ok(record)
    }

    /// Abandon the active session without archiving it
    pub fn discard(&mut self) -> Result<()> {
        if self.submission_pending {
            return Err(Error::SubmissionInProgress);
        }
        let state = self.state.take().ok_or(Error::NoActiveSession)?;
        self.stop_ticker();
        self.workout = None;
        self.mirror.clear();
        self.mirrored = false;
        tracing::info!("Discarded session {} ({})", state.session_id, state.workout_id);
        Ok(())
    }
}

fn consistent_or_warn(state: &SessionState, workout: &WorkoutDefinition) -> bool {
    let ok = state.matches_workout(workout);
    if !ok {
        tracing::warn!(
            "Saved session {} no longer matches workout {}; discarding",
            state.session_id,
            workout.id
        );
    }
    ok
}
