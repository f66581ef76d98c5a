//! Core domain types for guided workout sessions.
//!
//! This module defines the fundamental types used throughout the system:
//! - Workout and exercise definitions (read-only reference data)
//! - Per-set records and the in-progress session state
//! - Archived sessions produced on completion

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Schema version written into every persisted session record
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Definition Types
// ============================================================================

/// A single exercise within a workout, with its prescribed defaults
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub repetitions: u32,
    #[serde(default = "default_set_count")]
    pub sets: u32,
    /// Default load in kilograms
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub rest_seconds: u32,
    #[serde(default)]
    pub note: String,
}

fn default_set_count() -> u32 {
    1
}

impl ExerciseDefinition {
    /// Number of set records a fresh session allocates for this exercise
    pub fn initial_set_count(&self) -> usize {
        self.sets.max(1) as usize
    }

    /// The set record a fresh session starts from
    pub fn default_set(&self) -> SetRecord {
        SetRecord {
            completed: false,
            reps: self.repetitions,
            weight: self.weight,
        }
    }
}

/// A named workout: an ordered list of exercises
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exercises: Vec<ExerciseDefinition>,
}

/// Listing entry for a workout
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkoutSummary {
    pub id: String,
    pub name: String,
    pub exercise_count: usize,
}

// ============================================================================
// Session Types
// ============================================================================

/// Identity of one session, distinct from the workout it performs
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Completion, reps and load for one performed set
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct SetRecord {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub reps: u32,
    /// Load in kilograms, never negative
    #[serde(default)]
    pub weight: f64,
}

/// A single editable field of a set record
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SetField {
    Completed(bool),
    Reps(u32),
    Weight(f64),
}

/// In-progress state of a guided workout session
///
/// `exercise_progress` holds exactly one entry per exercise of the owning
/// workout, and `current_exercise_index` always points inside that workout.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,
    pub session_id: SessionId,
    pub workout_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub current_exercise_index: usize,
    #[serde(default)]
    pub exercise_progress: BTreeMap<String, Vec<SetRecord>>,
}

/// Records written before versioning was introduced read as version 1
fn legacy_schema_version() -> u32 {
    1
}

// ============================================================================
// Archive Types
// ============================================================================

/// Per-exercise results in an archived session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseResult {
    pub sets: Vec<SetRecord>,
}

/// A finished session, as handed to the archival store
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ArchivedSession {
    pub id: Uuid,
    pub session_id: SessionId,
    pub workout_id: String,
    pub progress: BTreeMap<String, ExerciseResult>,
    pub day_of_exercise: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ArchivedSession {
    /// Wall-clock duration of the session in whole seconds
    pub fn duration_seconds(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds().max(0)
    }

    /// Number of sets marked completed across all exercises
    pub fn completed_sets(&self) -> usize {
        self.progress
            .values()
            .flat_map(|r| r.sets.iter())
            .filter(|s| s.completed)
            .count()
    }
}
