//! In-progress session state and its pure transitions.
//!
//! Everything here operates on a `SessionState` value in memory; mirroring
//! to durable storage is the controller's job.

use crate::types::*;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// The exercise currently on screen, re-derived from state + definition
#[derive(Clone, Debug, PartialEq)]
pub struct ExerciseView<'a> {
    pub index: usize,
    pub total: usize,
    pub exercise: &'a ExerciseDefinition,
    pub sets: &'a [SetRecord],
    pub completed_sets: usize,
}

/// Aggregate progress over the whole session
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub completed_sets: usize,
    pub total_sets: usize,
    /// Sum of reps x weight over completed sets, in kilograms
    pub volume: f64,
}

impl SessionState {
    /// Start a fresh session for `workout` at `now`.
    ///
    /// Every exercise gets `max(1, sets)` records pre-filled with its default
    /// reps and weight.
    pub fn initialize(workout: &WorkoutDefinition, now: DateTime<Utc>) -> Result<Self> {
        if workout.exercises.is_empty() {
            return Err(Error::InvalidWorkout(format!(
                "workout '{}' has no exercises",
                workout.id
            )));
        }

        let exercise_progress: BTreeMap<String, Vec<SetRecord>> = workout
            .exercises
            .iter()
            .map(|e| (e.id.clone(), vec![e.default_set(); e.initial_set_count()]))
            .collect();

        let state = Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            session_id: SessionId::new(),
            workout_id: workout.id.clone(),
            start_time: now,
            current_exercise_index: 0,
            exercise_progress,
        };

        tracing::debug!(
            "Initialized session {} for workout {}",
            state.session_id,
            workout.id
        );
        Ok(state)
    }

    /// Accept a persisted session only if it belongs to `requested_workout_id`.
    ///
    /// A mismatch discards the stale session; the caller initializes fresh.
    pub fn restore(persisted: SessionState, requested_workout_id: &str) -> Option<SessionState> {
        if persisted.workout_id == requested_workout_id {
            tracing::debug!(
                "Restored session {} for workout {}",
                persisted.session_id,
                requested_workout_id
            );
            Some(persisted)
        } else {
            tracing::info!(
                "Discarding stale session {} for workout {} (requested {})",
                persisted.session_id,
                persisted.workout_id,
                requested_workout_id
            );
            None
        }
    }

    /// Set one field of one set record
    pub fn update_set(&mut self, exercise_id: &str, set_index: usize, field: SetField) -> Result<()> {
        if let SetField::Weight(w) = field {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidValue(format!("weight must be >= 0, got {}", w)));
            }
        }

        let sets = self
            .exercise_progress
            .get_mut(exercise_id)
            .ok_or_else(|| Error::OutOfRange(format!("unknown exercise '{}'", exercise_id)))?;
        let len = sets.len();
        let set = sets.get_mut(set_index).ok_or_else(|| {
            Error::OutOfRange(format!(
                "set {} of exercise '{}' (has {})",
                set_index, exercise_id, len
            ))
        })?;

        match field {
            SetField::Completed(done) => set.completed = done,
            SetField::Reps(reps) => set.reps = reps,
            SetField::Weight(weight) => set.weight = weight,
        }
        Ok(())
    }

    /// Append a set to `exercise_id`, copying reps and weight from its first set.
    ///
    /// Returns the new number of sets for that exercise.
    pub fn add_set(&mut self, exercise_id: &str) -> Result<usize> {
        let sets = self
            .exercise_progress
            .get_mut(exercise_id)
            .ok_or_else(|| Error::OutOfRange(format!("unknown exercise '{}'", exercise_id)))?;

        let template = sets.first().map_or_else(SetRecord::default, |first| SetRecord {
            completed: false,
            reps: first.reps,
            weight: first.weight,
        });
        sets.push(template);
        Ok(sets.len())
    }

    /// Number of exercises in the session
    pub fn exercise_count(&self) -> usize {
        self.exercise_progress.len()
    }

    /// Move to the next exercise. Returns false at the last exercise.
    pub fn advance(&mut self) -> bool {
        if self.current_exercise_index + 1 < self.exercise_count() {
            self.current_exercise_index += 1;
            true
        } else {
            false
        }
    }

    /// Move to the previous exercise. Returns false at the first exercise.
    pub fn retreat(&mut self) -> bool {
        if self.current_exercise_index > 0 {
            self.current_exercise_index -= 1;
            true
        } else {
            false
        }
    }

    /// Derive the current exercise and its sets from `workout`
    pub fn current_view<'a>(&'a self, workout: &'a WorkoutDefinition) -> Option<ExerciseView<'a>> {
        let exercise = workout.exercises.get(self.current_exercise_index)?;
        let sets = self.exercise_progress.get(&exercise.id)?;
        Some(ExerciseView {
            index: self.current_exercise_index,
            total: workout.exercises.len(),
            exercise,
            sets,
            completed_sets: sets.iter().filter(|s| s.completed).count(),
        })
    }

    /// Whether this state is consistent with `workout`
    ///
    /// Checks the one-entry-per-exercise invariant and the pointer bounds.
    pub fn matches_workout(&self, workout: &WorkoutDefinition) -> bool {
        self.workout_id == workout.id
            && self.exercise_progress.len() == workout.exercises.len()
            && workout
                .exercises
                .iter()
                .all(|e| self.exercise_progress.contains_key(&e.id))
            && self.current_exercise_index < workout.exercises.len()
    }

    pub fn summary(&self) -> SessionSummary {
        let all = self.exercise_progress.values().flat_map(|s| s.iter());
        let mut summary = SessionSummary {
            completed_sets: 0,
            total_sets: 0,
            volume: 0.0,
        };
        for set in all {
            summary.total_sets += 1;
            if set.completed {
                summary.completed_sets += 1;
                summary.volume += set.reps as f64 * set.weight;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(id: &str, sets: u32, reps: u32, weight: f64) -> ExerciseDefinition {
        ExerciseDefinition {
            id: id.into(),
            name: id.to_uppercase(),
            description: String::new(),
            repetitions: reps,
            sets,
            weight,
            rest_seconds: 90,
            note: String::new(),
        }
    }

    fn workout(id: &str, exercises: Vec<ExerciseDefinition>) -> WorkoutDefinition {
        WorkoutDefinition {
            id: id.into(),
            name: id.into(),
            description: String::new(),
            exercises,
        }
    }

    fn three_exercise_state() -> (WorkoutDefinition, SessionState) {
        let w = workout(
            "w3",
            vec![
                exercise("a", 2, 5, 50.0),
                exercise("b", 3, 8, 30.0),
                exercise("c", 0, 12, 0.0),
            ],
        );
        let state = SessionState::initialize(&w, Utc::now()).unwrap();
        (w, state)
    }

    #[test]
    fn test_initialize_single_exercise_scenario() {
        let w = workout("w1", vec![exercise("e1", 3, 10, 20.0)]);
        let state = SessionState::initialize(&w, Utc::now()).unwrap();

        let sets = &state.exercise_progress["e1"];
        assert_eq!(sets.len(), 3);
        for set in sets {
            assert_eq!(
                set,
                &SetRecord {
                    completed: false,
                    reps: 10,
                    weight: 20.0
                }
            );
        }
        assert_eq!(state.current_exercise_index, 0);
        assert_eq!(state.workout_id, "w1");
        assert_eq!(state.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_initialize_allocates_at_least_one_set() {
        let (w, state) = three_exercise_state();
        assert_eq!(state.exercise_progress.len(), w.exercises.len());
        for e in &w.exercises {
            assert_eq!(state.exercise_progress[&e.id].len(), e.sets.max(1) as usize);
        }
        assert_eq!(state.exercise_progress["c"].len(), 1);
        assert!(state.matches_workout(&w));
    }

    #[test]
    fn test_initialize_rejects_empty_workout() {
        let w = workout("empty", vec![]);
        let err = SessionState::initialize(&w, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::InvalidWorkout(_)));
    }

    #[test]
    fn test_session_id_is_distinct_from_workout_id() {
        let w = workout("w1", vec![exercise("e1", 1, 1, 0.0)]);
        let s1 = SessionState::initialize(&w, Utc::now()).unwrap();
        let s2 = SessionState::initialize(&w, Utc::now()).unwrap();
        assert_ne!(s1.session_id, s2.session_id);
        assert_ne!(s1.session_id.to_string(), s1.workout_id);
    }

    #[test]
    fn test_restore_matching_workout_is_unchanged() {
        let (_, mut state) = three_exercise_state();
        state.advance();
        state.update_set("b", 1, SetField::Completed(true)).unwrap();

        let restored = SessionState::restore(state.clone(), "w3").unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_restore_mismatched_workout_is_discarded() {
        let w2 = workout("w2", vec![exercise("e1", 1, 1, 0.0)]);
        let stale = SessionState::initialize(&w2, Utc::now()).unwrap();
        assert!(SessionState::restore(stale, "w1").is_none());
    }

    #[test]
    fn test_update_set_fields() {
        let (_, mut state) = three_exercise_state();
        state.update_set("b", 2, SetField::Completed(true)).unwrap();
        state.update_set("b", 2, SetField::Reps(6)).unwrap();
        state.update_set("b", 2, SetField::Weight(32.5)).unwrap();

        assert_eq!(
            state.exercise_progress["b"][2],
            SetRecord {
                completed: true,
                reps: 6,
                weight: 32.5
            }
        );
        // Neighbours untouched
        assert!(!state.exercise_progress["b"][1].completed);
    }

    #[test]
    fn test_update_set_is_idempotent() {
        let (_, mut once) = three_exercise_state();
        let mut twice = once.clone();

        once.update_set("a", 1, SetField::Reps(7)).unwrap();
        twice.update_set("a", 1, SetField::Reps(7)).unwrap();
        twice.update_set("a", 1, SetField::Reps(7)).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_update_set_out_of_range_leaves_state_intact() {
        let (_, mut state) = three_exercise_state();
        let before = state.clone();

        assert!(matches!(
            state.update_set("missing", 0, SetField::Completed(true)),
            Err(Error::OutOfRange(_))
        ));
        assert!(matches!(
            state.update_set("a", 2, SetField::Completed(true)),
            Err(Error::OutOfRange(_))
        ));
        assert!(matches!(
            state.update_set("a", 0, SetField::Weight(-1.0)),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            state.update_set("a", 0, SetField::Weight(f64::NAN)),
            Err(Error::InvalidValue(_))
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_add_set_copies_first_set() {
        let (_, mut state) = three_exercise_state();
        state.update_set("a", 0, SetField::Reps(3)).unwrap();
        state.update_set("a", 0, SetField::Weight(55.0)).unwrap();
        state.update_set("a", 0, SetField::Completed(true)).unwrap();

        let count = state.add_set("a").unwrap();
        assert_eq!(count, 3);
        assert_eq!(
            state.exercise_progress["a"][2],
            SetRecord {
                completed: false,
                reps: 3,
                weight: 55.0
            }
        );
    }

    #[test]
    fn test_add_set_on_empty_list_uses_zero() {
        let (_, mut state) = three_exercise_state();
        state.exercise_progress.get_mut("c").unwrap().clear();

        state.add_set("c").unwrap();
        assert_eq!(state.exercise_progress["c"], vec![SetRecord::default()]);
        assert!(matches!(state.add_set("zzz"), Err(Error::OutOfRange(_))));
    }

    #[test]
    fn test_navigation_boundaries() {
        let (_, mut state) = three_exercise_state();

        assert!(!state.retreat());
        assert_eq!(state.current_exercise_index, 0);

        assert!(state.advance());
        assert!(state.advance());
        assert_eq!(state.current_exercise_index, 2);

        assert!(!state.advance());
        assert_eq!(state.current_exercise_index, 2);
    }

    #[test]
    fn test_advance_then_retreat_is_inverse_in_interior() {
        let (_, mut state) = three_exercise_state();
        state.advance();
        let before = state.current_exercise_index;

        state.advance();
        state.retreat();
        assert_eq!(state.current_exercise_index, before);

        state.retreat();
        state.advance();
        assert_eq!(state.current_exercise_index, before);
    }

    #[test]
    fn test_current_view_follows_pointer() {
        let (w, mut state) = three_exercise_state();
        state.update_set("b", 0, SetField::Completed(true)).unwrap();
        state.advance();

        let view = state.current_view(&w).unwrap();
        assert_eq!(view.index, 1);
        assert_eq!(view.total, 3);
        assert_eq!(view.exercise.id, "b");
        assert_eq!(view.sets.len(), 3);
        assert_eq!(view.completed_sets, 1);
    }

    #[test]
    fn test_summary_counts_completed_volume() {
        let (_, mut state) = three_exercise_state();
        state.update_set("a", 0, SetField::Completed(true)).unwrap();
        state.update_set("b", 0, SetField::Completed(true)).unwrap();

        let summary = state.summary();
        assert_eq!(summary.total_sets, 6);
        assert_eq!(summary.completed_sets, 2);
        assert_eq!(summary.volume, 5.0 * 50.0 + 8.0 * 30.0);
    }

    #[test]
    fn test_state_without_schema_version_reads_as_v1() {
        let (_, state) = three_exercise_state();
        let mut value = serde_json::to_value(&state).unwrap();
        value.as_object_mut().unwrap().remove("schema_version");

        let parsed: SessionState = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.schema_version, 1);
        assert_eq!(parsed.exercise_progress, state.exercise_progress);
    }
}
