//! Workout definition store.
//!
//! Provides the built-in workouts plus user-defined workouts loaded from
//! TOML files, and the `WorkoutStore` lookup used when a session starts.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Read-only lookup of workout definitions
pub trait WorkoutStore {
    /// Resolve a workout by id.
    ///
    /// Fails with `Error::InvalidWorkout` if the id is unknown or the workout
    /// has no exercises.
    fn get(&self, id: &str) -> Result<WorkoutDefinition>;

    /// List all known workouts, ordered by id
    fn list(&self) -> Vec<WorkoutSummary>;
}

/// The set of known workout definitions
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub workouts: BTreeMap<String, WorkoutDefinition>,
}

impl Catalog {
    /// Insert or replace a workout
    pub fn insert(&mut self, workout: WorkoutDefinition) {
        self.workouts.insert(workout.id.clone(), workout);
    }

    /// Load every `*.toml` file in `dir` as a workout and layer them over `self`.
    ///
    /// Files that fail to parse are logged and skipped. Returns the number of
    /// workouts loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            tracing::debug!("No workouts directory at {:?}", dir);
            return Ok(0);
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let contents = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("Unable to read workout file {:?}: {}", path, e);
                    continue;
                }
            };
            match toml::from_str::<WorkoutDefinition>(&contents) {
                Ok(workout) => {
                    tracing::debug!("Loaded workout {} from {:?}", workout.id, path);
                    self.insert(workout);
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping malformed workout file {:?}: {}", path, e);
                }
            }
        }

        tracing::info!("Loaded {} workouts from {:?}", loaded, dir);
        Ok(loaded)
    }

    /// Validate catalog integrity, returning one message per problem found
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (key, workout) in &self.workouts {
            if key != &workout.id {
                errors.push(format!(
                    "Workout key '{}' does not match its id '{}'",
                    key, workout.id
                ));
            }
            if workout.exercises.is_empty() {
                errors.push(format!("Workout '{}' has no exercises", workout.id));
            }

            let mut seen = HashSet::new();
            for exercise in &workout.exercises {
                if !seen.insert(exercise.id.as_str()) {
                    errors.push(format!(
                        "Workout '{}' lists exercise '{}' more than once",
                        workout.id, exercise.id
                    ));
                }
                if !exercise.weight.is_finite() || exercise.weight < 0.0 {
                    errors.push(format!(
                        "Exercise '{}' in workout '{}' has invalid weight {}",
                        exercise.id, workout.id, exercise.weight
                    ));
                }
            }
        }

        errors
    }
}

impl WorkoutStore for Catalog {
    fn get(&self, id: &str) -> Result<WorkoutDefinition> {
        let workout = self
            .workouts
            .get(id)
            .ok_or_else(|| Error::InvalidWorkout(format!("no workout with id '{}'", id)))?;

        if workout.exercises.is_empty() {
            return Err(Error::InvalidWorkout(format!(
                "workout '{}' has no exercises",
                id
            )));
        }

        Ok(workout.clone())
    }

    fn list(&self) -> Vec<WorkoutSummary> {
        self.workouts
            .values()
            .map(|w| WorkoutSummary {
                id: w.id.clone(),
                name: w.name.clone(),
                exercise_count: w.exercises.len(),
            })
            .collect()
    }
}

fn exercise(
    id: &str,
    name: &str,
    sets: u32,
    repetitions: u32,
    weight: f64,
    rest_seconds: u32,
) -> ExerciseDefinition {
    ExerciseDefinition {
        id: id.into(),
        name: name.into(),
        description: String::new(),
        repetitions,
        sets,
        weight,
        rest_seconds,
        note: String::new(),
    }
}

/// Builds the catalog of built-in workouts
///
/// Prefer `get_default_catalog()` for lookups; this is the starting point
/// when user workout files are layered on top.
pub fn build_default_catalog() -> Catalog {
    let mut catalog = Catalog::default();

    catalog.insert(WorkoutDefinition {
        id: "full_body_a".into(),
        name: "Full Body A".into(),
        description: "Squat, press and row, three working sets each".into(),
        exercises: vec![
            exercise("back_squat", "Back Squat", 3, 5, 60.0, 180),
            exercise("bench_press", "Bench Press", 3, 5, 40.0, 180),
            exercise("barbell_row", "Barbell Row", 3, 8, 40.0, 120),
        ],
    });

    catalog.insert(WorkoutDefinition {
        id: "full_body_b".into(),
        name: "Full Body B".into(),
        description: "Deadlift, overhead press and chin-ups".into(),
        exercises: vec![
            exercise("deadlift", "Deadlift", 1, 5, 80.0, 240),
            exercise("overhead_press", "Overhead Press", 3, 5, 30.0, 180),
            exercise("chin_up", "Chin-up", 3, 6, 0.0, 120),
        ],
    });

    catalog.insert(WorkoutDefinition {
        id: "kettlebell_circuit".into(),
        name: "Kettlebell Circuit".into(),
        description: "Short conditioning circuit".into(),
        exercises: vec![
            exercise("kb_swing", "Kettlebell Swing", 5, 15, 16.0, 60),
            exercise("goblet_squat", "Goblet Squat", 3, 10, 16.0, 60),
            exercise("push_up", "Push-up", 3, 12, 0.0, 60),
            exercise("plank", "Plank (seconds as reps)", 0, 45, 0.0, 60),
        ],
    });

    catalog
}
