#![forbid(unsafe_code)]

//! Core domain model and session logic for Hearth's guided workouts.
//!
//! This crate provides:
//! - Domain types (workouts, exercises, set records, sessions)
//! - Workout catalog
//! - Session state machine and controller
//! - Persistence (session slot, archive, CSV export)
//! - Elapsed-time display

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod session;
pub mod repository;
pub mod archive;
pub mod history;
pub mod csv_export;
pub mod elapsed;
pub mod controller;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, Catalog, WorkoutStore};
pub use config::Config;
pub use repository::{FileSessionRepository, SessionMirror, SessionRepository};
pub use archive::{read_archive, ArchiveSink, JsonlArchive};
pub use history::load_recent_sessions;
pub use elapsed::{format_elapsed, ElapsedTicker};
pub use controller::{SessionPhase, StartMode, StartOutcome, WorkoutSessionController};
