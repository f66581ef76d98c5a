use clap::{Parser, Subcommand};
use hearth_core::*;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Household dashboard: guided workout sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available workouts
    Workouts,

    /// Start a workout, resuming a saved session of it if there is one
    Start {
        workout: String,

        /// Discard any saved session and start over
        #[arg(long)]
        fresh: bool,
    },

    /// Show the active session
    Status,

    /// Move to the next exercise
    Next,

    /// Move to the previous exercise
    Prev,

    /// Edit one set of an exercise (sets are numbered from 1)
    Set {
        exercise: String,
        set: usize,

        /// Mark the set completed
        #[arg(long, conflicts_with = "undone")]
        done: bool,

        /// Mark the set not completed
        #[arg(long)]
        undone: bool,

        #[arg(long)]
        reps: Option<u32>,

        /// Load in kilograms
        #[arg(long)]
        weight: Option<f64>,
    },

    /// Add a set to an exercise
    AddSet { exercise: String },

    /// Show a live elapsed-time display (Enter to stop)
    Timer {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<usize>,
    },

    /// Archive the active session
    Finish,

    /// Abandon the active session without archiving it
    Discard,

    /// List recently finished sessions
    History {
        #[arg(long)]
        days: Option<i64>,
    },

    /// Write finished sessions to a CSV file, one row per set
    Export {
        /// Output file (default: <data_dir>/export/sets.csv)
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long)]
        days: Option<i64>,
    },
}

/// Paths and catalog shared by every command
struct AppContext {
    config: Config,
    data_dir: PathBuf,
    catalog: Catalog,
    repo: FileSessionRepository,
}

fn main() -> ExitCode {
    hearth_core::logging::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());
    std::fs::create_dir_all(&data_dir)?;
    tracing::debug!("Using data directory {:?}", data_dir);

    let mut catalog = build_default_catalog();
    catalog.load_dir(&config.workouts_dir(&data_dir))?;
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid catalog".into()));
    }

    let repo = FileSessionRepository::new(config.slot_path(&data_dir));
    let ctx = AppContext {
        config,
        data_dir,
        catalog,
        repo,
    };

    match cli.command {
        Commands::Workouts => cmd_workouts(&ctx),
        Commands::Start { workout, fresh } => cmd_start(&ctx, &workout, fresh),
        Commands::Status => cmd_status(&ctx),
        Commands::Next => cmd_move(&ctx, true),
        Commands::Prev => cmd_move(&ctx, false),
        Commands::Set {
            exercise,
            set,
            done,
            undone,
            reps,
            weight,
        } => cmd_set(&ctx, &exercise, set, done, undone, reps, weight),
        Commands::AddSet { exercise } => cmd_add_set(&ctx, &exercise),
        Commands::Timer { ticks } => cmd_timer(&ctx, ticks),
        Commands::Finish => cmd_finish(&ctx),
        Commands::Discard => cmd_discard(&ctx),
        Commands::History { days } => cmd_history(&ctx, days),
        Commands::Export { output, days } => cmd_export(&ctx, output, days),
    }
}

/// Reattach to the saved session, failing if there is none
fn active_controller(ctx: &AppContext) -> Result<WorkoutSessionController<'_>> {
    let mut ctl = WorkoutSessionController::new(&ctx.catalog, &ctx.repo);
    if !ctl.resume()? {
        eprintln!("No active session. Start one with `hearth start <workout>`.");
        return Err(Error::NoActiveSession);
    }
    Ok(ctl)
}

fn cmd_workouts(ctx: &AppContext) -> Result<()> {
    for summary in ctx.catalog.list() {
        println!(
            "  {:<22} {} ({} exercises)",
            summary.id, summary.name, summary.exercise_count
        );
    }
    Ok(())
}

fn cmd_start(ctx: &AppContext, workout: &str, fresh: bool) -> Result<()> {
    let mut ctl = WorkoutSessionController::new(&ctx.catalog, &ctx.repo);
    let mode = if fresh {
        StartMode::Fresh
    } else {
        StartMode::ResumeOrFresh
    };

    let outcome = match ctl.start(workout, mode, chrono::Utc::now()) {
        Ok(outcome) => outcome,
        Err(e @ Error::InvalidWorkout(_)) => {
            eprintln!("Run `hearth workouts` to see what is available.");
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    match outcome {
        StartOutcome::Started => println!("✓ Started session"),
        StartOutcome::Resumed => println!("✓ Resumed session"),
    }

    let recent = load_recent_sessions(
        &ctx.config.archive_path(&ctx.data_dir),
        ctx.config.history.days,
    )?;
    if let Some(last) = hearth_core::history::find_last_session_for_workout(&recent, workout) {
        println!(
            "  Last done: {} ({} sets completed)",
            last.day_of_exercise,
            last.completed_sets()
        );
    }

    display_session(&ctl);
    Ok(())
}

fn cmd_status(ctx: &AppContext) -> Result<()> {
    let ctl = active_controller(ctx)?;
    display_session(&ctl);
    Ok(())
}

fn cmd_move(ctx: &AppContext, forward: bool) -> Result<()> {
    let mut ctl = active_controller(ctx)?;
    let moved = if forward { ctl.advance()? } else { ctl.retreat()? };
    if !moved {
        println!(
            "Already at the {} exercise.",
            if forward { "last" } else { "first" }
        );
    }
    display_session(&ctl);
    Ok(())
}

fn cmd_set(
    ctx: &AppContext,
    exercise: &str,
    set: usize,
    done: bool,
    undone: bool,
    reps: Option<u32>,
    weight: Option<f64>,
) -> Result<()> {
    let mut ctl = active_controller(ctx)?;
    let index = set
        .checked_sub(1)
        .ok_or_else(|| Error::OutOfRange("sets are numbered from 1".into()))?;

    let mut fields = Vec::new();
    if done || undone {
        fields.push(SetField::Completed(done));
    }
    if let Some(reps) = reps {
        fields.push(SetField::Reps(reps));
    }
    if let Some(weight) = weight {
        fields.push(SetField::Weight(weight));
    }
    if fields.is_empty() {
        eprintln!("Nothing to change: pass --done, --undone, --reps or --weight.");
        return Ok(());
    }

    ctl.update_set_fields(exercise, index, &fields)?;
    warn_if_unmirrored(&ctl);
    display_session(&ctl);
    Ok(())
}

fn cmd_add_set(ctx: &AppContext, exercise: &str) -> Result<()> {
    let mut ctl = active_controller(ctx)?;
    let count = ctl.add_set(exercise)?;
    println!("✓ {} now has {} sets", exercise, count);
    warn_if_unmirrored(&ctl);
    Ok(())
}

enum TimerEvent {
    Tick(String),
    Quit,
}

fn cmd_timer(ctx: &AppContext, ticks: Option<usize>) -> Result<()> {
    let mut ctl = active_controller(ctx)?;
    let interval = Duration::from_millis(ctx.config.session.tick_millis);

    let (tx, rx) = mpsc::channel();
    let tick_tx = tx.clone();
    ctl.start_ticker(interval, move |elapsed| {
        let _ = tick_tx.send(TimerEvent::Tick(elapsed));
    })?;

    if ticks.is_none() {
        // Detached: blocks on stdin until Enter; exits with the process
        std::thread::spawn(move || {
            let mut line = String::new();
            let _ = io::stdin().lock().read_line(&mut line);
            let _ = tx.send(TimerEvent::Quit);
        });
    } else {
        drop(tx);
    }

    let mut seen = 0;
    while let Ok(event) = rx.recv() {
        match event {
            TimerEvent::Tick(elapsed) => {
                print!("\rElapsed: {}", elapsed);
                io::stdout().flush()?;
                seen += 1;
                if ticks.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            TimerEvent::Quit => break,
        }
    }

    ctl.stop_ticker();
    println!();
    Ok(())
}

fn cmd_finish(ctx: &AppContext) -> Result<()> {
    let mut ctl = active_controller(ctx)?;
    let mut archive = JsonlArchive::new(ctx.config.archive_path(&ctx.data_dir));

    let record = match ctl.finish(&mut archive, chrono::Utc::now()) {
        Ok(record) => record,
        Err(e) => {
            eprintln!("Your session is still saved; run `hearth finish` again to retry.");
            return Err(e);
        }
    };

    println!("\n✓ Session archived!");
    println!("  Workout:  {}", record.workout_id);
    println!("  Day:      {}", record.day_of_exercise);
    println!(
        "  Duration: {}",
        format_elapsed(record.start_time, record.end_time)
    );
    println!("  Sets:     {} completed", record.completed_sets());
    Ok(())
}

fn cmd_discard(ctx: &AppContext) -> Result<()> {
    let had_session = ctx.repo.get()?.is_some();
    let mut ctl = WorkoutSessionController::new(&ctx.catalog, &ctx.repo);

    if ctl.resume()? {
        ctl.discard()?;
    } else if had_session {
        // The saved session's workout is gone or changed; resume already cleared it
        println!("The saved session no longer matches any workout.");
    } else {
        eprintln!("No active session. Start one with `hearth start <workout>`.");
        return Err(Error::NoActiveSession);
    }
    println!("✓ Session discarded");
    Ok(())
}

fn cmd_history(ctx: &AppContext, days: Option<i64>) -> Result<()> {
    let days = days.unwrap_or(ctx.config.history.days);
    let sessions = load_recent_sessions(&ctx.config.archive_path(&ctx.data_dir), days)?;

    if sessions.is_empty() {
        println!("No sessions in the last {} days.", days);
        return Ok(());
    }

    for session in &sessions {
        let name = ctx
            .catalog
            .workouts
            .get(&session.workout_id)
            .map_or(session.workout_id.as_str(), |w| w.name.as_str());
        println!(
            "  {}  {:<24} {}  {} sets",
            session.day_of_exercise,
            name,
            format_elapsed(session.start_time, session.end_time),
            session.completed_sets()
        );
    }
    Ok(())
}

fn cmd_export(ctx: &AppContext, output: Option<PathBuf>, days: Option<i64>) -> Result<()> {
    let archive_path = ctx.config.archive_path(&ctx.data_dir);
    let sessions = match days {
        Some(days) => load_recent_sessions(&archive_path, days)?,
        None => hearth_core::history::dedup_sessions(read_archive(&archive_path)?),
    };
    let output = output.unwrap_or_else(|| default_export_path(&ctx.data_dir));

    let rows = hearth_core::csv_export::export_sessions(&sessions, &output)?;
    println!("✓ Exported {} sets from {} sessions", rows, sessions.len());
    println!("  CSV: {}", output.display());
    Ok(())
}

fn default_export_path(data_dir: &Path) -> PathBuf {
    data_dir.join("export").join("sets.csv")
}

fn warn_if_unmirrored(ctl: &WorkoutSessionController<'_>) {
    if !ctl.is_mirrored() {
        eprintln!("warning: session could not be saved; it will not survive this command");
    }
}

fn display_session(ctl: &WorkoutSessionController<'_>) {
    let (Some(workout), Some(state)) = (ctl.workout(), ctl.state()) else {
        return;
    };

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", workout.name);
    println!("╰─────────────────────────────────────────╯");
    println!(
        "  Elapsed: {}",
        format_elapsed(state.start_time, chrono::Utc::now())
    );

    if let Some(view) = ctl.current_view() {
        println!();
        println!(
            "  Exercise {}/{}: {} ({})",
            view.index + 1,
            view.total,
            view.exercise.name,
            view.exercise.id
        );
        if !view.exercise.note.is_empty() {
            println!("  ℹ {}", view.exercise.note);
        }
        for (i, set) in view.sets.iter().enumerate() {
            println!(
                "  [{}] Set {}: {} reps @ {} kg",
                if set.completed { "x" } else { " " },
                i + 1,
                set.reps,
                set.weight
            );
        }
        if view.exercise.rest_seconds > 0 {
            println!("  Rest: {}s between sets", view.exercise.rest_seconds);
        }
    }

    if let Some(summary) = ctl.summary() {
        println!();
        println!(
            "  Progress: {}/{} sets, {} kg volume",
            summary.completed_sets, summary.total_sets, summary.volume
        );
    }
    println!();
}
