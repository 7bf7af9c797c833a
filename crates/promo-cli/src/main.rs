//! Promo CLI
//!
//! CLI tool for validating popup campaign files, evaluating them against a
//! visitor context, and inspecting the persisted display-state store.

use std::fs;

use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};

use promo_core::selector::select_candidate;
use promo_core::store::{FileBackend, StateStore};
use promo_core::types::{Popup, TriggerKind, VisitorContext};

#[derive(Parser)]
#[command(name = "promo-cli")]
#[command(about = "Popup campaign evaluation and state tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate campaigns against a visitor context
    Check {
        /// Popup definitions file (JSON array)
        #[arg(short, long)]
        popups: String,

        /// Current pathname
        #[arg(long, default_value = "/")]
        path: String,

        /// Current UI language
        #[arg(long, default_value = "en")]
        language: String,

        /// Viewport width in pixels
        #[arg(long, default_value_t = 1280)]
        width: u32,

        /// Evaluation time, ISO-8601 local (defaults to now)
        #[arg(long)]
        now: Option<String>,

        /// State store directory (defaults to empty state)
        #[arg(long)]
        state_dir: Option<String>,
    },

    /// Parse a popup definitions file and report what it contains
    Validate {
        /// Popup definitions file (JSON array)
        #[arg(short, long)]
        popups: String,
    },

    /// Inspect or reset a file-backed state store
    State {
        /// State store directory
        #[arg(short, long)]
        dir: String,

        /// Wipe display history and session counters
        #[arg(long)]
        clear: bool,

        /// Wipe session counters only
        #[arg(long)]
        reset_session: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            popups,
            path,
            language,
            width,
            now,
            state_dir,
        } => cmd_check(&popups, &path, &language, width, now.as_deref(), state_dir.as_deref()),
        Commands::Validate { popups } => cmd_validate(&popups),
        Commands::State {
            dir,
            clear,
            reset_session,
        } => cmd_state(&dir, clear, reset_session),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_popups(path: &str) -> Result<Vec<Popup>, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid popup file '{}': {}", path, e))
}

fn open_store(dir: Option<&str>) -> Result<StateStore, String> {
    match dir {
        Some(dir) => {
            let backend =
                FileBackend::open(dir).map_err(|e| format!("Failed to open '{}': {}", dir, e))?;
            Ok(StateStore::open(Box::new(backend)))
        }
        None => Ok(StateStore::in_memory()),
    }
}

fn cmd_check(
    popups_path: &str,
    path: &str,
    language: &str,
    width: u32,
    now: Option<&str>,
    state_dir: Option<&str>,
) -> Result<(), String> {
    let popups = load_popups(popups_path)?;
    let store = open_store(state_dir)?;

    let now = match now {
        Some(raw) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .map_err(|e| format!("Invalid --now '{}': {}", raw, e))?,
        None => Local::now().naive_local(),
    };

    let ctx = VisitorContext {
        path,
        language,
        viewport_width: width,
        now,
    };

    println!("Context: path={} language={} width={} now={}", path, language, width, now);
    println!();

    let kinds = [
        ("page_load", TriggerKind::PageLoad),
        ("time_delay", TriggerKind::TimeDelay),
        ("scroll_depth", TriggerKind::ScrollDepth),
        ("exit_intent", TriggerKind::ExitIntent),
        ("inactivity", TriggerKind::Inactivity),
        ("button_click", TriggerKind::ButtonClick),
    ];

    for (name, kind) in kinds {
        match select_candidate(&popups, kind, &ctx, &store) {
            Some(popup) => println!(
                "  {:<13} -> '{}' (priority {})",
                name, popup.id, popup.priority
            ),
            None => println!("  {:<13} -> none", name),
        }
    }

    Ok(())
}

fn cmd_validate(popups_path: &str) -> Result<(), String> {
    let popups = load_popups(popups_path)?;

    println!("'{}' is valid", popups_path);
    println!("  Popups: {}", popups.len());
    for popup in &popups {
        println!(
            "  [{}] '{}' trigger={:?} active={}",
            popup.id,
            popup.name,
            popup.trigger.kind(),
            popup.active
        );
    }

    Ok(())
}

fn cmd_state(dir: &str, clear: bool, reset_session: bool) -> Result<(), String> {
    let backend =
        FileBackend::open(dir).map_err(|e| format!("Failed to open '{}': {}", dir, e))?;
    let mut store = StateStore::open(Box::new(backend));

    if clear {
        store.clear();
        println!("Cleared display history and session counters in '{}'", dir);
        return Ok(());
    }

    if reset_session {
        store.reset_session();
        println!("Reset session counters in '{}'", dir);
        return Ok(());
    }

    let states = store.display_states();
    if states.is_empty() {
        println!("No display history in '{}'", dir);
        return Ok(());
    }

    let mut ids: Vec<&String> = states.keys().collect();
    ids.sort();
    println!("Display history in '{}':", dir);
    for id in ids {
        let state = &states[id];
        println!(
            "  [{}] displays={} last={} dismissed={} converted={}",
            id,
            state.display_count,
            state
                .last_displayed
                .map(|t| t.to_string())
                .unwrap_or_else(|| "never".to_string()),
            state.dismissed,
            state.converted
        );
    }

    Ok(())
}
