//! Quarry - main entry point.
//!
//! Loads the configuration, opens the database and the run history, and
//! starts the GPUI application.
//!
//! Usage: `quarry [DATABASE]`. The argument overrides `query.database`.

use std::sync::Arc;
use std::time::Duration;

use quarry_core::{ensure_data_dir, AppConfig};
use quarry_engine::{HistoryStore, SqliteEngine, HISTORY_FILE};
use quarry_ui::window::run_console;

// =============================================================================
// Initialization
// =============================================================================

/// Load `config.toml`, falling back to defaults when it is unreadable.
fn load_config() -> AppConfig {
    match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{} - continuing with default configuration", e);
            AppConfig::default()
        }
    }
}

/// Open the persistent history, or an in-memory one if the data dir is unusable.
fn open_history() -> Result<HistoryStore, String> {
    let persistent = match ensure_data_dir() {
        Ok(Some(dir)) => HistoryStore::open(&dir.join(HISTORY_FILE)).map_err(|e| e.to_string()),
        Ok(None) => Err("no data directory on this platform".to_string()),
        Err(e) => Err(e.to_string()),
    };

    match persistent {
        Ok(store) => Ok(store),
        Err(e) => {
            tracing::warn!("History will not be saved: {}", e);
            HistoryStore::open_in_memory().map_err(|e| format!("Failed to open history: {}", e))
        }
    }
}

// =============================================================================
// Entry Point
// =============================================================================

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Quarry starting...");

    // Query timeouts need the timer driver running off the GPUI thread.
    // Entering the runtime keeps tokio available for the app's lifetime.
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let _guard = rt.enter();

    let mut config = load_config();
    if let Some(database) = std::env::args().nth(1) {
        config.query.database = database;
    }

    let engine = match SqliteEngine::open(&config.query.database) {
        Ok(engine) => engine.with_timeout(Duration::from_secs(config.query.timeout_secs)),
        Err(e) => {
            tracing::error!("Failed to open database '{}': {}", config.query.database, e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(database = %config.query.database, "Database opened");

    let history = match open_history() {
        Ok(history) => history,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting GPUI application...");
    run_console(config, Arc::new(engine), Arc::new(history));
}
