//! Verifier CLI - binary entry point.
//!
//! Loads configuration, restores any persisted session, then hands control to the
//! interactive [`shell::Shell`].
//!
//! ```text
//! main() -> VerifierConfig::load() -> SessionManager::restore() -> Shell::run()
//! ```

mod command;
mod shell;

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use verifier_config::{VerifierConfig, data_dir};
use verifier_core::SessionManager;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file means no logs; the shell owns stdout.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => warnings.push(format!(
                "Failed to open log file {}: {e}",
                candidate.display()
            )),
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.verifier/logs/verifier.log
    if let Some(dir) = data_dir() {
        candidates.push(dir.join("logs").join("verifier.log"));
    }

    // Fallback: ./.verifier/logs/verifier.log
    candidates.push(PathBuf::from(".verifier").join("logs").join("verifier.log"));

    candidates
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let config = VerifierConfig::load()
        .context("failed to load configuration")?
        .unwrap_or_default();
    let settings = config
        .resolve()
        .context("failed to resolve configuration")?;
    tracing::info!(base_url = %settings.base_url, "Starting verifier");

    let session = Arc::new(SessionManager::from_settings(&settings)?);

    match session.restore().await {
        Ok(Some(profile)) => tracing::info!(username = %profile.username, "Session restored"),
        Ok(None) => {}
        Err(err) => tracing::info!("Stored session not restored: {err}"),
    }

    shell::Shell::new(session).run().await
}
