use anyhow::{Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;

use crate::lock::config::{self, FileConfigStore, LockConfig};
use crate::lock::engine::{run_engine, EngineEvent};
use crate::lock::monitor::EnforcementMonitor;
use crate::lock::override_code::{derive_override_code, HintCode};
use crate::lock::session::{LockSession, SessionState, SystemClock};
use crate::lock::surface::TracingSurface;

/// Use the explicit --config path, or the platform default
pub fn resolve_config_path(arg: Option<PathBuf>) -> Result<PathBuf> {
    match arg {
        Some(path) => Ok(path),
        None => config::get_config_path(),
    }
}

/// Write a default configuration file
pub fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    config::save_config(path, &LockConfig::default())?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Load and validate the configuration, printing a summary
pub fn validate(path: &Path) -> Result<()> {
    let config = config::load_config(path)?;
    print_summary(&config);
    println!("Configuration OK");
    Ok(())
}

/// Show the configuration summary and override-window status
pub fn status(path: &Path) -> Result<()> {
    let config = config::load_config(path)?;
    print_summary(&config);

    match config.override_flag.remaining_minutes(Utc::now()) {
        Some(remaining) => println!("Override window: active, {} minutes remaining", remaining),
        None if config.override_flag.active => println!("Override window: expired"),
        None => println!("Override window: not active"),
    }

    Ok(())
}

fn print_summary(config: &LockConfig) {
    let challenge = &config.challenge;
    println!("Questions per set:   {}", challenge.question_count);
    println!(
        "Question mode:       {}",
        match challenge.mode {
            crate::lock::challenge::QuestionMode::FillBlank => "fill blank",
            crate::lock::challenge::QuestionMode::MultipleChoice => "multiple choice",
        }
    );
    for &op in &challenge.operations {
        println!("Operation {}:         operands up to {}", op.symbol(), challenge.max_for(op));
    }
    println!("Grace window:        {} minutes", config.windows.grace_minutes);
    println!(
        "Enforcement:         {}",
        if config.enforcement.enabled { "enabled" } else { "disabled" }
    );
}

/// Generate an override hint, or derive the code for a given hint
pub fn hint(derive: Option<String>) -> Result<()> {
    match derive {
        Some(input) => {
            let hint = HintCode::parse(&input)
                .context("Hint must be exactly 4 digits with a leading 1-4")?;
            println!("Override code for hint {}: {}", hint, derive_override_code(hint));
        }
        None => {
            let mut rng = StdRng::from_entropy();
            let hint = HintCode::generate(&mut rng);
            println!("Hint: {}", hint);
            println!("Code: {}", derive_override_code(hint));
        }
    }
    Ok(())
}

/// Run the enforcement engine in the foreground until interrupted.
///
/// The windowing layer is an external collaborator; this command drives
/// the engine against a headless tracing surface.
pub fn run(path: PathBuf) -> Result<()> {
    let config = config::load_config(&path)?;
    let monitor = EnforcementMonitor::from_config(&config);

    let mut session = LockSession::new(
        Box::new(FileConfigStore::new(path)),
        Box::new(TracingSurface::new()),
        Box::new(SystemClock),
        StdRng::from_entropy(),
    )?;

    if session.state() == SessionState::Locked {
        let set = session.request_challenge_set()?;
        for challenge in set.challenges() {
            info!("Challenge: {}", challenge.prompt());
        }
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(EngineEvent::Shutdown).await;
            }
        });

        run_engine(session, monitor, rx).await.map(|_| ())
    })
}
