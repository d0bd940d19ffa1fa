use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::lock::monitor::EnforcementMonitor;
use crate::lock::session::{LockSession, ScreenEvent};

/// External events fed into the engine's single serialized queue
#[derive(Debug)]
pub enum EngineEvent {
    /// Screen power transition from the power-event source
    Screen(ScreenEvent),
    /// Answers for the current challenge set
    SubmitAnswers(Vec<i32>),
    /// A guardian override code attempt
    SubmitOverride(String),
    /// Ask for a fresh override hint
    RequestHint,
    /// Tear the engine down
    Shutdown,
}

/// Run the engine event loop until shutdown.
///
/// All transitions are serialized here: user events from the channel,
/// monitor ticks and deadline expiry are handled one at a time by a
/// single task, so the session needs no internal locking. The deadline
/// sleep is rebuilt from the arbiter's pending slot after every event,
/// which makes delivering a superseded deadline impossible.
///
/// Returns the session to the caller after `Shutdown` or channel
/// closure, with its deadline cancelled.
pub async fn run_engine(
    mut session: LockSession,
    monitor: EnforcementMonitor,
    mut events: mpsc::Receiver<EngineEvent>,
) -> Result<LockSession> {
    info!("Starting lock enforcement engine");
    let mut ticker = tokio::time::interval(monitor.interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        // fire anything already due before sleeping again
        log_failure("deadline", session.fire_due_deadline().map(|_| ()));

        let next_fire = session.pending_deadline().map(|d| d.fire_at);
        let deadline_sleep = async move {
            match next_fire {
                Some(at) => {
                    let wait = (at - Utc::now()).to_std().unwrap_or_default();
                    tokio::time::sleep(wait).await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            maybe_event = events.recv() => {
                match maybe_event {
                    Some(EngineEvent::Screen(event)) => {
                        log_failure("screen event", session.handle_screen_event(event));
                    }
                    Some(EngineEvent::SubmitAnswers(answers)) => {
                        log_failure(
                            "challenge submission",
                            session.submit_challenge_answers(&answers).map(|_| ()),
                        );
                    }
                    Some(EngineEvent::SubmitOverride(code)) => {
                        log_failure(
                            "override submission",
                            session.submit_override_code(&code).map(|_| ()),
                        );
                    }
                    Some(EngineEvent::RequestHint) => {
                        let hint = session.generate_override_hint();
                        info!("Override hint: {}", hint);
                    }
                    Some(EngineEvent::Shutdown) | None => {
                        info!("Engine shutting down");
                        session.shutdown();
                        return Ok(session);
                    }
                }
            }
            _ = ticker.tick() => {
                log_failure("monitor tick", monitor.tick(&mut session));
            }
            _ = deadline_sleep => {
                log_failure("deadline", session.fire_due_deadline().map(|_| ()));
            }
        }
    }
}

/// The engine prefers staying alive (and over-locking) to dying on a
/// transient collaborator failure; failures are logged, not propagated.
fn log_failure(what: &str, result: Result<()>) {
    if let Err(e) = result {
        error!("Failed to handle {}: {:#}", what, e);
    }
}
