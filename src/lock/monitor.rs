use anyhow::Result;
use std::time::Duration;
use tracing::debug;

use crate::lock::config::LockConfig;
use crate::lock::session::{LockSession, SessionState};

/// Periodic poller that keeps the lock surface frontmost.
///
/// On each tick, while enforcement is enabled and the session is
/// `Locked`, it checks the surface-focus oracle and requests
/// re-assertion if focus is lost. It performs no state transition
/// itself; ticks in any other state produce no action.
pub struct EnforcementMonitor {
    interval: Duration,
    enabled: bool,
}

impl EnforcementMonitor {
    pub fn new(interval: Duration, enabled: bool) -> Self {
        Self { interval, enabled }
    }

    pub fn from_config(config: &LockConfig) -> Self {
        Self::new(
            Duration::from_secs(config.windows.monitor_interval_secs),
            config.enforcement.enabled,
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One polling iteration, serialized with every other session event
    /// by the caller.
    pub fn tick(&self, session: &mut LockSession) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if session.state() != SessionState::Locked {
            debug!("Monitor tick suspended in state {:?}", session.state());
            return Ok(());
        }

        session.reassert_if_backgrounded()
    }
}
