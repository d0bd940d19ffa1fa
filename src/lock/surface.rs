use anyhow::Result;
use tracing::{debug, info};

/// The guarded presentation layer, an external collaborator.
///
/// `assert_lock` is idempotent: asserting an already-foreground surface
/// is a no-op from the engine's perspective. A failing `is_foreground`
/// query is treated by callers as "not foreground" so the engine errs
/// toward re-assertion rather than under-locking.
pub trait LockSurface {
    /// Bring the lock surface to the foreground
    fn assert_lock(&mut self) -> Result<()>;

    /// Dismiss the lock surface after a successful unlock
    fn dismiss(&mut self) -> Result<()>;

    /// Whether the lock surface currently holds foreground focus
    fn is_foreground(&mut self) -> Result<bool>;
}

/// Headless surface used by the `run` command: logs each command and
/// tracks foreground focus in-process.
#[derive(Debug, Default)]
pub struct TracingSurface {
    foreground: bool,
}

impl TracingSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockSurface for TracingSurface {
    fn assert_lock(&mut self) -> Result<()> {
        if !self.foreground {
            info!("Asserting lock surface");
        }
        self.foreground = true;
        Ok(())
    }

    fn dismiss(&mut self) -> Result<()> {
        info!("Dismissing lock surface");
        self.foreground = false;
        Ok(())
    }

    fn is_foreground(&mut self) -> Result<bool> {
        debug!("Foreground query: {}", self.foreground);
        Ok(self.foreground)
    }
}
