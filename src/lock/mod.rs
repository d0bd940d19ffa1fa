//! Lock enforcement engine
//!
//! This module provides the core of the arithmetic screen lock:
//! - Generate arithmetic challenge sets from configuration
//! - Derive guardian override codes from displayed hints
//! - Drive the locked / grace / override state machine
//! - Re-assert the lock surface when it loses foreground focus
//! - Manage grace and override expiry through a single deadline slot

pub mod challenge;
pub mod config;
pub mod deadline;
pub mod engine;
pub mod monitor;
pub mod override_code;
pub mod session;
pub mod surface;

pub use challenge::{Challenge, ChallengeSet, Operation, QuestionMode};
pub use config::{ConfigStore, FileConfigStore, LockConfig, OVERRIDE_DURATION_MINUTES};
pub use deadline::{Deadline, DeadlineArbiter, DeadlineTag};
pub use engine::{run_engine, EngineEvent};
pub use monitor::EnforcementMonitor;
pub use override_code::{derive_override_code, HintCode, OverrideCode};
pub use session::{LockSession, ScreenEvent, SessionState, SystemClock};
pub use surface::{LockSurface, TracingSurface};
