use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::lock::challenge::{GenerationParams, Operation, QuestionMode};

/// Length of the guardian override window in minutes. Fixed by design,
/// not a configuration key.
pub const OVERRIDE_DURATION_MINUTES: i64 = 30;

/// Main lock configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LockConfig {
    /// Challenge generation settings
    pub challenge: ChallengeSettings,

    /// Grace window and monitor cadence
    #[serde(default)]
    pub windows: WindowSettings,

    /// Enforcement settings
    #[serde(default)]
    pub enforcement: EnforcementSettings,

    /// Persisted guardian override flag
    #[serde(rename = "override", default)]
    pub override_flag: OverrideFlag,
}

/// Challenge generation settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ChallengeSettings {
    /// Number of challenges per set (1-10)
    #[serde(default = "default_question_count")]
    pub question_count: usize,

    /// Fill-blank or multiple choice
    #[serde(default)]
    pub mode: QuestionMode,

    /// Enabled operations; empty falls back to addition at generation time
    #[serde(default = "default_operations")]
    pub operations: Vec<Operation>,

    /// Per-operation operand maxima
    #[serde(default = "default_max")]
    pub max_addition: i32,
    #[serde(default = "default_max")]
    pub max_subtraction: i32,
    #[serde(default = "default_max_multiplication")]
    pub max_multiplication: i32,
    #[serde(default = "default_max")]
    pub max_division: i32,
}

fn default_question_count() -> usize {
    3
}

fn default_operations() -> Vec<Operation> {
    vec![Operation::Addition, Operation::Subtraction]
}

fn default_max() -> i32 {
    20
}

fn default_max_multiplication() -> i32 {
    12
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            question_count: default_question_count(),
            mode: QuestionMode::default(),
            operations: default_operations(),
            max_addition: default_max(),
            max_subtraction: default_max(),
            max_multiplication: default_max_multiplication(),
            max_division: default_max(),
        }
    }
}

impl ChallengeSettings {
    /// Same operand maximum for every operation
    pub fn with_uniform_max(mut self, max: i32) -> Self {
        self.max_addition = max;
        self.max_subtraction = max;
        self.max_multiplication = max;
        self.max_division = max;
        self
    }

    pub fn max_for(&self, op: Operation) -> i32 {
        match op {
            Operation::Addition => self.max_addition,
            Operation::Subtraction => self.max_subtraction,
            Operation::Multiplication => self.max_multiplication,
            Operation::Division => self.max_division,
        }
    }

    /// Snapshot the settings into generator parameters
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            question_count: self.question_count,
            mode: self.mode,
            operations: self.operations.clone(),
            max_addition: self.max_addition,
            max_subtraction: self.max_subtraction,
            max_multiplication: self.max_multiplication,
            max_division: self.max_division,
        }
    }
}

/// Grace window and monitor cadence
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WindowSettings {
    /// Minutes of normal use after a correct challenge
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,

    /// Seconds between foreground checks while locked
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
}

fn default_grace_minutes() -> i64 {
    5
}

fn default_monitor_interval() -> u64 {
    1
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            grace_minutes: default_grace_minutes(),
            monitor_interval_secs: default_monitor_interval(),
        }
    }
}

/// Enforcement settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EnforcementSettings {
    /// Whether the gate is enforced at all
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EnforcementSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Persisted guardian override flag. Raised when an override code is
/// accepted, cleared when the window expires so future sessions start
/// fresh.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct OverrideFlag {
    #[serde(default)]
    pub active: bool,

    /// When the flag was raised
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
}

impl OverrideFlag {
    /// Minutes left in a still-valid override window, if any
    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> Option<i64> {
        if !self.active {
            return None;
        }
        let activated_at = self.activated_at?;
        let elapsed = (now - activated_at).num_minutes();
        let remaining = OVERRIDE_DURATION_MINUTES - elapsed;
        (remaining > 0).then_some(remaining)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            challenge: ChallengeSettings::default(),
            windows: WindowSettings::default(),
            enforcement: EnforcementSettings::default(),
            override_flag: OverrideFlag::default(),
        }
    }
}

/// Get the platform config file path
pub fn get_config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "mathlock")
        .context("Failed to determine config directory")?;
    Ok(dirs.config_dir().join("config.yaml"))
}

/// Load configuration from a YAML file, failing fast on invalid settings
pub fn load_config(path: &Path) -> Result<LockConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: LockConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML config file: {}", path.display()))?;

    validate_config(&config)?;

    Ok(config)
}

/// Save configuration to a YAML file
pub fn save_config(path: &Path, config: &LockConfig) -> Result<()> {
    validate_config(config)?;

    let content = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    atomic_write(path, content.as_bytes())
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

/// Atomically write content to a file: temp file in the same directory,
/// sync, then rename over the target.
fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temporary file: {}", temp_path.display()))?;
        file.write_all(content)
            .context("Failed to write to temporary file")?;
        file.sync_all().context("Failed to sync file to disk")?;
    }

    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// Validate configuration.
///
/// The challenge generator requires an operand maximum >= 1 for every
/// operation it is asked to use; that precondition is enforced here, at
/// the load boundary, never inside the generator.
pub fn validate_config(config: &LockConfig) -> Result<()> {
    let challenge = &config.challenge;

    if !(1..=10).contains(&challenge.question_count) {
        anyhow::bail!(
            "question_count must be between 1 and 10, got {}",
            challenge.question_count
        );
    }

    for &op in &challenge.operations {
        let max = challenge.max_for(op);
        if max < 1 {
            anyhow::bail!("Operand maximum for {:?} must be at least 1, got {}", op, max);
        }
    }

    if config.windows.grace_minutes < 1 {
        anyhow::bail!(
            "grace_minutes must be at least 1, got {}",
            config.windows.grace_minutes
        );
    }

    if config.windows.monitor_interval_secs < 1 {
        anyhow::bail!("monitor_interval_secs must be at least 1");
    }

    Ok(())
}

/// Read-only configuration snapshots plus the single write the engine
/// performs: clearing or raising the override flag.
///
/// The engine reads a fresh immutable snapshot per decision point rather
/// than watching the store live.
pub trait ConfigStore {
    fn load(&self) -> Result<LockConfig>;

    fn set_override_active(
        &mut self,
        active: bool,
        activated_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// Configuration store backed by a YAML file on disk
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<LockConfig> {
        load_config(&self.path)
    }

    fn set_override_active(
        &mut self,
        active: bool,
        activated_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut config = load_config(&self.path)?;
        config.override_flag = OverrideFlag {
            active,
            activated_at,
        };
        save_config(&self.path, &config)
    }
}

/// In-memory store used by tests; clones share the same config.
#[cfg(test)]
#[derive(Clone)]
pub struct MemoryConfigStore {
    config: std::sync::Arc<std::sync::Mutex<LockConfig>>,
}

#[cfg(test)]
impl MemoryConfigStore {
    pub fn new(config: LockConfig) -> Self {
        Self {
            config: std::sync::Arc::new(std::sync::Mutex::new(config)),
        }
    }

    pub fn snapshot(&self) -> LockConfig {
        self.config.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<LockConfig> {
        Ok(self.config.lock().unwrap().clone())
    }

    fn set_override_active(
        &mut self,
        active: bool,
        activated_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut config = self.config.lock().unwrap();
        config.override_flag = OverrideFlag {
            active,
            activated_at,
        };
        Ok(())
    }
}
