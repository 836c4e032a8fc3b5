//! Environment-driven configuration for a sync run.

use crate::error::{SyncError, SyncResult};

/// How the conflict resolver should break a tie when both sides changed since the last
/// synced hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Compare `modified_at`; within `conflict_window_seconds`, Host wins.
    PreferRecent,
    /// Host always wins a genuine conflict.
    PreferHost,
    /// Device always wins a genuine conflict.
    PreferDevice,
}

impl ConflictResolution {
    fn parse(raw: &str) -> SyncResult<Self> {
        match raw {
            "prefer_recent" => Ok(Self::PreferRecent),
            "prefer_host" => Ok(Self::PreferHost),
            "prefer_device" => Ok(Self::PreferDevice),
            other => Err(SyncError::Config(format!(
                "unrecognised CONFLICT_RESOLUTION value {other:?}; expected one of \
                 prefer_recent, prefer_host, prefer_device"
            ))),
        }
    }
}

/// All of the knobs the sync engine reads at the start of a run.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub conflict_resolution: ConflictResolution,
    pub conflict_window_seconds: i64,
    pub sync_completed_tasks: bool,
    pub completed_task_max_age_days: i64,
    pub dedupe_repeating_tasks: bool,
    pub sync_state_path: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            conflict_resolution: ConflictResolution::PreferRecent,
            conflict_window_seconds: 60,
            sync_completed_tasks: true,
            completed_task_max_age_days: 180,
            dedupe_repeating_tasks: true,
            sync_state_path: "sync_state.db".to_string(),
        }
    }
}

impl SyncConfig {
    /// Loads an optional `.env` file (if present) then builds the config from the
    /// process environment, falling back to [`SyncConfig::default`] for unset keys.
    pub fn from_env() -> SyncResult<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(raw) = std::env::var("CONFLICT_RESOLUTION") {
            config.conflict_resolution = ConflictResolution::parse(&raw)?;
        }
        if let Ok(raw) = std::env::var("CONFLICT_WINDOW_SECONDS") {
            config.conflict_window_seconds = raw
                .parse()
                .map_err(|_| SyncError::Config(format!("CONFLICT_WINDOW_SECONDS must be an integer, got {raw:?}")))?;
        }
        if let Ok(raw) = std::env::var("SYNC_COMPLETED_TASKS") {
            config.sync_completed_tasks = parse_bool(&raw)?;
        }
        if let Ok(raw) = std::env::var("COMPLETED_TASK_MAX_AGE_DAYS") {
            config.completed_task_max_age_days = raw.parse().map_err(|_| {
                SyncError::Config(format!(
                    "COMPLETED_TASK_MAX_AGE_DAYS must be an integer, got {raw:?}"
                ))
            })?;
        }
        if let Ok(raw) = std::env::var("DEDUPE_REPEATING_TASKS") {
            config.dedupe_repeating_tasks = parse_bool(&raw)?;
        }
        if let Ok(raw) = std::env::var("SYNC_STATE_PATH") {
            config.sync_state_path = raw;
        }

        Ok(config)
    }

    pub fn print(&self) {
        println!("conflict_resolution: {:?}", self.conflict_resolution);
        println!("conflict_window_seconds: {}", self.conflict_window_seconds);
        println!("sync_completed_tasks: {}", self.sync_completed_tasks);
        println!(
            "completed_task_max_age_days: {}",
            self.completed_task_max_age_days
        );
        println!("dedupe_repeating_tasks: {}", self.dedupe_repeating_tasks);
        println!("sync_state_path: {}", self.sync_state_path);
    }
}

fn parse_bool(raw: &str) -> SyncResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(SyncError::Config(format!(
            "expected a boolean (true/false), got {other:?}"
        ))),
    }
}
