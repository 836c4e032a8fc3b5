//! Persistent pairing state between Device and Host, plus an append-only audit log.

mod store;

use serde::{Deserialize, Serialize};

pub use store::SyncStateStore;

/// Which side(s) of a pairing are currently known to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceSystem {
    Host,
    Device,
    Both,
}

impl SourceSystem {
    fn as_str(&self) -> &'static str {
        match self {
            SourceSystem::Host => "host",
            SourceSystem::Device => "device",
            SourceSystem::Both => "both",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "host" => SourceSystem::Host,
            "device" => SourceSystem::Device,
            _ => SourceSystem::Both,
        }
    }
}

/// One pairing between a Host task and a Device task, plus the hash agreed upon at the
/// last successful sync.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub sync_id: String,
    pub host_id: Option<String>,
    pub device_id: Option<String>,
    pub last_synced_hash: String,
    pub last_sync_time: i64,
    pub source_system: SourceSystem,
}

impl SyncRecord {
    pub fn new(sync_id: impl Into<String>) -> Self {
        Self {
            sync_id: sync_id.into(),
            host_id: None,
            device_id: None,
            last_synced_hash: String::new(),
            last_sync_time: 0,
            source_system: SourceSystem::Both,
        }
    }
}

/// A remembered pairing between a Device category and a Host list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub device_id: String,
    pub host_id: String,
    pub name: String,
}

/// Aggregate counts used by the `status` CLI command.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyncStateStats {
    pub host_only: usize,
    pub device_only: usize,
    pub both: usize,
}

/// One row of the audit log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub action: String,
    pub sync_id: Option<String>,
    pub details: Option<String>,
}
