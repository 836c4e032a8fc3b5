//! A bidirectional sync engine between a tablet task store (Device) and a desktop
//! reminders service (Host).
//!
//! The entry point is [`engine::SyncEngine`], built from a [`device::DeviceAdapter`], a
//! [`host::HostAdapter`], a [`sync_state::SyncStateStore`] and a [`config::SyncConfig`].

pub mod adapter;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod host;
pub mod sync_state;
pub mod task;

#[cfg(any(test, feature = "mock_adapters"))]
pub mod testing;

pub use adapter::{DeviceAdapter, HostAdapter, NamedList};
pub use config::SyncConfig;
pub use engine::{SyncEngine, SyncRunResult};
pub use error::{SyncError, SyncResult};
pub use sync_state::SyncStateStore;
pub use task::UnifiedTask;
