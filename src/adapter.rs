//! The two adapter contracts the sync engine is built against.
//!
//! Concrete implementations live in [`crate::device`] and [`crate::host`]; tests use the
//! in-memory doubles in [`crate::testing`].

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::task::UnifiedTask;

/// A named category/list as seen by either store.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedList {
    pub id: String,
    pub name: String,
}

/// Interface to the device's local task storage.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    async fn list_tasks(
        &self,
        category: Option<&str>,
        include_completed: bool,
    ) -> SyncResult<Vec<UnifiedTask>>;

    async fn get_task(&self, id: &str) -> SyncResult<Option<UnifiedTask>>;

    /// Creates the task and returns the device-native id assigned to it.
    async fn create_task(&self, task: &UnifiedTask) -> SyncResult<String>;

    async fn update_task(&self, task: &UnifiedTask) -> SyncResult<()>;

    /// Soft-deletes by default: the row is kept with a deleted flag set, matching the
    /// device store's own recovery semantics.
    async fn delete_task(&self, id: &str, soft: bool) -> SyncResult<()>;

    async fn list_categories(&self) -> SyncResult<Vec<NamedList>>;

    async fn create_category(&self, name: &str) -> SyncResult<String>;

    async fn rename_category(&self, id: &str, new_name: &str) -> SyncResult<()>;

    async fn test_connection(&self) -> SyncResult<bool>;
}

/// Interface to the host's reminder storage.
#[async_trait]
pub trait HostAdapter: Send + Sync {
    async fn list_lists(&self) -> SyncResult<Vec<NamedList>>;

    async fn list_reminders(&self, include_completed: bool) -> SyncResult<Vec<UnifiedTask>>;

    async fn get_reminder_by_id(&self, id: &str) -> SyncResult<Option<UnifiedTask>>;

    /// Creates the reminder and returns its canonical host id.
    async fn create_reminder(&self, task: &UnifiedTask) -> SyncResult<String>;

    async fn update_reminder(&self, task: &UnifiedTask) -> SyncResult<()>;

    async fn delete_reminder(&self, id: &str) -> SyncResult<()>;

    async fn rename_list(&self, old_name: &str, new_name: &str) -> SyncResult<()>;

    /// Creates an empty list and returns its canonical id (Host addresses lists by name).
    async fn create_list(&self, name: &str) -> SyncResult<String>;

    async fn test_connection(&self) -> SyncResult<bool>;
}
