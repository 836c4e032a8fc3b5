//! In-memory doubles for [`DeviceAdapter`] and [`HostAdapter`], used by integration
//! tests and available to downstream crates under the `mock_adapters` feature.
//!
//! Grounded on the fault-injection pattern of a `(successes, failures)` counter: a
//! [`MockBehaviour`] can be told to fail the next N calls, then succeed, so tests can
//! exercise the engine's error-recording path without a flaky real backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::adapter::{DeviceAdapter, HostAdapter, NamedList};
use crate::error::{SyncError, SyncResult};
use crate::task::UnifiedTask;

pub struct MockBehaviour {
    remaining_failures: Mutex<u32>,
}

impl MockBehaviour {
    pub fn working() -> Self {
        Self {
            remaining_failures: Mutex::new(0),
        }
    }

    pub fn failing_n_times(n: u32) -> Self {
        Self {
            remaining_failures: Mutex::new(n),
        }
    }

    /// Consumes one call's worth of injected failure budget; `true` means this call
    /// should fail.
    fn decrement(&self) -> bool {
        let mut remaining = self.remaining_failures.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_hyphenated().to_string()
}

/// An in-memory stand-in for the device task store.
pub struct MockDeviceAdapter {
    tasks: Mutex<HashMap<String, UnifiedTask>>,
    categories: Mutex<HashMap<String, String>>,
    behaviour: MockBehaviour,
}

impl MockDeviceAdapter {
    pub fn new() -> Self {
        Self::with_behaviour(MockBehaviour::working())
    }

    pub fn with_behaviour(behaviour: MockBehaviour) -> Self {
        let mut categories = HashMap::new();
        categories.insert("inbox".to_string(), "Inbox".to_string());
        Self {
            tasks: Mutex::new(HashMap::new()),
            categories: Mutex::new(categories),
            behaviour,
        }
    }

    /// Seeds the store with a task that already has a device id assigned.
    pub fn seed(&self, mut task: UnifiedTask) -> String {
        let id = new_id();
        task.set_device_id(Some(id.clone()));
        self.tasks.lock().unwrap().insert(id.clone(), task);
        id
    }

    fn fail_if_configured(&self) -> SyncResult<()> {
        if self.behaviour.decrement() {
            Err(SyncError::Store {
                system: "device",
                detail: "injected test failure".into(),
            })
        } else {
            Ok(())
        }
    }
}

impl Default for MockDeviceAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceAdapter for MockDeviceAdapter {
    async fn list_tasks(
        &self,
        category: Option<&str>,
        include_completed: bool,
    ) -> SyncResult<Vec<UnifiedTask>> {
        self.fail_if_configured()?;
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks
            .values()
            .filter(|t| category.map(|c| c == t.category()).unwrap_or(true))
            .filter(|t| include_completed || !t.completed())
            .cloned()
            .collect())
    }

    async fn get_task(&self, id: &str) -> SyncResult<Option<UnifiedTask>> {
        self.fail_if_configured()?;
        Ok(self.tasks.lock().unwrap().get(id).cloned())
    }

    async fn create_task(&self, task: &UnifiedTask) -> SyncResult<String> {
        self.fail_if_configured()?;
        let id = new_id();
        let mut stored = task.clone();
        stored.set_device_id(Some(id.clone()));
        self.tasks.lock().unwrap().insert(id.clone(), stored);
        Ok(id)
    }

    async fn update_task(&self, task: &UnifiedTask) -> SyncResult<()> {
        self.fail_if_configured()?;
        let id = task
            .device_id()
            .ok_or_else(|| SyncError::InvalidInput("update_task requires a device_id".into()))?
            .to_string();
        let mut tasks = self.tasks.lock().unwrap();
        let existing_link = tasks.get(&id).and_then(|t| t.document_link().cloned());
        let mut updated = task.clone();
        if updated.document_link().is_none() {
            updated.set_document_link(existing_link);
        }
        tasks.insert(id, updated);
        Ok(())
    }

    async fn delete_task(&self, id: &str, _soft: bool) -> SyncResult<()> {
        self.fail_if_configured()?;
        self.tasks.lock().unwrap().remove(id);
        Ok(())
    }

    async fn list_categories(&self) -> SyncResult<Vec<NamedList>> {
        self.fail_if_configured()?;
        Ok(self
            .categories
            .lock()
            .unwrap()
            .iter()
            .map(|(id, name)| NamedList {
                id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }

    async fn create_category(&self, name: &str) -> SyncResult<String> {
        self.fail_if_configured()?;
        let id = new_id();
        self.categories
            .lock()
            .unwrap()
            .insert(id.clone(), name.to_string());
        Ok(id)
    }

    async fn rename_category(&self, id: &str, new_name: &str) -> SyncResult<()> {
        self.fail_if_configured()?;
        if let Some(name) = self.categories.lock().unwrap().get_mut(id) {
            *name = new_name.to_string();
        }
        Ok(())
    }

    async fn test_connection(&self) -> SyncResult<bool> {
        Ok(self.fail_if_configured().is_ok())
    }
}

/// An in-memory stand-in for the host reminder service.
pub struct MockHostAdapter {
    reminders: Mutex<HashMap<String, UnifiedTask>>,
    lists: Mutex<Vec<String>>,
    behaviour: MockBehaviour,
}

impl MockHostAdapter {
    pub fn new() -> Self {
        Self::with_behaviour(MockBehaviour::working())
    }

    pub fn with_behaviour(behaviour: MockBehaviour) -> Self {
        Self {
            reminders: Mutex::new(HashMap::new()),
            lists: Mutex::new(vec!["Inbox".to_string()]),
            behaviour,
        }
    }

    pub fn seed(&self, mut task: UnifiedTask) -> String {
        let id = new_id();
        task.set_host_id(Some(id.clone()));
        let mut lists = self.lists.lock().unwrap();
        if !lists.contains(&task.category().to_string()) {
            lists.push(task.category().to_string());
        }
        self.reminders.lock().unwrap().insert(id.clone(), task);
        id
    }

    fn fail_if_configured(&self) -> SyncResult<()> {
        if self.behaviour.decrement() {
            Err(SyncError::Store {
                system: "host",
                detail: "injected test failure".into(),
            })
        } else {
            Ok(())
        }
    }
}

impl Default for MockHostAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostAdapter for MockHostAdapter {
    async fn list_lists(&self) -> SyncResult<Vec<NamedList>> {
        self.fail_if_configured()?;
        Ok(self
            .lists
            .lock()
            .unwrap()
            .iter()
            .map(|name| NamedList {
                id: name.clone(),
                name: name.clone(),
            })
            .collect())
    }

    async fn list_reminders(&self, include_completed: bool) -> SyncResult<Vec<UnifiedTask>> {
        self.fail_if_configured()?;
        Ok(self
            .reminders
            .lock()
            .unwrap()
            .values()
            .filter(|t| include_completed || !t.completed())
            .cloned()
            .collect())
    }

    async fn get_reminder_by_id(&self, id: &str) -> SyncResult<Option<UnifiedTask>> {
        self.fail_if_configured()?;
        Ok(self.reminders.lock().unwrap().get(id).cloned())
    }

    async fn create_reminder(&self, task: &UnifiedTask) -> SyncResult<String> {
        self.fail_if_configured()?;
        let id = new_id();
        let mut stored = task.clone();
        stored.set_host_id(Some(id.clone()));
        let mut lists = self.lists.lock().unwrap();
        if !lists.contains(&task.category().to_string()) {
            lists.push(task.category().to_string());
        }
        self.reminders.lock().unwrap().insert(id.clone(), stored);
        Ok(id)
    }

    async fn update_reminder(&self, task: &UnifiedTask) -> SyncResult<()> {
        self.fail_if_configured()?;
        let id = task
            .host_id()
            .ok_or_else(|| SyncError::InvalidInput("update_reminder requires a host_id".into()))?
            .to_string();
        self.reminders.lock().unwrap().insert(id, task.clone());
        Ok(())
    }

    async fn delete_reminder(&self, id: &str) -> SyncResult<()> {
        self.fail_if_configured()?;
        self.reminders.lock().unwrap().remove(id);
        Ok(())
    }

    async fn rename_list(&self, old_name: &str, new_name: &str) -> SyncResult<()> {
        self.fail_if_configured()?;
        let mut lists = self.lists.lock().unwrap();
        if let Some(slot) = lists.iter_mut().find(|l| *l == old_name) {
            *slot = new_name.to_string();
        }
        let mut reminders = self.reminders.lock().unwrap();
        for reminder in reminders.values_mut() {
            if reminder.category() == old_name {
                reminder.set_category(new_name.to_string());
            }
        }
        Ok(())
    }

    async fn create_list(&self, name: &str) -> SyncResult<String> {
        self.fail_if_configured()?;
        let mut lists = self.lists.lock().unwrap();
        if !lists.contains(&name.to_string()) {
            lists.push(name.to_string());
        }
        Ok(name.to_string())
    }

    async fn test_connection(&self) -> SyncResult<bool> {
        Ok(self.fail_if_configured().is_ok())
    }
}
