//! Orchestrates a full sync run: category reconciliation, dedup, pairing, conflict
//! resolution and action execution, in that strict order with no concurrent fan-out.

pub mod categories;
pub mod conflict;
pub mod dedupe;
pub mod pairing;

use log::{info, warn};
use serde::Serialize;

use crate::adapter::{DeviceAdapter, HostAdapter};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::sync_state::{SourceSystem, SyncRecord, SyncStateStats, SyncStateStore};

use pairing::{ActionKind, SyncAction, Target};

/// Outcome of a single [`SyncEngine::run`] call.
#[derive(Debug, Default, Serialize)]
pub struct SyncRunResult {
    pub created_on_device: usize,
    pub created_on_host: usize,
    pub updated_on_device: usize,
    pub updated_on_host: usize,
    pub deleted_on_device: usize,
    pub deleted_on_host: usize,
    pub conflicts_resolved: usize,
    pub no_change: usize,
    pub deduped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub device_tasks: usize,
    pub host_reminders: usize,
    pub sync_state: SyncStateStats,
    pub recent_logs: Vec<crate::sync_state::LogEntry>,
}

pub struct SyncEngine<D, H> {
    device: D,
    host: H,
    store: SyncStateStore,
    config: SyncConfig,
}

impl<D, H> SyncEngine<D, H>
where
    D: DeviceAdapter,
    H: HostAdapter,
{
    pub fn new(device: D, host: H, store: SyncStateStore, config: SyncConfig) -> Self {
        Self {
            device,
            host,
            store,
            config,
        }
    }

    /// Runs one full sync pass. With `dry_run`, actions are planned and counted but
    /// never executed and the sync-state store is left untouched.
    pub async fn run(&self, dry_run: bool) -> SyncResult<SyncRunResult> {
        info!("sync run starting (dry_run={dry_run})");
        self.store.log_action("sync_start", None, None)?;

        categories::reconcile(&self.device, &self.host, &self.store).await?;

        let device_tasks = self
            .device
            .list_tasks(None, self.config.sync_completed_tasks)
            .await?;
        let mut host_tasks = self
            .host
            .list_reminders(self.config.sync_completed_tasks)
            .await?;

        let mut result = SyncRunResult::default();

        if self.config.dedupe_repeating_tasks {
            let (kept, dropped) = dedupe::dedupe_repeating(host_tasks);
            host_tasks = kept;
            result.deduped = dropped;
            if dropped > 0 {
                info!("deduped {dropped} repeating host tasks");
            }
        }

        let records = self.store.all_records()?;
        let outcome = pairing::plan(device_tasks, host_tasks, &records, &self.config);
        result.no_change = outcome.immediate_records.len();

        if !dry_run {
            for record in &outcome.immediate_records {
                self.store.upsert(record)?;
            }
            for sync_id in &outcome.orphaned_record_ids {
                self.store.delete(sync_id)?;
            }
        }

        for action in outcome.actions {
            match self.execute(&action, dry_run).await {
                Ok(new_native_id) => {
                    tally(&mut result, &action);
                    if !dry_run {
                        self.commit_record(&action, new_native_id)?;
                    }
                }
                Err(e) => {
                    warn!(
                        "action failed: {:?} {:?} ({}): {e}",
                        action.kind, action.target, action.reason
                    );
                    result
                        .errors
                        .push(format!("{:?} {:?}: {e}", action.kind, action.target));
                }
            }
        }

        self.store.log_action(
            "sync_complete",
            None,
            Some(&serde_json::to_string(&result).unwrap_or_default()),
        )?;
        info!("sync run complete: {result:?}");
        Ok(result)
    }

    async fn execute(&self, action: &SyncAction, dry_run: bool) -> SyncResult<Option<String>> {
        if dry_run {
            return Ok(None);
        }
        match (action.kind, action.target) {
            (ActionKind::Create, Target::Device) => {
                Ok(Some(self.device.create_task(&action.task).await?))
            }
            (ActionKind::Create, Target::Host) => {
                Ok(Some(self.host.create_reminder(&action.task).await?))
            }
            (ActionKind::Update, Target::Device) => {
                self.device.update_task(&action.task).await?;
                Ok(None)
            }
            (ActionKind::Update, Target::Host) => {
                self.host.update_reminder(&action.task).await?;
                Ok(None)
            }
            (ActionKind::Delete, Target::Device) => {
                let id = action.device_id.as_deref().ok_or_else(|| {
                    SyncError::InvalidInput("delete on device requires a device_id".into())
                })?;
                self.device.delete_task(id, true).await?;
                Ok(None)
            }
            (ActionKind::Delete, Target::Host) => {
                let id = action.host_id.as_deref().ok_or_else(|| {
                    SyncError::InvalidInput("delete on host requires a host_id".into())
                })?;
                self.host.delete_reminder(id).await?;
                Ok(None)
            }
        }
    }

    /// Persists (or removes) the sync record for `action` right after it commits, so a
    /// crash mid-run never leaves the store out of sync with what was actually done.
    fn commit_record(&self, action: &SyncAction, new_native_id: Option<String>) -> SyncResult<()> {
        if action.kind == ActionKind::Delete {
            self.store.delete(&action.sync_id)?;
            return Ok(());
        }

        let mut record = self
            .store
            .get_by_sync_id(&action.sync_id)?
            .unwrap_or_else(|| SyncRecord::new(action.sync_id.clone()));

        match action.target {
            Target::Device => {
                record.device_id = new_native_id.or_else(|| action.device_id.clone());
                record.host_id = action.host_id.clone();
            }
            Target::Host => {
                record.host_id = new_native_id.or_else(|| action.host_id.clone());
                record.device_id = action.device_id.clone();
            }
        }
        record.last_synced_hash = action.task.content_hash();
        record.last_sync_time = chrono::Utc::now().timestamp();
        record.source_system = SourceSystem::Both;
        self.store.upsert(&record)
    }

    /// Reconciles categories/lists only, without touching any task. Used by the
    /// `categories` CLI command to preview/apply renames independently of a full sync.
    pub async fn reconcile_categories_only(&self) -> SyncResult<()> {
        categories::reconcile(&self.device, &self.host, &self.store).await
    }

    pub async fn status(&self) -> SyncResult<StatusReport> {
        let device_tasks = self.device.list_tasks(None, true).await?.len();
        let host_reminders = self.host.list_reminders(true).await?.len();
        Ok(StatusReport {
            device_tasks,
            host_reminders,
            sync_state: self.store.stats()?,
            recent_logs: self.store.recent_logs(10)?,
        })
    }

    pub async fn test_connections(&self) -> SyncResult<(bool, bool)> {
        Ok((
            self.device.test_connection().await?,
            self.host.test_connection().await?,
        ))
    }

    pub fn clear_state(&self) -> SyncResult<()> {
        self.store.clear_all()
    }

    pub fn store(&self) -> &SyncStateStore {
        &self.store
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}

fn tally(result: &mut SyncRunResult, action: &SyncAction) {
    match (action.kind, action.target) {
        (ActionKind::Create, Target::Device) => result.created_on_device += 1,
        (ActionKind::Create, Target::Host) => result.created_on_host += 1,
        (ActionKind::Update, Target::Device) => {
            result.updated_on_device += 1;
            if action.is_conflict {
                result.conflicts_resolved += 1;
            }
        }
        (ActionKind::Update, Target::Host) => {
            result.updated_on_host += 1;
            if action.is_conflict {
                result.conflicts_resolved += 1;
            }
        }
        (ActionKind::Delete, Target::Device) => result.deleted_on_device += 1,
        (ActionKind::Delete, Target::Host) => result.deleted_on_host += 1,
    }
}
