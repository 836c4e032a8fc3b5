//! Three-step pairing of Device and Host tasks against the persisted sync records, and
//! the action list that falls out of it.

use std::collections::HashMap;

use chrono::Utc;

use crate::config::SyncConfig;
use crate::engine::conflict::{self, ConflictOutcome, Resolution};
use crate::sync_state::SyncRecord;
use crate::task::UnifiedTask;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Device,
    Host,
}

#[derive(Clone, Debug)]
pub struct SyncAction {
    pub kind: ActionKind,
    pub target: Target,
    pub task: UnifiedTask,
    pub reason: String,
    pub sync_id: String,
    /// The device-native id this pairing is known by, if any existed before this action.
    pub device_id: Option<String>,
    /// The host-native id this pairing is known by, if any existed before this action.
    pub host_id: Option<String>,
    /// True only for an `Update` born of a genuine two-sided conflict (both sides
    /// changed since the last synced hash), as opposed to a one-sided propagation.
    pub is_conflict: bool,
}

#[derive(Default)]
pub struct PairingOutcome {
    pub actions: Vec<SyncAction>,
    /// Sync records to persist immediately, bypassing action execution, because the
    /// pairing step itself determined no change was needed (title-bootstrap match).
    pub immediate_records: Vec<SyncRecord>,
    /// Sync records whose both sides vanished; safe to delete once actions commit.
    pub orphaned_record_ids: Vec<String>,
}

pub fn plan(
    device_tasks: Vec<UnifiedTask>,
    host_tasks: Vec<UnifiedTask>,
    records: &[SyncRecord],
    config: &SyncConfig,
) -> PairingOutcome {
    let mut device_by_id: HashMap<String, UnifiedTask> = device_tasks
        .into_iter()
        .filter_map(|t| t.device_id().map(|id| (id.to_string(), t)))
        .collect();
    let mut host_by_id: HashMap<String, UnifiedTask> = host_tasks
        .into_iter()
        .filter_map(|t| t.host_id().map(|id| (id.to_string(), t)))
        .collect();

    let mut outcome = PairingOutcome::default();

    // Step 1: pair via existing sync records.
    for record in records {
        let host_task = record.host_id.as_ref().and_then(|id| host_by_id.remove(id));
        let device_task = record
            .device_id
            .as_ref()
            .and_then(|id| device_by_id.remove(id));

        match (host_task, device_task) {
            (Some(host_task), Some(device_task)) => {
                let result = conflict::resolve(
                    &host_task,
                    &device_task,
                    Some(&record.last_synced_hash),
                    config,
                );
                if let Some(action) = action_from_outcome(
                    result,
                    &host_task,
                    &device_task,
                    record.sync_id.clone(),
                    record.host_id.clone(),
                    record.device_id.clone(),
                ) {
                    outcome.actions.push(action);
                }
            }
            (Some(host_task), None) => {
                outcome.actions.push(SyncAction {
                    kind: ActionKind::Delete,
                    target: Target::Host,
                    task: host_task,
                    reason: "deleted from device".to_string(),
                    sync_id: record.sync_id.clone(),
                    device_id: record.device_id.clone(),
                    host_id: record.host_id.clone(),
                    is_conflict: false,
                });
            }
            (None, Some(device_task)) => {
                outcome.actions.push(SyncAction {
                    kind: ActionKind::Delete,
                    target: Target::Device,
                    task: device_task,
                    reason: "deleted from host".to_string(),
                    sync_id: record.sync_id.clone(),
                    device_id: record.device_id.clone(),
                    host_id: record.host_id.clone(),
                    is_conflict: false,
                });
            }
            (None, None) => outcome.orphaned_record_ids.push(record.sync_id.clone()),
        }
    }

    // Step 2: title-based bootstrap among the remaining, unmatched tasks.
    bootstrap_by_title(&mut host_by_id, &mut device_by_id, config, &mut outcome);

    // Step 3: whatever is left is genuinely new on one side.
    for (_, host_task) in host_by_id {
        if should_skip_old_completed_task(&host_task, config) {
            continue;
        }
        let host_id = host_task.host_id().map(String::from);
        outcome.actions.push(SyncAction {
            kind: ActionKind::Create,
            target: Target::Device,
            task: host_task,
            reason: "new on host".to_string(),
            sync_id: new_sync_id(),
            device_id: None,
            host_id,
            is_conflict: false,
        });
    }
    for (_, device_task) in device_by_id {
        let device_id = device_task.device_id().map(String::from);
        outcome.actions.push(SyncAction {
            kind: ActionKind::Create,
            target: Target::Host,
            task: device_task,
            reason: "new on device".to_string(),
            sync_id: new_sync_id(),
            device_id,
            host_id: None,
            is_conflict: false,
        });
    }

    outcome
}

fn bootstrap_by_title(
    host_by_id: &mut HashMap<String, UnifiedTask>,
    device_by_id: &mut HashMap<String, UnifiedTask>,
    config: &SyncConfig,
    outcome: &mut PairingOutcome,
) {
    let mut host_by_title: HashMap<String, Vec<String>> = HashMap::new();
    for (id, task) in host_by_id.iter() {
        host_by_title
            .entry(title_key(task.title()))
            .or_default()
            .push(id.clone());
    }
    let mut device_by_title: HashMap<String, Vec<String>> = HashMap::new();
    for (id, task) in device_by_id.iter() {
        device_by_title
            .entry(title_key(task.title()))
            .or_default()
            .push(id.clone());
    }

    for (title, host_ids) in host_by_title {
        if host_ids.len() != 1 {
            continue;
        }
        let device_ids = match device_by_title.get(&title) {
            Some(ids) if ids.len() == 1 => ids,
            _ => continue,
        };

        let host_id = host_ids[0].clone();
        let device_id = device_ids[0].clone();
        let host_task = host_by_id.remove(&host_id).expect("indexed above");
        let device_task = device_by_id.remove(&device_id).expect("indexed above");

        let sync_id = new_sync_id();
        let result = conflict::resolve(&host_task, &device_task, None, config);
        match action_from_outcome(
            result,
            &host_task,
            &device_task,
            sync_id.clone(),
            Some(host_id.clone()),
            Some(device_id.clone()),
        ) {
            Some(action) => outcome.actions.push(action),
            None => outcome.immediate_records.push(SyncRecord {
                sync_id,
                host_id: Some(host_id),
                device_id: Some(device_id),
                last_synced_hash: host_task.content_hash(),
                last_sync_time: Utc::now().timestamp(),
                source_system: crate::sync_state::SourceSystem::Both,
            }),
        }
    }
}

fn action_from_outcome(
    resolution: Resolution,
    host: &UnifiedTask,
    device: &UnifiedTask,
    sync_id: String,
    host_id: Option<String>,
    device_id: Option<String>,
) -> Option<SyncAction> {
    let updated = conflict::apply_outcome(resolution.outcome, host, device)?;
    let (target, reason) = match resolution.outcome {
        ConflictOutcome::UpdateDevice => (Target::Device, "conflict resolved in favor of host"),
        ConflictOutcome::UpdateHost => (Target::Host, "conflict resolved in favor of device"),
        ConflictOutcome::NoChange => unreachable!("apply_outcome returns None for NoChange"),
    };
    Some(SyncAction {
        kind: ActionKind::Update,
        target,
        task: updated,
        reason: reason.to_string(),
        sync_id,
        device_id,
        host_id,
        is_conflict: resolution.is_conflict,
    })
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

fn new_sync_id() -> String {
    uuid::Uuid::new_v4().to_hyphenated().to_string()
}

/// A completed Host task with no existing record, older than the configured cutoff, is
/// left alone rather than created on Device or deleted from Host.
fn should_skip_old_completed_task(task: &UnifiedTask, config: &SyncConfig) -> bool {
    if !task.completed() {
        return false;
    }
    match task.completion_date() {
        Some(date) => (Utc::now() - *date).num_days() > config.completed_task_max_age_days,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn host_task(title: &str, host_id: &str) -> UnifiedTask {
        let mut t = UnifiedTask::new(title);
        t.set_host_id(Some(host_id.to_string()));
        t
    }

    fn device_task(title: &str, device_id: &str) -> UnifiedTask {
        let mut t = UnifiedTask::new(title);
        t.set_device_id(Some(device_id.to_string()));
        t
    }

    #[test]
    fn unmatched_host_only_task_creates_on_device() {
        let config = SyncConfig::default();
        let outcome = plan(vec![], vec![host_task("Buy milk", "h1")], &[], &config);
        assert_eq!(outcome.actions.len(), 1);
        assert_eq!(outcome.actions[0].kind, ActionKind::Create);
        assert_eq!(outcome.actions[0].target, Target::Device);
    }

    #[test]
    fn unmatched_device_only_task_creates_on_host() {
        let config = SyncConfig::default();
        let outcome = plan(vec![device_task("Buy milk", "d1")], vec![], &[], &config);
        assert_eq!(outcome.actions.len(), 1);
        assert_eq!(outcome.actions[0].target, Target::Host);
    }

    #[test]
    fn old_completed_host_only_task_is_skipped() {
        let config = SyncConfig::default();
        let old = UnifiedTask::new_with_parameters(
            "Pay rent".to_string(),
            String::new(),
            "Inbox".to_string(),
            true,
            Some(Utc::now() - Duration::days(200)),
            None,
            None,
            Some(Utc::now() - Duration::days(200)),
            0,
            None,
            Some("h1".to_string()),
            None,
        );
        let outcome = plan(vec![], vec![old], &[], &config);
        assert!(outcome.actions.is_empty());
    }

    #[test]
    fn title_bootstrap_pairs_unique_titles_with_no_action_when_content_matches() {
        let config = SyncConfig::default();
        let outcome = plan(
            vec![device_task("Call Alice", "d1")],
            vec![host_task("Call Alice", "h1")],
            &[],
            &config,
        );
        assert!(outcome.actions.is_empty());
        assert_eq!(outcome.immediate_records.len(), 1);
        assert_eq!(outcome.immediate_records[0].host_id.as_deref(), Some("h1"));
        assert_eq!(outcome.immediate_records[0].device_id.as_deref(), Some("d1"));
    }

    #[test]
    fn title_bootstrap_skips_when_title_not_unique_on_both_sides() {
        let config = SyncConfig::default();
        let outcome = plan(
            vec![device_task("Call Alice", "d1")],
            vec![host_task("Call Alice", "h1"), host_task("Call Alice", "h2")],
            &[],
            &config,
        );
        // Ambiguous on the host side; all three remain unmatched creates.
        assert_eq!(outcome.actions.len(), 3);
    }

    #[test]
    fn record_pairing_deletes_device_side_when_host_record_disappeared() {
        let config = SyncConfig::default();
        let record = SyncRecord {
            sync_id: "s1".into(),
            host_id: Some("h1".into()),
            device_id: Some("d1".into()),
            last_synced_hash: "whatever".into(),
            last_sync_time: 0,
            source_system: crate::sync_state::SourceSystem::Both,
        };
        let outcome = plan(vec![device_task("Buy milk", "d1")], vec![], &[record], &config);
        assert_eq!(outcome.actions.len(), 1);
        assert_eq!(outcome.actions[0].kind, ActionKind::Delete);
        assert_eq!(outcome.actions[0].target, Target::Device);
    }

    #[test]
    fn both_sides_gone_marks_record_orphaned() {
        let config = SyncConfig::default();
        let record = SyncRecord {
            sync_id: "s1".into(),
            host_id: Some("h1".into()),
            device_id: Some("d1".into()),
            last_synced_hash: "whatever".into(),
            last_sync_time: 0,
            source_system: crate::sync_state::SourceSystem::Both,
        };
        let outcome = plan(vec![], vec![], &[record], &config);
        assert!(outcome.actions.is_empty());
        assert_eq!(outcome.orphaned_record_ids, vec!["s1".to_string()]);
    }
}
