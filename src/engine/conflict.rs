//! Decides which side wins when a paired task has changed on both sides since the last
//! successful sync.

use crate::config::{ConflictResolution, SyncConfig};
use crate::task::UnifiedTask;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictOutcome {
    /// Neither side needs to change.
    NoChange,
    /// Device should adopt Host's content.
    UpdateDevice,
    /// Host should adopt Device's content.
    UpdateHost,
}

/// The result of [`resolve`]: what should change, and whether it was a genuine
/// conflict (both sides changed since the last synced hash) as opposed to a one-sided
/// propagation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: ConflictOutcome,
    /// True only when both sides changed and a tie-break policy actually fired.
    pub is_conflict: bool,
}

/// Compares `host`/`device` content hashes against the hash last agreed upon, and
/// decides what (if anything) needs to change.
pub fn resolve(
    host: &UnifiedTask,
    device: &UnifiedTask,
    last_synced_hash: Option<&str>,
    config: &SyncConfig,
) -> Resolution {
    let host_hash = host.content_hash();
    let device_hash = device.content_hash();

    if host_hash == device_hash {
        return Resolution {
            outcome: ConflictOutcome::NoChange,
            is_conflict: false,
        };
    }

    let last = last_synced_hash.unwrap_or("");
    let host_changed = host_hash != last;
    let device_changed = device_hash != last;

    match (host_changed, device_changed) {
        (true, false) => Resolution {
            outcome: ConflictOutcome::UpdateDevice,
            is_conflict: false,
        },
        (false, true) => Resolution {
            outcome: ConflictOutcome::UpdateHost,
            is_conflict: false,
        },
        (false, false) => Resolution {
            outcome: ConflictOutcome::NoChange,
            is_conflict: false,
        },
        (true, true) => Resolution {
            outcome: match config.conflict_resolution {
                ConflictResolution::PreferHost => ConflictOutcome::UpdateDevice,
                ConflictResolution::PreferDevice => ConflictOutcome::UpdateHost,
                ConflictResolution::PreferRecent => resolve_by_recency(host, device, config),
            },
            is_conflict: true,
        },
    }
}

fn resolve_by_recency(host: &UnifiedTask, device: &UnifiedTask, config: &SyncConfig) -> ConflictOutcome {
    match (host.modified_at(), device.modified_at()) {
        (Some(h), Some(d)) => {
            let diff = (*h - *d).num_seconds().abs();
            if diff < config.conflict_window_seconds || h >= d {
                ConflictOutcome::UpdateDevice
            } else {
                ConflictOutcome::UpdateHost
            }
        }
        (Some(_), None) => ConflictOutcome::UpdateDevice,
        (None, Some(_)) => ConflictOutcome::UpdateHost,
        (None, None) => ConflictOutcome::UpdateDevice,
    }
}

/// Builds the task value to write to the losing side: the winner's content, the
/// loser's native id, and the document link always carried from Device (Host never
/// originates one).
pub fn apply_outcome(
    outcome: ConflictOutcome,
    host: &UnifiedTask,
    device: &UnifiedTask,
) -> Option<UnifiedTask> {
    match outcome {
        ConflictOutcome::NoChange => None,
        ConflictOutcome::UpdateDevice => {
            let mut updated = device.clone();
            updated.adopt_content_from(host);
            updated.set_document_link(device.document_link().cloned());
            Some(updated)
        }
        ConflictOutcome::UpdateHost => {
            let mut updated = host.clone();
            updated.adopt_content_from(device);
            updated.set_document_link(device.document_link().cloned());
            Some(updated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn task_with_title(title: &str) -> UnifiedTask {
        UnifiedTask::new(title)
    }

    #[test]
    fn identical_content_is_no_change() {
        let host = task_with_title("Buy milk");
        let device = task_with_title("Buy milk");
        let config = SyncConfig::default();
        let resolution = resolve(&host, &device, None, &config);
        assert_eq!(resolution.outcome, ConflictOutcome::NoChange);
        assert!(!resolution.is_conflict);
    }

    #[test]
    fn only_host_changed_updates_device_without_counting_as_a_conflict() {
        let mut host = task_with_title("Buy milk");
        let device = task_with_title("Buy milk");
        let last_hash = device.content_hash();
        host.set_title("Buy oat milk".into());
        let config = SyncConfig::default();
        let resolution = resolve(&host, &device, Some(&last_hash), &config);
        assert_eq!(resolution.outcome, ConflictOutcome::UpdateDevice);
        assert!(!resolution.is_conflict);
    }

    #[test]
    fn only_device_changed_updates_host_without_counting_as_a_conflict() {
        let host = task_with_title("Buy milk");
        let mut device = task_with_title("Buy milk");
        let last_hash = host.content_hash();
        device.set_title("Buy oat milk".into());
        let config = SyncConfig::default();
        let resolution = resolve(&host, &device, Some(&last_hash), &config);
        assert_eq!(resolution.outcome, ConflictOutcome::UpdateHost);
        assert!(!resolution.is_conflict);
    }

    #[test]
    fn both_changed_device_newer_outside_window_wins_and_counts_as_a_conflict() {
        use crate::task::UnifiedTask as T;

        let device_time = Utc::now();
        let host_time = device_time - Duration::seconds(120);

        let host = T::new_with_parameters(
            "Host edit".into(),
            String::new(),
            "Inbox".into(),
            false,
            None,
            None,
            None,
            Some(host_time),
            0,
            None,
            None,
            None,
        );
        let device = T::new_with_parameters(
            "Device edit".into(),
            String::new(),
            "Inbox".into(),
            false,
            None,
            None,
            None,
            Some(device_time),
            0,
            None,
            None,
            None,
        );

        let config = SyncConfig::default();
        let resolution = resolve(&host, &device, Some("stale0000000000"), &config);
        assert_eq!(resolution.outcome, ConflictOutcome::UpdateHost);
        assert!(resolution.is_conflict);
    }

    #[test]
    fn both_changed_exactly_at_the_window_boundary_favours_host() {
        use crate::task::UnifiedTask as T;

        // diff == conflict_window_seconds exactly; the original's strict `<` means this
        // boundary case falls through to the `h >= d` check rather than the window.
        let config = SyncConfig::default();
        let host_time = Utc::now();
        let device_time = host_time - Duration::seconds(config.conflict_window_seconds);

        let host = T::new_with_parameters(
            "Host edit".into(),
            String::new(),
            "Inbox".into(),
            false,
            None,
            None,
            None,
            Some(host_time),
            0,
            None,
            None,
            None,
        );
        let device = T::new_with_parameters(
            "Device edit".into(),
            String::new(),
            "Inbox".into(),
            false,
            None,
            None,
            None,
            Some(device_time),
            0,
            None,
            None,
            None,
        );

        let resolution = resolve(&host, &device, Some("stale0000000000"), &config);
        assert_eq!(resolution.outcome, ConflictOutcome::UpdateDevice);
        assert!(resolution.is_conflict);
    }

    #[test]
    fn prefer_host_always_wins_a_genuine_conflict() {
        let mut host = task_with_title("Buy milk");
        let mut device = task_with_title("Buy milk");
        let last_hash = "stale0000000000";
        host.set_title("Host edit".into());
        device.set_title("Device edit".into());

        let mut config = SyncConfig::default();
        config.conflict_resolution = ConflictResolution::PreferHost;
        let resolution = resolve(&host, &device, Some(last_hash), &config);
        assert_eq!(resolution.outcome, ConflictOutcome::UpdateDevice);
        assert!(resolution.is_conflict);
    }

    #[test]
    fn document_link_always_carried_from_device() {
        use crate::task::DocumentLink;
        let host = task_with_title("Buy milk");
        let mut device = task_with_title("Buy milk");
        device.set_document_link(Some(DocumentLink {
            app_name: "Notes".into(),
            file_id: "f1".into(),
            file_path: "a.note".into(),
            page: 1,
            page_id: "p1".into(),
        }));

        let updated = apply_outcome(ConflictOutcome::UpdateHost, &host, &device).unwrap();
        assert!(updated.document_link().is_some());
    }
}
