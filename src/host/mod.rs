//! A concrete [`HostAdapter`] that drives the host's reminder service through an
//! external command-line binary, one subprocess invocation per logical operation.

pub mod priority;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;

use crate::adapter::{HostAdapter, NamedList};
use crate::error::{SyncError, SyncResult};
use crate::task::UnifiedTask;

use priority::{from_host_priority, to_host_priority};

const SYSTEM: &str = "host";

/// Strips the legacy `[sync:<uuid>]` marker an older version of this system used to
/// embed in reminder notes to pair tasks before the sync-state store existed.
fn strip_legacy_sync_marker(notes: &str) -> String {
    let pattern = regex::Regex::new(r"\s*\[sync:[0-9a-fA-F-]+\]\s*$").expect("static regex");
    pattern.replace(notes, "").trim_end().to_string()
}

/// Removes the readable document-link suffix (see [`crate::task::DocumentLink::notes_suffix`])
/// before the notes are treated as this task's Host-side content.
fn strip_document_link_suffix(notes: &str) -> String {
    let pattern = regex::Regex::new(r"\n?\u{1F4CE}[^\n]*$").expect("static regex");
    pattern.replace(notes, "").trim_end().to_string()
}

/// Strips the `x-apple-reminder://`-style URI scheme some ingress paths prefix ids with.
pub fn normalize_host_id(id: &str) -> String {
    id.rsplit("://").next().unwrap_or(id).to_string()
}

#[derive(Debug, Deserialize)]
struct RawReminder {
    #[serde(rename = "externalId")]
    external_id: String,
    title: String,
    #[serde(default)]
    notes: String,
    list: String,
    #[serde(rename = "isCompleted")]
    is_completed: bool,
    #[serde(default, rename = "dueDate")]
    due_date: Option<DateTime<Utc>>,
    #[serde(default, rename = "completionDate")]
    completion_date: Option<DateTime<Utc>>,
    #[serde(default, rename = "creationDate")]
    creation_date: Option<DateTime<Utc>>,
    #[serde(default, rename = "lastModified")]
    last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    priority: u8,
}

impl RawReminder {
    fn into_task(self) -> UnifiedTask {
        let notes = strip_document_link_suffix(&strip_legacy_sync_marker(&self.notes));
        let mut task = UnifiedTask::new_with_parameters(
            self.title,
            notes,
            self.list,
            self.is_completed,
            self.completion_date,
            self.due_date,
            self.creation_date,
            self.last_modified,
            from_host_priority(self.priority),
            None,
            Some(normalize_host_id(&self.external_id)),
            None,
        );
        task.set_host_id(Some(normalize_host_id(&self.external_id)));
        task
    }
}

/// Binary paths for the two external helpers this adapter shells out to.
#[derive(Clone, Debug)]
pub struct HostCliPaths {
    /// A `reminders-cli`-compatible binary used for list/add/complete/edit/delete.
    pub reminders_bin: String,
}

impl Default for HostCliPaths {
    fn default() -> Self {
        Self {
            reminders_bin: "reminders".to_string(),
        }
    }
}

pub struct HostCliAdapter {
    paths: HostCliPaths,
}

impl HostCliAdapter {
    pub fn new(paths: HostCliPaths) -> Self {
        Self { paths }
    }

    async fn run(&self, args: &[&str]) -> SyncResult<String> {
        let output = Command::new(&self.paths.reminders_bin)
            .args(args)
            .output()
            .await
            .map_err(|e| SyncError::Store {
                system: SYSTEM,
                detail: format!("failed to spawn {}: {e}", self.paths.reminders_bin),
            })?;

        if !output.status.success() {
            return Err(SyncError::Store {
                system: SYSTEM,
                detail: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn ensure_list_exists(&self, name: &str) -> SyncResult<()> {
        let lists = self.list_lists().await?;
        if lists.iter().any(|l| l.name == name) {
            return Ok(());
        }
        self.run(&["new-list", name]).await?;
        Ok(())
    }

    /// Finds the (list, index) reminders-cli needs to address an item by its externalId,
    /// since the CLI has no direct "edit by id" verb.
    async fn locate(&self, host_id: &str) -> SyncResult<Option<(String, usize)>> {
        let lists = self.list_lists().await?;
        for list in lists {
            let raw = self.run(&["show", &list.name, "--format", "json"]).await?;
            let reminders: Vec<RawReminder> = serde_json::from_str(&raw).unwrap_or_default();
            for (index, reminder) in reminders.iter().enumerate() {
                if normalize_host_id(&reminder.external_id) == host_id {
                    return Ok(Some((list.name.clone(), index)));
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl HostAdapter for HostCliAdapter {
    async fn list_lists(&self) -> SyncResult<Vec<NamedList>> {
        let raw = self.run(&["show-lists", "--format", "json"]).await?;
        let names: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
        Ok(names
            .into_iter()
            .map(|name| NamedList {
                id: name.clone(),
                name,
            })
            .collect())
    }

    async fn list_reminders(&self, include_completed: bool) -> SyncResult<Vec<UnifiedTask>> {
        let lists = self.list_lists().await?;
        let mut tasks = Vec::new();
        for list in lists {
            let mut args = vec!["show", list.name.as_str(), "--format", "json"];
            if include_completed {
                args.push("--include-completed");
            }
            let raw = self.run(&args).await?;
            let reminders: Vec<RawReminder> = serde_json::from_str(&raw).unwrap_or_default();
            tasks.extend(reminders.into_iter().map(RawReminder::into_task));
        }
        Ok(tasks)
    }

    async fn get_reminder_by_id(&self, id: &str) -> SyncResult<Option<UnifiedTask>> {
        let id = normalize_host_id(id);
        for task in self.list_reminders(true).await? {
            if task.host_id() == Some(id.as_str()) {
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    async fn create_reminder(&self, task: &UnifiedTask) -> SyncResult<String> {
        self.ensure_list_exists(task.category()).await?;

        let mut notes = task.notes().to_string();
        if let Some(link) = task.document_link() {
            if !notes.is_empty() {
                notes.push('\n');
            }
            notes.push_str(&link.notes_suffix());
        }

        let priority_bucket = priority_bucket_name(to_host_priority(task.priority()));
        let due = task.due_date().map(|d| d.to_rfc3339());

        let mut args = vec!["add", task.category(), task.title()];
        if !notes.is_empty() {
            args.push("--notes");
            args.push(&notes);
        }
        args.push("--priority");
        args.push(priority_bucket);
        if let Some(ref due) = due {
            args.push("--due-date");
            args.push(due);
        }

        self.run(&args).await?;

        // reminders-cli prints nothing resembling an id back from `add`; the newly
        // created item is found the same way any other lookup finds one, by index scan.
        let created = self
            .get_reminder_by_id_matching(task.category(), task.title())
            .await?
            .ok_or_else(|| SyncError::Store {
                system: SYSTEM,
                detail: "reminder created but could not be located afterwards".into(),
            })?;
        Ok(created)
    }

    async fn update_reminder(&self, task: &UnifiedTask) -> SyncResult<()> {
        let host_id = task
            .host_id()
            .ok_or_else(|| SyncError::InvalidInput("update_reminder requires a host_id".into()))?;
        let (list, index) = self
            .locate(host_id)
            .await?
            .ok_or_else(|| SyncError::NotFound {
                system: SYSTEM,
                id: host_id.to_string(),
            })?;
        let index_str = index.to_string();

        if task.completed() {
            self.run(&["complete", &list, &index_str]).await?;
        } else {
            self.run(&["uncomplete", &list, &index_str]).await?;
        }

        let mut notes = task.notes().to_string();
        if let Some(link) = task.document_link() {
            if !notes.is_empty() {
                notes.push('\n');
            }
            notes.push_str(&link.notes_suffix());
        }
        let priority_bucket = priority_bucket_name(to_host_priority(task.priority())).to_string();
        let due = task.due_date().map(|d| d.to_rfc3339());

        let mut args = vec![
            "edit".to_string(),
            list.clone(),
            index_str.clone(),
            "--title".to_string(),
            task.title().to_string(),
            "--notes".to_string(),
            notes,
            "--priority".to_string(),
            priority_bucket,
        ];
        if let Some(due) = due {
            args.push("--due-date".to_string());
            args.push(due);
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs).await?;

        if task.category() != list {
            // reminders-cli addresses items by (list, index); moving lists means
            // re-creating the reminder under the new list and deleting the old one.
            self.run(&["move", &list, &index_str, task.category()])
                .await?;
        }

        Ok(())
    }

    async fn delete_reminder(&self, id: &str) -> SyncResult<()> {
        let host_id = normalize_host_id(id);
        let (list, index) = self
            .locate(&host_id)
            .await?
            .ok_or_else(|| SyncError::NotFound {
                system: SYSTEM,
                id: host_id,
            })?;
        self.run(&["delete", &list, &index.to_string()]).await?;
        Ok(())
    }

    async fn rename_list(&self, old_name: &str, new_name: &str) -> SyncResult<()> {
        self.run(&["rename-list", old_name, new_name]).await?;
        Ok(())
    }

    async fn create_list(&self, name: &str) -> SyncResult<String> {
        self.ensure_list_exists(name).await?;
        Ok(name.to_string())
    }

    async fn test_connection(&self) -> SyncResult<bool> {
        Ok(self.run(&["show-lists"]).await.is_ok())
    }
}

impl HostCliAdapter {
    async fn get_reminder_by_id_matching(
        &self,
        list: &str,
        title: &str,
    ) -> SyncResult<Option<String>> {
        let raw = self.run(&["show", list, "--format", "json"]).await?;
        let reminders: Vec<RawReminder> = serde_json::from_str(&raw).unwrap_or_default();
        Ok(reminders
            .into_iter()
            .find(|r| r.title == title)
            .map(|r| normalize_host_id(&r.external_id)))
    }
}

fn priority_bucket_name(host_priority: u8) -> &'static str {
    match host_priority {
        0 => "none",
        1..=4 => "high",
        5 => "medium",
        _ => "low",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_uri_scheme() {
        assert_eq!(
            normalize_host_id("x-apple-reminder://1234-ABCD"),
            "1234-ABCD"
        );
        assert_eq!(normalize_host_id("1234-ABCD"), "1234-ABCD");
    }

    #[test]
    fn strips_legacy_sync_marker() {
        let notes = "Call Alice\n[sync:550e8400-e29b-41d4-a716-446655440000]";
        assert_eq!(strip_legacy_sync_marker(notes), "Call Alice");
    }

    #[test]
    fn strips_document_link_suffix() {
        let notes = "Review the chapter\n\u{1F4CE} notes.note(page 3)";
        assert_eq!(strip_document_link_suffix(notes), "Review the chapter");
    }

    #[test]
    fn priority_bucket_names_match_mapping_boundaries() {
        assert_eq!(priority_bucket_name(0), "none");
        assert_eq!(priority_bucket_name(9), "low");
        assert_eq!(priority_bucket_name(5), "medium");
        assert_eq!(priority_bucket_name(1), "high");
    }
}
