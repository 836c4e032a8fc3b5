//! The unified task model shared by both sides of a sync run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SyncResult;

/// A pointer from a task on the device side to a page in one of its documents.
///
/// Host has no native slot for this, so it is projected into the Host notes as a
/// trailing, human-readable line (see [`DocumentLink::notes_suffix`]) and stripped
/// back out on ingress.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub app_name: String,
    pub file_id: String,
    pub file_path: String,
    pub page: i64,
    pub page_id: String,
}

impl DocumentLink {
    /// Canonical JSON for this link, base64-encoded the way the device store holds it.
    pub fn to_base64(&self) -> SyncResult<String> {
        let json = serde_json::to_vec(self)?;
        Ok(base64::encode(json))
    }

    pub fn from_base64(encoded: &str) -> SyncResult<Option<Self>> {
        if encoded.trim().is_empty() {
            return Ok(None);
        }
        let bytes = base64::decode(encoded.trim())
            .map_err(|e| crate::error::SyncError::InvalidInput(format!("bad document link: {e}")))?;
        let link: Self = serde_json::from_slice(&bytes)?;
        Ok(Some(link))
    }

    /// The line appended to Host notes so the link survives the round trip, even though
    /// Host cannot store it structurally.
    pub fn notes_suffix(&self) -> String {
        let basename = self
            .file_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.file_path);
        format!("\u{1F4CE} {}(page {})", basename, self.page)
    }
}

/// A to-do item, normalised across Device and Host.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnifiedTask {
    title: String,
    notes: String,
    category: String,
    completed: bool,
    completion_date: Option<DateTime<Utc>>,
    due_date: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    modified_at: Option<DateTime<Utc>>,
    /// Normalised priority: one of {0, 1, 5, 9}.
    priority: u8,
    device_id: Option<String>,
    host_id: Option<String>,
    document_link: Option<DocumentLink>,
}

impl UnifiedTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            notes: String::new(),
            category: "Inbox".to_string(),
            completed: false,
            completion_date: None,
            due_date: None,
            created_at: Some(Utc::now()),
            modified_at: Some(Utc::now()),
            priority: 0,
            device_id: None,
            host_id: None,
            document_link: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_with_parameters(
        title: String,
        notes: String,
        category: String,
        completed: bool,
        completion_date: Option<DateTime<Utc>>,
        due_date: Option<DateTime<Utc>>,
        created_at: Option<DateTime<Utc>>,
        modified_at: Option<DateTime<Utc>>,
        priority: u8,
        device_id: Option<String>,
        host_id: Option<String>,
        document_link: Option<DocumentLink>,
    ) -> Self {
        Self {
            title,
            notes,
            category,
            completed,
            completion_date,
            due_date,
            created_at,
            modified_at,
            priority,
            device_id,
            host_id,
            document_link,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn notes(&self) -> &str {
        &self.notes
    }
    pub fn category(&self) -> &str {
        &self.category
    }
    pub fn completed(&self) -> bool {
        self.completed
    }
    pub fn completion_date(&self) -> Option<&DateTime<Utc>> {
        self.completion_date.as_ref()
    }
    pub fn due_date(&self) -> Option<&DateTime<Utc>> {
        self.due_date.as_ref()
    }
    pub fn created_at(&self) -> Option<&DateTime<Utc>> {
        self.created_at.as_ref()
    }
    pub fn modified_at(&self) -> Option<&DateTime<Utc>> {
        self.modified_at.as_ref()
    }
    pub fn priority(&self) -> u8 {
        self.priority
    }
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }
    pub fn host_id(&self) -> Option<&str> {
        self.host_id.as_deref()
    }
    pub fn document_link(&self) -> Option<&DocumentLink> {
        self.document_link.as_ref()
    }
    pub fn status(&self) -> &'static str {
        if self.completed {
            "completed"
        } else {
            "needsAction"
        }
    }

    pub fn set_device_id(&mut self, id: Option<String>) {
        self.device_id = id;
    }
    pub fn set_host_id(&mut self, id: Option<String>) {
        self.host_id = id;
    }
    pub fn set_document_link(&mut self, link: Option<DocumentLink>) {
        self.document_link = link;
    }

    fn update_last_modified(&mut self) {
        self.modified_at = Some(Utc::now());
    }

    pub fn set_title(&mut self, title: String) {
        self.title = title;
        self.update_last_modified();
    }

    pub fn set_notes(&mut self, notes: String) {
        self.notes = notes;
        self.update_last_modified();
    }

    pub fn set_category(&mut self, category: String) {
        self.category = category;
        self.update_last_modified();
    }

    pub fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
        self.completion_date = if completed { Some(Utc::now()) } else { None };
        self.update_last_modified();
    }

    pub fn set_due_date(&mut self, due_date: Option<DateTime<Utc>>) {
        self.due_date = due_date;
        self.update_last_modified();
    }

    pub fn set_priority(&mut self, priority: u8) {
        self.priority = priority;
        self.update_last_modified();
    }

    /// Copy the sync-relevant fields of `other` onto `self`, keeping `self`'s native IDs.
    ///
    /// Used by the conflict resolver to apply a winner's content onto the loser's task
    /// value without losing the loser's identifier.
    pub fn adopt_content_from(&mut self, other: &UnifiedTask) {
        self.title = other.title.clone();
        self.notes = other.notes.clone();
        self.category = other.category.clone();
        self.completed = other.completed;
        self.completion_date = other.completion_date;
        self.due_date = other.due_date;
        self.priority = other.priority;
        self.modified_at = other.modified_at;
    }

    /// Stable 16-hex-character digest over the sync-relevant fields.
    ///
    /// Deliberately excludes timestamps, IDs and `due_date`: two tasks that differ only
    /// by when they were touched, or by due date, hash equal.
    pub fn content_hash(&self) -> String {
        #[derive(Serialize)]
        struct Hashed<'a> {
            title: &'a str,
            notes: &'a str,
            category: &'a str,
            completed: bool,
            priority: u8,
        }
        // serde_json serialises struct fields in declaration order, which is already
        // alphabetical here, giving a canonical encoding without a BTreeMap detour.
        let payload = Hashed {
            title: &self.title,
            notes: &self.notes,
            category: &self.category,
            completed: self.completed,
            priority: self.priority,
        };
        let encoded = serde_json::to_vec(&payload).expect("task fields are always serializable");
        let digest = Sha256::digest(&encoded);
        hex_prefix(&digest, 16)
    }
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    let mut s = String::with_capacity(chars);
    for byte in bytes {
        if s.len() >= chars {
            break;
        }
        s.push_str(&format!("{:02x}", byte));
    }
    s.truncate(chars);
    s
}
