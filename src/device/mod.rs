//! A concrete [`DeviceAdapter`] that reaches the device's task database by running a
//! single SQL client inside a named container, the way the reference deployment does.
//!
//! Identifiers are validated and text is escaped before being spliced into the SQL text
//! handed to the shell (see [`text`]); there is no bindable driver available for this
//! transport, so this defence-in-depth is the adapter's only protection against
//! injection through task titles/notes/categories.

pub mod text;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::process::Command;

use crate::adapter::{DeviceAdapter, NamedList};
use crate::error::{SyncError, SyncResult};
use crate::task::{DocumentLink, UnifiedTask};

use text::{decode_non_bmp, encode_non_bmp, escape_sql, truncate_notes, validate_id};

const SYSTEM: &str = "device";
const COLUMN_SEP: char = '\t';

/// Connection details for the containerised SQL client.
#[derive(Clone, Debug)]
pub struct DeviceConnection {
    pub container: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

pub struct DeviceSqlAdapter {
    conn: DeviceConnection,
}

impl DeviceSqlAdapter {
    pub fn new(conn: DeviceConnection) -> Self {
        Self { conn }
    }

    async fn run_sql(&self, sql: &str) -> SyncResult<Vec<Vec<String>>> {
        let password_flag = format!("-p{}", self.conn.password);
        let output = Command::new("docker")
            .args([
                "exec",
                &self.conn.container,
                "mysql",
                "-u",
                &self.conn.user,
                &password_flag,
                &self.conn.database,
                "-e",
                sql,
                "--batch",
                "--raw",
            ])
            .output()
            .await
            .map_err(|e| SyncError::Store {
                system: SYSTEM,
                detail: format!("failed to spawn docker exec: {e}"),
            })?;

        if !output.status.success() {
            return Err(SyncError::Store {
                system: SYSTEM,
                detail: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let mut lines = text.lines();
        lines.next(); // header row from --batch output
        Ok(lines
            .map(|line| line.split(COLUMN_SEP).map(str::to_string).collect())
            .collect())
    }

    fn row_to_task(&self, row: &[String]) -> SyncResult<UnifiedTask> {
        // Columns: id, title, notes, category_name, completed, priority, due_date_ms,
        // created_at_ms, last_modified_ms, completed_time_ms, document_link
        let id = row[0].clone();
        let title = decode_non_bmp(&row[1]);
        let notes = decode_non_bmp(&row[2]);
        let category = row[3].clone();
        let completed = row[4] == "1";
        let priority: u8 = row[5].parse().unwrap_or(0);
        let due_date = parse_ms(&row[6]);
        let created_at = parse_ms(&row[7]);
        let modified_at = parse_ms(&row[8]);
        let completion_date = parse_ms(&row[9]);
        let document_link = DocumentLink::from_base64(&row[10])?;

        let mut task = UnifiedTask::new_with_parameters(
            title,
            notes,
            category,
            completed,
            completion_date,
            due_date,
            created_at,
            modified_at,
            priority,
            Some(id),
            None,
            document_link,
        );
        task.set_device_id(Some(row[0].clone()));
        Ok(task)
    }

    /// Re-reads the row for `id` and returns its stored document link, if any, so an
    /// update that doesn't carry one does not erase it.
    async fn existing_document_link(&self, id: &str) -> SyncResult<Option<DocumentLink>> {
        validate_id(id)?;
        let rows = self
            .run_sql(&format!(
                "SELECT document_link FROM tasks WHERE id = '{}' AND is_deleted = 'N';",
                escape_sql(id)
            ))
            .await?;
        match rows.first() {
            Some(row) if !row.is_empty() => DocumentLink::from_base64(&row[0]),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl DeviceAdapter for DeviceSqlAdapter {
    async fn list_tasks(
        &self,
        category: Option<&str>,
        include_completed: bool,
    ) -> SyncResult<Vec<UnifiedTask>> {
        let mut sql = "SELECT id, title, notes, category_name, completed, priority, \
             due_date, created_at, last_modified, completed_time, document_link FROM tasks \
             WHERE is_deleted = 'N'"
            .to_string();
        if let Some(category) = category {
            sql.push_str(&format!(" AND category_name = '{}'", escape_sql(category)));
        }
        if !include_completed {
            sql.push_str(" AND completed = 0");
        }
        sql.push(';');

        let rows = self.run_sql(&sql).await?;
        rows.iter().map(|r| self.row_to_task(r)).collect()
    }

    async fn get_task(&self, id: &str) -> SyncResult<Option<UnifiedTask>> {
        validate_id(id)?;
        let rows = self
            .run_sql(&format!(
                "SELECT id, title, notes, category_name, completed, priority, \
                 due_date, created_at, last_modified, completed_time, document_link FROM tasks \
                 WHERE id = '{}' AND is_deleted = 'N';",
                escape_sql(id)
            ))
            .await?;
        rows.first().map(|r| self.row_to_task(r)).transpose()
    }

    async fn create_task(&self, task: &UnifiedTask) -> SyncResult<String> {
        let id = uuid::Uuid::new_v4().to_hyphenated().to_string();
        let encoded_notes = truncate_notes(&encode_non_bmp(task.notes()));
        let link = task
            .document_link()
            .map(DocumentLink::to_base64)
            .transpose()?
            .unwrap_or_default();
        let now = Utc::now().timestamp_millis();

        self.run_sql(&format!(
            "INSERT INTO tasks (id, title, notes, category_name, completed, priority, \
             due_date, created_at, last_modified, completed_time, document_link, is_deleted) \
             VALUES ('{}', '{}', '{}', '{}', {}, {}, {}, {}, {}, {}, '{}', 'N');",
            escape_sql(&id),
            escape_sql(&encode_non_bmp(task.title())),
            escape_sql(&encoded_notes),
            escape_sql(task.category()),
            task.completed() as u8,
            task.priority(),
            to_ms(task.due_date()),
            now,
            now,
            to_ms(task.completion_date()),
            escape_sql(&link),
        ))
        .await?;

        Ok(id)
    }

    async fn update_task(&self, task: &UnifiedTask) -> SyncResult<()> {
        let id = task
            .device_id()
            .ok_or_else(|| SyncError::InvalidInput("update_task requires a device_id".into()))?;
        validate_id(id)?;

        let link = match task.document_link() {
            Some(link) => Some(link.to_base64()?),
            None => self
                .existing_document_link(id)
                .await?
                .map(|link| link.to_base64())
                .transpose()?,
        }
        .unwrap_or_default();

        let encoded_notes = truncate_notes(&encode_non_bmp(task.notes()));

        self.run_sql(&format!(
            "UPDATE tasks SET title = '{}', notes = '{}', category_name = '{}', \
             completed = {}, priority = {}, due_date = {}, last_modified = {}, \
             completed_time = {}, document_link = '{}' WHERE id = '{}';",
            escape_sql(&encode_non_bmp(task.title())),
            escape_sql(&encoded_notes),
            escape_sql(task.category()),
            task.completed() as u8,
            task.priority(),
            to_ms(task.due_date()),
            Utc::now().timestamp_millis(),
            to_ms(task.completion_date()),
            escape_sql(&link),
            escape_sql(id),
        ))
        .await?;

        Ok(())
    }

    async fn delete_task(&self, id: &str, soft: bool) -> SyncResult<()> {
        validate_id(id)?;
        let sql = if soft {
            format!(
                "UPDATE tasks SET is_deleted = 'Y', last_modified = {} WHERE id = '{}';",
                Utc::now().timestamp_millis(),
                escape_sql(id)
            )
        } else {
            format!("DELETE FROM tasks WHERE id = '{}';", escape_sql(id))
        };
        self.run_sql(&sql).await?;
        Ok(())
    }

    async fn list_categories(&self) -> SyncResult<Vec<NamedList>> {
        let rows = self.run_sql("SELECT id, name FROM categories;").await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.len() >= 2)
            .map(|r| NamedList {
                id: r[0].clone(),
                name: r[1].clone(),
            })
            .collect())
    }

    async fn create_category(&self, name: &str) -> SyncResult<String> {
        let id = uuid::Uuid::new_v4().to_hyphenated().to_string();
        self.run_sql(&format!(
            "INSERT INTO categories (id, name) VALUES ('{}', '{}');",
            escape_sql(&id),
            escape_sql(name)
        ))
        .await?;
        Ok(id)
    }

    async fn rename_category(&self, id: &str, new_name: &str) -> SyncResult<()> {
        validate_id(id)?;
        self.run_sql(&format!(
            "UPDATE categories SET name = '{}' WHERE id = '{}';",
            escape_sql(new_name),
            escape_sql(id)
        ))
        .await?;
        Ok(())
    }

    async fn test_connection(&self) -> SyncResult<bool> {
        match self.run_sql("SELECT 1;").await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

fn parse_ms(raw: &str) -> Option<DateTime<Utc>> {
    let ms: i64 = raw.trim().parse().ok()?;
    if ms == 0 {
        None
    } else {
        Utc.timestamp_millis_opt(ms).single()
    }
}

fn to_ms(date: Option<&DateTime<Utc>>) -> i64 {
    date.map(|d| d.timestamp_millis()).unwrap_or(0)
}
