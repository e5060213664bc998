use crate::model::{StoredTemplate, Template};
use rusqlite::{Connection, OptionalExtension, Result, Row, params};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

/// One row of `admin_job_runs`.
#[derive(Debug, Clone)]
pub struct AdminRun {
    pub id: String,
    pub job_type: String,
    pub status: String,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub result: Option<Value>,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn json_column(value: &Value) -> String {
    value.to_string()
}

fn stored_template_from_row(row: &Row<'_>) -> Result<StoredTemplate> {
    let tags_json: Option<String> = row.get(5)?;
    let tags = tags_json
        .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
        .unwrap_or_default();

    Ok(StoredTemplate {
        id: row.get(0)?,
        source_id: row.get(1)?,
        title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        category: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        tags,
    })
}

impl Database {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT UNIQUE NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '[]',          -- JSON array of strings
    nodes TEXT NOT NULL DEFAULT '[]',         -- JSON array of raw nodes
    raw_workflow TEXT NOT NULL DEFAULT '{}',  -- JSON object
    source_url TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_templates_category ON templates(category);

-- Node type facets, replaced wholesale on every upload
CREATE TABLE IF NOT EXISTS node_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id INTEGER NOT NULL,
    node_type TEXT NOT NULL,
    count INTEGER NOT NULL CHECK(count > 0),

    FOREIGN KEY(template_id) REFERENCES templates(id) ON DELETE CASCADE,
    UNIQUE(template_id, node_type)
);

CREATE INDEX IF NOT EXISTS idx_node_types_template ON node_types(template_id);
CREATE INDEX IF NOT EXISTS idx_node_types_type ON node_types(node_type);

-- Job runs reported to the admin UI
CREATE TABLE IF NOT EXISTS admin_job_runs (
    id TEXT PRIMARY KEY,
    job_type TEXT NOT NULL,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed')),
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    result TEXT               -- JSON object
);

-- Integration labels, filled by the generated stacks script
CREATE TABLE IF NOT EXISTS stacks (
    slug TEXT PRIMARY KEY,
    label TEXT NOT NULL
);
            ",
        )?;
        Ok(())
    }

    // Template operations

    /// Insert or update a template by `source_id` and replace its node-type
    /// rows. Returns the row id.
    pub fn upsert_template(&self, template: &Template) -> Result<i64> {
        let timestamp = current_timestamp();
        let tx = self.conn.unchecked_transaction()?;

        let template_id: i64 = tx.query_row(
            "INSERT INTO templates (
                source_id, title, description, category, tags, nodes,
                raw_workflow, source_url, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT(source_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                category = excluded.category,
                tags = excluded.tags,
                nodes = excluded.nodes,
                raw_workflow = excluded.raw_workflow,
                source_url = excluded.source_url,
                updated_at = excluded.updated_at
            RETURNING id",
            params![
                &template.source_id,
                &template.title,
                &template.description,
                template.category_label(),
                json_column(&Value::from(template.tags.clone())),
                json_column(&Value::Array(template.nodes.clone())),
                json_column(&template.raw_workflow),
                &template.source_url,
                timestamp,
            ],
            |row| row.get(0),
        )?;

        tx.execute(
            "DELETE FROM node_types WHERE template_id = ?1",
            params![template_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO node_types (template_id, node_type, count) VALUES (?1, ?2, ?3)",
            )?;
            for (node_type, count) in &template.node_type_counts {
                stmt.execute(params![template_id, node_type, *count as i64])?;
            }
        }

        tx.commit()?;
        Ok(template_id)
    }

    pub fn existing_source_ids(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT source_id FROM templates")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>>>()?;
        Ok(ids)
    }

    pub fn template_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM templates", [], |row| row.get(0))
    }

    pub fn get_template(&self, source_id: &str) -> Result<Option<StoredTemplate>> {
        self.conn
            .query_row(
                "SELECT id, source_id, title, description, category, tags
                 FROM templates WHERE source_id = ?1",
                params![source_id],
                stored_template_from_row,
            )
            .optional()
    }

    /// Stored templates ordered by id, `limit` rows starting at `offset`.
    pub fn templates_page(&self, offset: usize, limit: usize) -> Result<Vec<StoredTemplate>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, title, description, category, tags
             FROM templates ORDER BY id LIMIT ?1 OFFSET ?2",
        )?;

        let rows = stmt
            .query_map(params![limit as i64, offset as i64], stored_template_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Update category and/or tags of one template. Returns whether a row
    /// was touched; passing neither field is a no-op.
    pub fn update_template_metadata(
        &self,
        template_id: i64,
        category: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<bool> {
        if category.is_none() && tags.is_none() {
            return Ok(false);
        }
        let tags_json = tags.map(|t| json_column(&Value::from(t.to_vec())));

        let changed = self.conn.execute(
            "UPDATE templates SET
                category = COALESCE(?1, category),
                tags = COALESCE(?2, tags),
                updated_at = ?3
             WHERE id = ?4",
            params![category, tags_json, current_timestamp(), template_id],
        )?;
        Ok(changed > 0)
    }

    pub fn node_type_counts(&self, template_id: i64) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT node_type, count FROM node_types WHERE template_id = ?1 ORDER BY node_type",
        )?;

        let counts = stmt
            .query_map(params![template_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;
        Ok(counts)
    }

    // Admin job runs

    /// Register a run if the admin UI has not already done so.
    pub fn ensure_admin_run(&self, run_id: &str, job_type: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO admin_job_runs (id, job_type, status, started_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![run_id, job_type, RunStatus::Running.as_str(), current_timestamp()],
        )?;
        Ok(())
    }

    pub fn update_admin_progress(&self, run_id: &str, result: &Value) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE admin_job_runs SET result = ?1 WHERE id = ?2",
            params![json_column(result), run_id],
        )?;
        Ok(changed > 0)
    }

    pub fn finish_admin_run(&self, run_id: &str, status: RunStatus, result: &Value) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE admin_job_runs SET status = ?1, completed_at = ?2, result = ?3 WHERE id = ?4",
            params![status.as_str(), current_timestamp(), json_column(result), run_id],
        )?;
        Ok(changed > 0)
    }

    pub fn get_admin_run(&self, run_id: &str) -> Result<Option<AdminRun>> {
        self.conn
            .query_row(
                "SELECT id, job_type, status, started_at, completed_at, result
                 FROM admin_job_runs WHERE id = ?1",
                params![run_id],
                |row| {
                    let result: Option<String> = row.get(5)?;
                    Ok(AdminRun {
                        id: row.get(0)?,
                        job_type: row.get(1)?,
                        status: row.get(2)?,
                        started_at: row.get(3)?,
                        completed_at: row.get(4)?,
                        result: result.and_then(|r| serde_json::from_str(&r).ok()),
                    })
                },
            )
            .optional()
    }
}
