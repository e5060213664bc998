// Tests for the template store

use serde_json::{Value, json};
use tempfile::TempDir;
use tmplsync_core::admin::AdminReporter;
use tmplsync_core::data::{Database, RunStatus};
use tmplsync_core::model::{Category, TagInput, Template};
use tmplsync_core::normalize::{TemplateMeta, normalize_workflow};

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

fn sample_template(source_id: &str, node_types: &[&str], tags: &[&str]) -> Template {
    let nodes: Vec<Value> = node_types
        .iter()
        .enumerate()
        .map(|(i, t)| json!({ "name": format!("node {}", i), "type": t }))
        .collect();
    normalize_workflow(
        &json!({ "nodes": nodes, "connections": {} }),
        TemplateMeta {
            source_id: source_id.to_string(),
            title: format!("Template {}", source_id),
            description: "Moves rows around".to_string(),
            category: None,
            source_url: format!("https://n8n.io/workflows/{}", source_id),
            tags_override: Some(tags.iter().map(|t| TagInput::from(*t)).collect()),
        },
    )
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_database_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path);
    assert!(db.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_database_exists_and_drop() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    assert!(!Database::exists(&db_path));
    let db = Database::new(&db_path).unwrap();
    assert!(Database::exists(&db_path));

    drop(db);
    Database::drop(&db_path).unwrap();
    assert!(!Database::exists(&db_path));
}

#[test]
fn test_reopening_keeps_rows() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let db = Database::new(&db_path).unwrap();
        db.upsert_template(&sample_template("1", &["n8n-nodes-base.slack"], &[]))
            .unwrap();
    }

    let db = Database::new(&db_path).unwrap();
    assert_eq!(db.template_count().unwrap(), 1);
}

// ============================================================================
// Template Upsert Tests
// ============================================================================

#[test]
fn test_upsert_is_idempotent_by_source_id() {
    let (_temp_dir, db) = create_test_db();
    let template = sample_template("42", &["n8n-nodes-base.slack"], &["slack"]);

    let first = db.upsert_template(&template).unwrap();
    let second = db.upsert_template(&template).unwrap();

    assert_eq!(first, second);
    assert_eq!(db.template_count().unwrap(), 1);
}

#[test]
fn test_upsert_overwrites_fields() {
    let (_temp_dir, db) = create_test_db();
    db.upsert_template(&sample_template("7", &["a"], &["slack"]))
        .unwrap();

    let mut changed = sample_template("7", &["a"], &["hubspot"]);
    changed.title = "Renamed".to_string();
    db.upsert_template(&changed).unwrap();

    let stored = db.get_template("7").unwrap().unwrap();
    assert_eq!(stored.title, "Renamed");
    assert_eq!(stored.tags, vec!["hubspot".to_string()]);
    assert_eq!(stored.category, Category::CrmSales.as_str());
}

#[test]
fn test_node_types_are_replaced_not_appended() {
    let (_temp_dir, db) = create_test_db();
    let id = db
        .upsert_template(&sample_template("9", &["slack", "slack", "http"], &[]))
        .unwrap();
    assert_eq!(
        db.node_type_counts(id).unwrap(),
        vec![("http".to_string(), 1), ("slack".to_string(), 2)]
    );

    db.upsert_template(&sample_template("9", &["gmail"], &[]))
        .unwrap();
    assert_eq!(db.node_type_counts(id).unwrap(), vec![("gmail".to_string(), 1)]);
}

#[test]
fn test_empty_category_is_stored_as_empty_string() {
    let (_temp_dir, db) = create_test_db();
    let mut template = sample_template("3", &["a"], &[]);
    template.title = "Something".to_string();
    template.description = String::new();
    template.category = None;
    db.upsert_template(&template).unwrap();

    assert_eq!(db.get_template("3").unwrap().unwrap().category, "");
}

#[test]
fn test_existing_source_ids() {
    let (_temp_dir, db) = create_test_db();
    for id in ["1", "2", "3"] {
        db.upsert_template(&sample_template(id, &["a"], &[])).unwrap();
    }

    let ids = db.existing_source_ids().unwrap();
    assert_eq!(ids.len(), 3);
    assert!(ids.contains("2"));
    assert!(!ids.contains("4"));
}

#[test]
fn test_get_missing_template() {
    let (_temp_dir, db) = create_test_db();
    assert!(db.get_template("nope").unwrap().is_none());
}

// ============================================================================
// Paging and Metadata Update Tests
// ============================================================================

#[test]
fn test_templates_page_is_ordered_and_bounded() {
    let (_temp_dir, db) = create_test_db();
    for id in 1..=5 {
        db.upsert_template(&sample_template(&id.to_string(), &["a"], &[]))
            .unwrap();
    }

    let first = db.templates_page(0, 2).unwrap();
    let rest = db.templates_page(2, 10).unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(rest.len(), 3);
    assert!(first[1].id < rest[0].id);
    assert_eq!(first[0].source_id.as_deref(), Some("1"));
    assert!(db.templates_page(5, 10).unwrap().is_empty());
}

#[test]
fn test_update_metadata_touches_only_given_fields() {
    let (_temp_dir, db) = create_test_db();
    let id = db
        .upsert_template(&sample_template("11", &["a"], &["slack"]))
        .unwrap();

    assert!(db.update_template_metadata(id, Some("Finance & Invoicing"), None).unwrap());
    let stored = db.get_template("11").unwrap().unwrap();
    assert_eq!(stored.category, "Finance & Invoicing");
    assert_eq!(stored.tags, vec!["slack".to_string()]);

    let tags = vec!["stripe".to_string(), "invoice".to_string()];
    assert!(db.update_template_metadata(id, None, Some(&tags)).unwrap());
    let stored = db.get_template("11").unwrap().unwrap();
    assert_eq!(stored.category, "Finance & Invoicing");
    assert_eq!(stored.tags, tags);
}

#[test]
fn test_update_metadata_without_fields_is_noop() {
    let (_temp_dir, db) = create_test_db();
    let id = db.upsert_template(&sample_template("12", &["a"], &[])).unwrap();

    assert!(!db.update_template_metadata(id, None, None).unwrap());
    assert!(!db.update_template_metadata(id + 100, Some("Other"), None).unwrap());
}

// ============================================================================
// Admin Run Tests
// ============================================================================

#[test]
fn test_admin_run_lifecycle() {
    let (_temp_dir, db) = create_test_db();

    db.ensure_admin_run("run-1", "sync").unwrap();
    let run = db.get_admin_run("run-1").unwrap().unwrap();
    assert_eq!(run.status, "running");
    assert!(run.completed_at.is_none());

    db.update_admin_progress("run-1", &json!({ "templates_ok": 3 }))
        .unwrap();
    let run = db.get_admin_run("run-1").unwrap().unwrap();
    assert_eq!(run.result.unwrap()["templates_ok"], 3);
    assert_eq!(run.status, "running");

    db.finish_admin_run("run-1", RunStatus::Completed, &json!({ "templates_ok": 5 }))
        .unwrap();
    let run = db.get_admin_run("run-1").unwrap().unwrap();
    assert_eq!(run.status, "completed");
    assert!(run.completed_at.is_some());
}

#[test]
fn test_ensure_admin_run_keeps_existing_row() {
    let (_temp_dir, db) = create_test_db();

    db.ensure_admin_run("run-2", "sync").unwrap();
    db.finish_admin_run("run-2", RunStatus::Failed, &json!({ "error": "boom" }))
        .unwrap();
    db.ensure_admin_run("run-2", "sync").unwrap();

    assert_eq!(db.get_admin_run("run-2").unwrap().unwrap().status, "failed");
}

#[test]
fn test_progress_for_unknown_run_reports_no_change() {
    let (_temp_dir, db) = create_test_db();
    assert!(!db.update_admin_progress("missing", &json!({})).unwrap());
}

#[test]
fn test_failed_run_keeps_last_reported_counts() {
    let (_temp_dir, db) = create_test_db();
    let admin = AdminReporter::new(&db, "run-3", "sync");

    admin.progress(7, 2, 20);
    admin.fail("Connection reset");

    let run = db.get_admin_run("run-3").unwrap().unwrap();
    assert_eq!(run.status, "failed");
    let result = run.result.unwrap();
    assert_eq!(result["templates_ok"], 7);
    assert_eq!(result["templates_error"], 2);
    assert_eq!(result["total_count"], 20);
    assert_eq!(result["error"], "Connection reset");
}

#[test]
fn test_failed_run_without_progress_reports_zero_counts() {
    let (_temp_dir, db) = create_test_db();
    let admin = AdminReporter::new(&db, "run-4", "enrich");

    admin.fail("no database");

    let result = db.get_admin_run("run-4").unwrap().unwrap().result.unwrap();
    assert_eq!(result["templates_ok"], 0);
    assert_eq!(result["templates_error"], 0);
    assert_eq!(result["error"], "no database");
}
