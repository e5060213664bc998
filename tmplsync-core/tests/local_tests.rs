// Tests for importing exported workflow files from disk

use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tmplsync_core::data::Database;
use tmplsync_core::local::{collect_json_files, import_local};

fn write_json(dir: &Path, relative: &str, value: serde_json::Value) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, value.to_string()).unwrap();
}

fn workflow(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "nodes": [{ "name": "Gmail", "type": "n8n-nodes-base.gmail" }],
        "connections": {},
        "tags": [{ "name": "gmail" }]
    })
}

#[test]
fn test_collect_json_files_is_recursive_and_sorted() {
    let temp_dir = TempDir::new().unwrap();
    write_json(temp_dir.path(), "b/2.json", json!({}));
    write_json(temp_dir.path(), "a/nested/1.json", json!({}));
    write_json(temp_dir.path(), "c.json", json!({}));
    fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

    let files = collect_json_files(temp_dir.path()).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.strip_prefix(temp_dir.path()).unwrap().display().to_string())
        .collect();

    assert_eq!(names.len(), 3);
    assert!(names[0].ends_with("1.json"));
    assert!(names[1].ends_with("2.json"));
    assert_eq!(names[2], "c.json");
}

#[test]
fn test_missing_directory_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    assert!(collect_json_files(&temp_dir.path().join("nope")).is_err());
}

#[test]
fn test_import_stores_valid_files_and_counts_bad_ones() {
    let temp_dir = TempDir::new().unwrap();
    let exports = temp_dir.path().join("exports");
    write_json(&exports, "101.json", workflow("Mail digest"));
    write_json(
        &exports,
        "named.json",
        json!({
            "meta": { "id": 555, "site": "https://example.com/555", "name": "From meta" },
            "nodes": [{ "type": "n8n-nodes-base.slack" }]
        }),
    );
    write_json(&exports, "empty.json", json!({ "name": "No nodes", "nodes": [] }));
    fs::write(exports.join("broken.json"), "{ not json").unwrap();

    let db = Database::new(&temp_dir.path().join("test.db")).unwrap();
    let summary = import_local(&exports, 0, 0, &db).unwrap();

    assert_eq!(summary.found, 4);
    assert_eq!(summary.ok, 2);
    assert_eq!(summary.errors, 2);

    let by_stem = db.get_template("101").unwrap().unwrap();
    assert_eq!(by_stem.title, "Mail digest");
    assert_eq!(by_stem.tags, vec!["gmail".to_string()]);
    assert_eq!(by_stem.category, "Email & Communication");

    let by_meta = db.get_template("555").unwrap().unwrap();
    assert_eq!(by_meta.title, "From meta");
}

#[test]
fn test_import_applies_skip_then_limit() {
    let temp_dir = TempDir::new().unwrap();
    let exports = temp_dir.path().join("exports");
    for id in 1..=5 {
        write_json(&exports, &format!("{}.json", id), workflow("Mail digest"));
    }

    let db = Database::new(&temp_dir.path().join("test.db")).unwrap();
    let summary = import_local(&exports, 1, 2, &db).unwrap();

    assert_eq!(summary.ok, 2);
    assert!(db.get_template("1").unwrap().is_none());
    assert!(db.get_template("2").unwrap().is_some());
    assert!(db.get_template("3").unwrap().is_some());
    assert!(db.get_template("4").unwrap().is_none());
}

#[test]
fn test_reimport_updates_in_place() {
    let temp_dir = TempDir::new().unwrap();
    let exports = temp_dir.path().join("exports");
    write_json(&exports, "9.json", workflow("First"));

    let db = Database::new(&temp_dir.path().join("test.db")).unwrap();
    import_local(&exports, 0, 0, &db).unwrap();
    write_json(&exports, "9.json", workflow("Second"));
    import_local(&exports, 0, 0, &db).unwrap();

    assert_eq!(db.template_count().unwrap(), 1);
    assert_eq!(db.get_template("9").unwrap().unwrap().title, "Second");
}
