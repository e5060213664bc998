use crate::model::{Category, TagInput, Template};
use crate::taxonomy::{category_for_label, dedupe_tags, derive_category};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tmplsync_fetch::{ListingSummary, TemplateClient};

const MAX_DESCRIPTION_CHARS: usize = 10_000;

/// Fields supplied alongside the raw graph.
#[derive(Debug, Clone, Default)]
pub struct TemplateMeta {
    pub source_id: String,
    pub title: String,
    pub description: String,
    /// Upstream category, already mapped onto the closed set.
    pub category: Option<Category>,
    pub source_url: String,
    /// Replaces the graph's own `tags` when set.
    pub tags_override: Option<Vec<TagInput>>,
}

/// Count how often each node `type` occurs. Nodes without a type are ignored.
pub fn extract_node_types(nodes: &[Value]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for node in nodes {
        if let Some(node_type) = node.get("type").and_then(Value::as_str) {
            if !node_type.is_empty() {
                *counts.entry(node_type.to_string()).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Tag names out of a raw JSON `tags` value. Anything but an array yields
/// no tags.
pub fn tags_from_value(value: Option<&Value>) -> Vec<TagInput> {
    match value {
        Some(tags @ Value::Array(_)) => serde_json::from_value(tags.clone()).unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Build the canonical record from a workflow graph (`nodes`, `connections`, ...).
pub fn normalize_workflow(raw: &Value, meta: TemplateMeta) -> Template {
    let nodes: Vec<Value> = raw
        .get("nodes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let raw_tags = meta
        .tags_override
        .unwrap_or_else(|| tags_from_value(raw.get("tags")));
    let tags = dedupe_tags(raw_tags.iter().filter_map(TagInput::name));

    let category = meta
        .category
        .or_else(|| derive_category(&tags, &meta.title, &meta.description));

    Template {
        source_id: meta.source_id,
        title: meta.title,
        description: meta.description,
        category,
        tags,
        node_type_counts: extract_node_types(&nodes),
        nodes,
        raw_workflow: raw.clone(),
        source_url: meta.source_url,
    }
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Normalize a detail response of the shape
/// `{ workflow: { workflow: { nodes, connections }, name, description, workflowInfo } }`.
///
/// Returns `None` when the graph has no nodes.
pub fn normalize_from_api_payload(payload: &Value, template_id: &str) -> Option<Template> {
    let empty = Map::new();
    let outer = payload
        .get("workflow")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let inner = outer
        .get("workflow")
        .and_then(Value::as_object)
        .unwrap_or(outer);

    let has_nodes = inner
        .get("nodes")
        .and_then(Value::as_array)
        .is_some_and(|nodes| !nodes.is_empty());
    if !has_nodes {
        return None;
    }

    let title = non_empty_str(outer, "name")
        .or_else(|| non_empty_str(inner, "name"))
        .unwrap_or("Untitled")
        .to_string();

    let description = outer
        .get("description")
        .and_then(Value::as_str)
        .map(|d| truncate_chars(d, MAX_DESCRIPTION_CHARS))
        .unwrap_or_default();

    let category = outer
        .get("workflowInfo")
        .and_then(|info| info.get("categories"))
        .and_then(Value::as_array)
        .and_then(|cats| cats.first())
        .and_then(|first| first.get("name"))
        .and_then(Value::as_str)
        .and_then(category_for_label);

    Some(normalize_workflow(
        &Value::Object(inner.clone()),
        TemplateMeta {
            source_id: template_id.to_string(),
            title,
            description,
            category,
            source_url: TemplateClient::template_page_url(template_id),
            tags_override: None,
        },
    ))
}

/// Normalize a graph fetched for a listing entry, taking the title and
/// description from the listing.
pub fn normalize_listing_detail(summary: &ListingSummary, workflow: Value) -> Option<Template> {
    let envelope = json!({
        "workflow": {
            "workflow": workflow,
            "name": summary.name,
            "description": summary.description,
            "workflowInfo": { "categories": [] },
        }
    });
    normalize_from_api_payload(&envelope, &summary.source_id())
}

/// Normalize a workflow export read from disk (`meta.name`, `name`, `tags`,
/// `nodes`, `connections`).
pub fn normalize_from_local_json(local: &Value, source_id: &str, source_url: &str) -> Template {
    let title = local
        .get("meta")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            local
                .get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or("Untitled")
        .to_string();

    normalize_workflow(
        local,
        TemplateMeta {
            source_id: source_id.to_string(),
            title,
            description: String::new(),
            category: None,
            source_url: source_url.to_string(),
            tags_override: Some(tags_from_value(local.get("tags"))),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(node_type: &str) -> Value {
        json!({ "name": node_type, "type": node_type, "position": [0, 0] })
    }

    #[test]
    fn node_type_counts_ignore_order() {
        let a = vec![node("slack"), node("http"), node("slack"), json!({"name": "untyped"})];
        let b = vec![node("http"), json!({"type": ""}), node("slack"), node("slack")];

        let counts_a = extract_node_types(&a);
        assert_eq!(counts_a, extract_node_types(&b));
        assert_eq!(counts_a.get("slack"), Some(&2));
        assert_eq!(counts_a.get("http"), Some(&1));
        assert_eq!(counts_a.len(), 2);
    }

    #[test]
    fn api_payload_is_normalized() {
        let payload = json!({
            "workflow": {
                "name": "  Route support tickets  ",
                "description": "Classify incoming tickets",
                "workflowInfo": { "categories": [{ "name": "Support" }] },
                "workflow": {
                    "nodes": [node("n8n-nodes-base.zendesk"), node("n8n-nodes-base.zendesk")],
                    "connections": {},
                    "tags": ["Support", {"name": "AI"}, "Support", {"id": 1}]
                }
            }
        });

        let template = normalize_from_api_payload(&payload, "1234").unwrap();
        assert_eq!(template.source_id, "1234");
        assert_eq!(template.title, "Route support tickets");
        assert_eq!(template.description, "Classify incoming tickets");
        assert_eq!(template.category, Some(Category::SupportHelpdesk));
        assert_eq!(template.tags, vec!["Support", "AI"]);
        assert_eq!(template.source_url, "https://n8n.io/workflows/1234");
        assert_eq!(template.node_type_counts.get("n8n-nodes-base.zendesk"), Some(&2));
        assert_eq!(template.nodes.len(), 2);
        assert!(template.raw_workflow.get("connections").is_some());
    }

    #[test]
    fn api_payload_without_nodes_is_rejected() {
        assert!(normalize_from_api_payload(&json!({}), "1").is_none());
        assert!(normalize_from_api_payload(&json!({"workflow": {"workflow": {"nodes": []}}}), "1").is_none());
    }

    #[test]
    fn missing_upstream_category_falls_back_to_keywords() {
        let summary = ListingSummary {
            id: 99,
            name: "Summarize emails with OpenAI".to_string(),
            description: String::new(),
            total_views: 0,
        };
        let workflow = json!({ "nodes": [node("gmail")], "connections": {} });
        let template = normalize_listing_detail(&summary, workflow).unwrap();
        assert_eq!(template.title, "Summarize emails with OpenAI");
        assert_eq!(template.category, Some(Category::AiLlms));
    }

    #[test]
    fn unmatched_template_has_blank_category() {
        let summary = ListingSummary::new(5, "Hello world");
        let template =
            normalize_listing_detail(&summary, json!({ "nodes": [node("noop")], "connections": {} }))
                .unwrap();
        assert_eq!(template.category, None);
        assert_eq!(template.category_label(), "");
    }

    #[test]
    fn description_is_capped() {
        let long = "x".repeat(MAX_DESCRIPTION_CHARS + 50);
        let payload = json!({
            "workflow": { "description": long, "nodes": [node("a")], "connections": {} }
        });
        let template = normalize_from_api_payload(&payload, "7").unwrap();
        assert_eq!(template.description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert_eq!(template.title, "Untitled");
    }

    #[test]
    fn local_json_uses_meta_name_and_file_tags() {
        let local = json!({
            "name": "fallback",
            "meta": { "name": "Daily Slack digest", "id": 12 },
            "tags": [{"name": "Slack"}, "digest"],
            "nodes": [node("slack")],
            "connections": {}
        });
        let template = normalize_from_local_json(&local, "12", "https://example.com/12");
        assert_eq!(template.title, "Daily Slack digest");
        assert_eq!(template.tags, vec!["Slack", "digest"]);
        assert_eq!(template.category, Some(Category::ChatMessaging));
        assert_eq!(template.source_url, "https://example.com/12");

        let bare = normalize_from_local_json(&json!({"nodes": []}), "x", "");
        assert_eq!(bare.title, "Untitled");
        assert!(bare.tags.is_empty());
    }
}
