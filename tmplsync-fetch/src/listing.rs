use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// One row of the template search listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, rename = "totalViews", deserialize_with = "null_as_default")]
    pub total_views: u64,
}

impl ListingSummary {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            total_views: 0,
        }
    }

    /// Build a summary from one raw listing row. Only `id` is required; it may
    /// be a number or a numeric string. Other fields fall back to empty.
    pub fn from_row(row: &Value) -> Option<Self> {
        let id = match row.get("id")? {
            Value::Number(n) => n.as_u64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        let text = |key: &str| {
            row.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Some(Self {
            id,
            name: text("name"),
            description: text("description"),
            total_views: row.get("totalViews").and_then(Value::as_u64).unwrap_or(0),
        })
    }

    pub fn source_id(&self) -> String {
        self.id.to_string()
    }
}

/// A single page of `/templates/search`.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub workflows: Vec<ListingSummary>,
    pub total_workflows: usize,
}

#[derive(Deserialize)]
struct RawListingPage {
    #[serde(default, deserialize_with = "null_as_default")]
    workflows: Vec<Value>,
    #[serde(default, rename = "totalWorkflows", deserialize_with = "null_as_default")]
    total_workflows: usize,
}

impl ListingPage {
    /// Parse a listing response body. Rows without a usable id are logged
    /// and dropped; the rest of the page is kept.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        let raw: RawListingPage = serde_json::from_slice(body)?;
        let workflows = raw
            .workflows
            .iter()
            .filter_map(|row| {
                let summary = ListingSummary::from_row(row);
                if summary.is_none() {
                    warn!("Skipping listing row without a usable id: {}", row);
                }
                summary
            })
            .collect();

        Ok(Self {
            workflows,
            total_workflows: raw.total_workflows,
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let value: Option<T> = Option::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

/// Pull the workflow graph out of a detail response.
///
/// The API nests the graph as `{ workflow: { workflow: { nodes, connections }, name, ... } }`
/// but older templates put `nodes` directly on the outer `workflow` object.
/// Returns `None` when neither shape is present.
pub fn unwrap_workflow_envelope(payload: &Value) -> Option<Value> {
    let outer = payload.as_object()?;
    let wrapper = outer.get("workflow").and_then(Value::as_object);

    let inner = wrapper
        .and_then(|w| w.get("workflow"))
        .and_then(Value::as_object)
        .or(wrapper);

    if let Some(inner) = inner {
        if inner.contains_key("nodes") && inner.contains_key("connections") {
            return Some(Value::Object(inner.clone()));
        }
    }
    if let Some(wrapper) = wrapper {
        if wrapper.contains_key("nodes") {
            return Some(Value::Object(wrapper.clone()));
        }
    }
    None
}
