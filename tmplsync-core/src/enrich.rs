//! Second pass over stored templates: refresh tags and categories from the
//! live detail endpoint, with the language model as a fallback for rows the
//! keyword rules leave empty or generic.

use crate::categorizer::{AiCategorizer, CategorizeItem};
use crate::data::Database;
use crate::error::Result;
use crate::model::{Category, StoredTemplate};
use crate::normalize::normalize_from_api_payload;
use crate::taxonomy::{derive_category, derive_keyword_tags, merge_tags};
use std::collections::HashMap;
use tmplsync_fetch::TemplateClient;
use tracing::{debug, info, warn};

pub const DEFAULT_PAGE_SIZE: usize = 500;
const MAX_KEYWORD_TAGS: usize = 5;

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub page_size: usize,
    /// Send empty or generic categories to the language model.
    pub use_ai: bool,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            use_ai: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub updated: u64,
    pub skipped: u64,
}

/// What the pass decided for one stored row before the model is consulted.
#[derive(Debug, Clone)]
struct PlannedUpdate {
    row_id: i64,
    existing_category: String,
    category: Option<Category>,
    tags: Vec<String>,
    item: CategorizeItem,
}

impl PlannedUpdate {
    fn needs_ai(&self) -> bool {
        self.category.is_none_or(|c| c.is_generic())
    }
}

async fn plan_row(client: &TemplateClient, row: &StoredTemplate) -> Option<PlannedUpdate> {
    let source_id = row.source_id.as_deref().filter(|s| !s.is_empty())?;

    let payload = match client.fetch_detail_payload(source_id).await {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            warn!("Skipping {}: no usable detail response", source_id);
            return None;
        }
        Err(e) => {
            warn!("Skipping {}: {}", source_id, e);
            return None;
        }
    };

    let Some(template) = normalize_from_api_payload(&payload, source_id) else {
        warn!("Skipping {}: detail has no workflow nodes", source_id);
        return None;
    };

    let keyword_tags = derive_keyword_tags(&template.title, &template.description, MAX_KEYWORD_TAGS);
    let tags = merge_tags(&template.tags, &keyword_tags);
    let category = template
        .category
        .or_else(|| derive_category(&tags, &template.title, &template.description));

    let title = if template.title.is_empty() { row.title.clone() } else { template.title.clone() };
    let description = if template.description.is_empty() {
        row.description.clone()
    } else {
        template.description.clone()
    };

    Some(PlannedUpdate {
        row_id: row.id,
        existing_category: row.category.clone(),
        category,
        item: CategorizeItem {
            id: row.id.to_string(),
            title,
            description,
            tags: tags.clone(),
            node_types: template.node_type_names(),
        },
        tags,
    })
}

fn apply_update(
    database: &Database,
    plan: &PlannedUpdate,
    ai_categories: &HashMap<String, Category>,
) -> Result<bool> {
    let category = ai_categories
        .get(&plan.item.id)
        .copied()
        .or(plan.category)
        .map(|c| c.as_str())
        .filter(|label| *label != plan.existing_category);
    let tags = (!plan.tags.is_empty()).then_some(plan.tags.as_slice());

    Ok(database.update_template_metadata(plan.row_id, category, tags)?)
}

/// Walk every stored template, re-derive its tags and category and write
/// back what changed. Rows that cannot be refreshed count as skipped.
pub async fn execute_enrich(
    options: EnrichOptions,
    client: &TemplateClient,
    database: &Database,
    categorizer: Option<&AiCategorizer>,
) -> Result<EnrichSummary> {
    let page_size = options.page_size.max(1);
    let categorizer = categorizer.filter(|_| options.use_ai);
    let mut summary = EnrichSummary::default();
    let mut offset = 0;

    loop {
        info!("Fetching stored templates (offset={}, limit={})", offset, page_size);
        let rows = database.templates_page(offset, page_size)?;
        if rows.is_empty() {
            break;
        }

        let mut plans = Vec::with_capacity(rows.len());
        for row in &rows {
            match plan_row(client, row).await {
                Some(plan) => plans.push(plan),
                None => summary.skipped += 1,
            }
        }

        let ai_categories = match categorizer {
            Some(categorizer) => {
                let queued: Vec<CategorizeItem> = plans
                    .iter()
                    .filter(|plan| plan.needs_ai())
                    .map(|plan| plan.item.clone())
                    .collect();
                if queued.is_empty() {
                    HashMap::new()
                } else {
                    debug!("Refining {} categories with the language model", queued.len());
                    categorizer.categorize_batch(&queued).await
                }
            }
            None => HashMap::new(),
        };

        for plan in &plans {
            match apply_update(database, plan, &ai_categories) {
                Ok(true) => summary.updated += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    warn!("Could not update template row {}: {}", plan.row_id, e);
                    summary.skipped += 1;
                }
            }
        }

        offset += rows.len();
        if rows.len() < page_size {
            break;
        }
    }

    info!(
        "Enrichment complete. Updated={}, Skipped={}",
        summary.updated, summary.skipped
    );
    Ok(summary)
}
