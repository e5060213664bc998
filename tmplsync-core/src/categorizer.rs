//! Language-model fallback for templates the keyword rules could not place
//! (or only placed in a generic bucket).

use crate::config::CategorizerSettings;
use crate::error::Result;
use crate::model::Category;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tmplsync_fetch::{ChatMessage, CompletionClient};
use tracing::{debug, info, warn};

const MAX_PROMPT_DESCRIPTION_CHARS: usize = 4_000;

const SYSTEM_PROMPT: &str = "You are an expert product categorizer for workflow automations. \
For each item, choose exactly ONE category from the allowed list that best describes the primary \
purpose of the workflow. Respond as a JSON array of objects, each with fields 'id' and 'category'. \
The 'category' MUST be one of the allowed_categories exactly, and you must return the same number \
of items, in the same order, as the input.";

/// Summary of one template sent to the model.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategorizeItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub node_types: Vec<String>,
}

#[derive(Serialize)]
struct PromptPayload<'a> {
    allowed_categories: Vec<&'static str>,
    items: Vec<&'a CategorizeItem>,
}

/// Why a reply could not be used.
#[derive(Debug, PartialEq)]
pub enum ReplyError {
    /// Not JSON at all; worth asking again.
    Malformed(String),
    /// Valid JSON but not an array; the batch is dropped.
    NotAnArray,
}

pub struct AiCategorizer {
    client: CompletionClient,
    settings: CategorizerSettings,
}

impl AiCategorizer {
    /// `Ok(None)` when no API key is configured.
    pub fn from_settings(settings: CategorizerSettings) -> Result<Option<Self>> {
        let Some(api_key) = settings.api_key.clone() else {
            warn!("OPENAI_API_KEY is not set; AI categorization will be skipped.");
            return Ok(None);
        };
        let client = CompletionClient::new(&settings.base_url, api_key, settings.model.clone())?;
        Ok(Some(Self { client, settings }))
    }

    /// Categorize items in sub-batches. Returns id -> category for every
    /// answer that named an allowed category; failed sub-batches contribute
    /// nothing.
    pub async fn categorize_batch(&self, items: &[CategorizeItem]) -> HashMap<String, Category> {
        let mut results = HashMap::new();
        let prompt_items: Vec<CategorizeItem> = items
            .iter()
            .filter(|item| !item.id.is_empty())
            .map(prepare_item)
            .collect();

        let batch_size = self.settings.batch_size.max(1);
        let total_batches = prompt_items.len().div_ceil(batch_size);

        for (index, batch) in prompt_items.chunks(batch_size).enumerate() {
            let messages = build_messages(batch);
            match self.request_with_retry(&messages).await {
                Some(answers) => {
                    debug!(
                        "AI batch {}/{}: {} of {} categorized",
                        index + 1,
                        total_batches,
                        answers.len(),
                        batch.len()
                    );
                    results.extend(answers);
                }
                None => warn!("AI batch {}/{} abandoned", index + 1, total_batches),
            }

            if !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
        }

        info!(
            "AI categorized {} of {} templates with {}",
            results.len(),
            prompt_items.len(),
            self.client.model()
        );
        results
    }

    async fn request_with_retry(&self, messages: &[ChatMessage]) -> Option<Vec<(String, Category)>> {
        let attempts = self.settings.max_attempts.max(1);
        let mut backoff = self.settings.initial_backoff;

        for attempt in 1..=attempts {
            let failure = match self.client.complete(messages).await {
                Ok(content) => match parse_reply(&content) {
                    Ok(answers) => return Some(answers),
                    Err(ReplyError::NotAnArray) => {
                        warn!("AI response is not a list; skipping batch.");
                        return None;
                    }
                    Err(ReplyError::Malformed(e)) => e,
                },
                Err(e) => e.to_string(),
            };

            warn!("Error from AI endpoint (attempt {}/{}): {}", attempt, attempts, failure);
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
        None
    }
}

fn prepare_item(item: &CategorizeItem) -> CategorizeItem {
    CategorizeItem {
        description: item.description.chars().take(MAX_PROMPT_DESCRIPTION_CHARS).collect(),
        ..item.clone()
    }
}

/// System and user messages for one sub-batch.
pub fn build_messages(items: &[CategorizeItem]) -> Vec<ChatMessage> {
    let payload = PromptPayload {
        allowed_categories: Category::ALL.iter().map(|c| c.as_str()).collect(),
        items: items.iter().collect(),
    };
    let user = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a model reply into `(id, category)` pairs, dropping entries
/// without an id or with a category outside the allowed set.
pub fn parse_reply(content: &str) -> std::result::Result<Vec<(String, Category)>, ReplyError> {
    let value: Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| ReplyError::Malformed(e.to_string()))?;
    let Value::Array(entries) = value else {
        return Err(ReplyError::NotAnArray);
    };

    let answers = entries
        .iter()
        .filter_map(|entry| {
            let id = match entry.get("id")? {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let category = Category::from_label(entry.get("category")?.as_str()?)?;
            (!id.is_empty()).then_some((id, category))
        })
        .collect();
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reply_keeps_allowed_categories_only() {
        let reply = r#"[
            {"id": "1", "category": "AI & LLMs"},
            {"id": 2, "category": "Gardening"},
            {"id": "3"},
            {"category": "Other"},
            {"id": "", "category": "Other"},
            "junk",
            {"id": "6", "category": "Social Media"}
        ]"#;
        let answers = parse_reply(reply).unwrap();
        assert_eq!(
            answers,
            vec![
                ("1".to_string(), Category::AiLlms),
                ("6".to_string(), Category::SocialMedia)
            ]
        );
    }

    #[test]
    fn parse_reply_accepts_numeric_ids_and_code_fences() {
        let reply = "```json\n[{\"id\": 42, \"category\": \"Spreadsheets\"}]\n```";
        assert_eq!(
            parse_reply(reply).unwrap(),
            vec![("42".to_string(), Category::Spreadsheets)]
        );
    }

    #[test]
    fn parse_reply_distinguishes_failures() {
        assert_eq!(parse_reply(r#"{"id": "1"}"#), Err(ReplyError::NotAnArray));
        assert!(matches!(parse_reply("I think it is AI"), Err(ReplyError::Malformed(_))));
    }

    #[test]
    fn prompt_lists_every_category() {
        let items = vec![CategorizeItem {
            id: "7".to_string(),
            title: "t".to_string(),
            ..Default::default()
        }];
        let messages = build_messages(&items);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");

        let payload: Value = serde_json::from_str(&messages[1].content).unwrap();
        assert_eq!(payload["allowed_categories"].as_array().unwrap().len(), Category::ALL.len());
        assert_eq!(payload["items"][0]["id"], "7");
    }

    #[test]
    fn long_descriptions_are_cut() {
        let item = CategorizeItem {
            id: "1".to_string(),
            description: "é".repeat(MAX_PROMPT_DESCRIPTION_CHARS + 10),
            ..Default::default()
        };
        assert_eq!(prepare_item(&item).description.chars().count(), MAX_PROMPT_DESCRIPTION_CHARS);
    }

    #[test]
    fn missing_key_disables_categorizer() {
        let categorizer = AiCategorizer::from_settings(CategorizerSettings::default()).unwrap();
        assert!(categorizer.is_none());
    }
}
