//! Settings resolved from the environment.
//!
//! Command-line flags are handled by the binary; everything that is only
//! ever set through environment variables is read here.

use std::time::Duration;
use tmplsync_fetch::completion::{DEFAULT_COMPLETIONS_BASE, DEFAULT_MODEL};

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/tmplsync/";
pub const DATABASE_FILE_NAME: &str = "tmplsync.db";

pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const ENV_AI_BATCH_SIZE: &str = "AI_BATCH_SIZE";
pub const ENV_AI_BATCH_DELAY_MS: &str = "AI_BATCH_DELAY_MS";
pub const ENV_ADMIN_RUN_ID: &str = "ADMIN_RUN_ID";

const DEFAULT_AI_BATCH_SIZE: usize = 25;
const MAX_AI_BATCH_SIZE: usize = 100;
const DEFAULT_AI_BATCH_DELAY_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct CategorizerSettings {
    /// `None` disables the categorizer.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for CategorizerSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_COMPLETIONS_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            batch_size: DEFAULT_AI_BATCH_SIZE,
            batch_delay: Duration::from_millis(DEFAULT_AI_BATCH_DELAY_MS),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl CategorizerSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            api_key: non_empty(ENV_OPENAI_API_KEY),
            base_url: non_empty(ENV_OPENAI_BASE_URL).unwrap_or(defaults.base_url),
            model: non_empty(ENV_OPENAI_MODEL).unwrap_or(defaults.model),
            batch_size: parse_batch_size(non_empty(ENV_AI_BATCH_SIZE).as_deref()),
            batch_delay: parse_delay_ms(non_empty(ENV_AI_BATCH_DELAY_MS).as_deref()),
            ..defaults
        }
    }
}

/// Sub-batch size; defaults to 25, clamped to `1..=100`.
pub fn parse_batch_size(raw: Option<&str>) -> usize {
    raw.and_then(|r| r.parse::<i64>().ok())
        .map(|n| n.clamp(1, MAX_AI_BATCH_SIZE as i64) as usize)
        .unwrap_or(DEFAULT_AI_BATCH_SIZE)
}

/// Delay between sub-batches in milliseconds; defaults to 250, negatives
/// become zero.
pub fn parse_delay_ms(raw: Option<&str>) -> Duration {
    let ms = raw
        .and_then(|r| r.parse::<i64>().ok())
        .unwrap_or(DEFAULT_AI_BATCH_DELAY_MS as i64);
    Duration::from_millis(ms.max(0) as u64)
}

/// Admin run id to report progress into, if the job was started from the
/// admin UI.
pub fn admin_run_id_from_env() -> Option<String> {
    std::env::var(ENV_ADMIN_RUN_ID)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The admin UI's run id when one was handed over, otherwise a fresh one so
/// local runs still leave a row in `admin_job_runs`.
pub fn resolve_admin_run_id() -> String {
    admin_run_id_from_env().unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let settings = CategorizerSettings::from_lookup(lookup(&[]));
        assert!(settings.api_key.is_none());
        assert_eq!(settings.model, "gpt-4o-mini");
        assert_eq!(settings.batch_size, 25);
        assert_eq!(settings.batch_delay, Duration::from_millis(250));
        assert_eq!(settings.max_attempts, 3);
    }

    #[test]
    fn reads_and_clamps_values() {
        let settings = CategorizerSettings::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-123"),
            ("OPENAI_MODEL", "gpt-test"),
            ("AI_BATCH_SIZE", "1000"),
            ("AI_BATCH_DELAY_MS", "-5"),
        ]));
        assert_eq!(settings.api_key.as_deref(), Some("sk-123"));
        assert_eq!(settings.model, "gpt-test");
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.batch_delay, Duration::ZERO);
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let settings = CategorizerSettings::from_lookup(lookup(&[("OPENAI_API_KEY", "   ")]));
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn batch_size_parsing() {
        assert_eq!(parse_batch_size(Some("0")), 1);
        assert_eq!(parse_batch_size(Some("40")), 40);
        assert_eq!(parse_batch_size(Some("many")), 25);
        assert_eq!(parse_batch_size(None), 25);
    }
}
