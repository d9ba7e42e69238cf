use anyhow::{Context, Result};
use enrich::EnrichmentPolicy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub generation: GenerationConfig,
    pub search: SearchConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable the API key is read from on each request.
    pub api_key_var: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key_var: String,
    pub default_location: String,
    pub max_results: usize,
    pub policy: EnrichmentPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            generation: GenerationConfig {
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-1.5-flash".to_string(),
                api_key_var: "GEMINI_API_KEY".to_string(),
            },
            search: SearchConfig {
                base_url: "https://maps.googleapis.com/maps/api/place".to_string(),
                api_key_var: "GOOGLE_PLACES_API_KEY".to_string(),
                default_location: enrich::DEFAULT_LOCATION.to_string(),
                max_results: 5,
                policy: EnrichmentPolicy::FailTogether,
            },
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 500,
                max_backoff_ms: 4000,
                request_timeout_secs: 30,
            },
        }
    }
}

impl AppConfig {
    /// Defaults overridden by whatever is set in the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        let string = |key: &str, target: &mut String| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *target = value.trim().to_string();
            }
        };
        string("BIND_ADDR", &mut config.bind_addr);
        string("GEMINI_BASE_URL", &mut config.generation.base_url);
        string("GEMINI_MODEL", &mut config.generation.model);
        string("GEMINI_API_KEY_VAR", &mut config.generation.api_key_var);
        string("PLACES_BASE_URL", &mut config.search.base_url);
        string("PLACES_API_KEY_VAR", &mut config.search.api_key_var);
        string("DEFAULT_LOCATION", &mut config.search.default_location);

        parse_into(&lookup, "PLACES_MAX_RESULTS", &mut config.search.max_results)?;
        parse_into(&lookup, "RETRY_MAX", &mut config.retry.max_retries)?;
        parse_into(&lookup, "RETRY_INITIAL_BACKOFF_MS", &mut config.retry.initial_backoff_ms)?;
        parse_into(&lookup, "RETRY_MAX_BACKOFF_MS", &mut config.retry.max_backoff_ms)?;
        parse_into(&lookup, "REQUEST_TIMEOUT_SECS", &mut config.retry.request_timeout_secs)?;

        if let Some(policy) = lookup("ENRICHMENT_POLICY") {
            config.search.policy = match policy.trim().to_lowercase().as_str() {
                "fail_together" => EnrichmentPolicy::FailTogether,
                "partial" => EnrichmentPolicy::Partial,
                other => anyhow::bail!("ENRICHMENT_POLICY must be fail_together or partial, got {:?}", other),
            };
        }

        Ok(config)
    }
}

fn parse_into<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw))?;
    }
    Ok(())
}
