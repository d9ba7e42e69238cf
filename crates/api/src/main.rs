mod config;
mod envelope;
mod metrics;
mod retry;
mod routes;

use anyhow::{Context, Result};
use enrich::{Enricher, PlacesClient};
use extract::{Extractor, GeminiClient};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::retry::{RetryPolicy, RetryingGenerator, RetryingSearch};
use crate::routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let policy = RetryPolicy::from_config(&config.retry);
    let timeout = Duration::from_secs(config.retry.request_timeout_secs);

    // API keys are not read here: each request looks them up itself.
    let gemini = GeminiClient::new(
        config.generation.base_url.clone(),
        config.generation.model.clone(),
        config.generation.api_key_var.clone(),
        timeout,
    );
    let places = PlacesClient::new(
        config.search.base_url.clone(),
        config.search.api_key_var.clone(),
        config.search.max_results,
        timeout,
    );

    let state = AppState {
        extractor: Extractor::new(Arc::new(RetryingGenerator::new(Arc::new(gemini), policy.clone()))),
        enricher: Enricher::new(
            Arc::new(RetryingSearch::new(Arc::new(places), policy)),
            config.search.default_location.clone(),
            config.search.policy,
        ),
        metrics: Metrics::new(),
    };

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %config.bind_addr,
        model = %config.generation.model,
        enrichment_policy = ?config.search.policy,
        "Server listening"
    );

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
