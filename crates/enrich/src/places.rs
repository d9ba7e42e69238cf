use std::time::Duration;

use async_trait::async_trait;
use extract::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// A capability that finds places matching a free-text query.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    /// Fails with `Configuration` when the credential is not available.
    fn check_credentials(&self) -> Result<()>;

    async fn search(&self, query: &str) -> Result<Vec<Place>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub address: Option<String>,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u64>,
    pub place_id: Option<String>,
    pub open_now: Option<bool>,
    pub maps_url: Option<String>,
}

#[derive(Clone)]
pub struct PlacesClient {
    base_url: String,
    /// Name of the environment variable holding the API key.
    api_key_var: String,
    max_results: usize,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct TextSearchResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Option<Vec<TextSearchResult>>,
}

#[derive(Deserialize)]
struct TextSearchResult {
    #[serde(default)]
    name: String,
    formatted_address: Option<String>,
    rating: Option<f64>,
    user_ratings_total: Option<u64>,
    place_id: Option<String>,
    opening_hours: Option<OpeningHours>,
}

#[derive(Deserialize)]
struct OpeningHours {
    open_now: Option<bool>,
}

impl From<TextSearchResult> for Place {
    fn from(result: TextSearchResult) -> Self {
        let maps_url = result
            .place_id
            .as_ref()
            .map(|id| format!("https://www.google.com/maps/place/?q=place_id:{}", id));

        Place {
            name: result.name,
            address: result.formatted_address,
            rating: result.rating,
            user_ratings_total: result.user_ratings_total,
            place_id: result.place_id,
            open_now: result.opening_hours.and_then(|h| h.open_now),
            maps_url,
        }
    }
}

impl PlacesClient {
    pub fn new(base_url: String, api_key_var: String, max_results: usize, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url,
            api_key_var,
            max_results,
            client,
        }
    }

    fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(PipelineError::missing_credential(&self.api_key_var)),
        }
    }
}

#[async_trait]
impl PlaceSearch for PlacesClient {
    fn check_credentials(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }

    async fn search(&self, query: &str) -> Result<Vec<Place>> {
        let api_key = self.api_key()?;
        let url = format!("{}/textsearch/json", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("query", query), ("key", api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                let message = format!("Failed to send place search request: {}", e);
                if e.is_timeout() || e.is_connect() {
                    PipelineError::transient_enrichment(message)
                } else {
                    PipelineError::enrichment(message)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("Place search request failed: {}", status);
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                PipelineError::transient_enrichment(message)
            } else {
                PipelineError::enrichment(message)
            });
        }

        let body: TextSearchResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::enrichment(format!("Failed to read place search response: {}", e)))?;

        into_places(body, self.max_results)
    }
}

/// Map a provider response to places. No results is not an error.
fn into_places(body: TextSearchResponse, max_results: usize) -> Result<Vec<Place>> {
    match body.status.as_deref() {
        None | Some("OK") | Some("ZERO_RESULTS") => {}
        Some(status @ ("OVER_QUERY_LIMIT" | "UNKNOWN_ERROR")) => {
            return Err(PipelineError::transient_enrichment(format!(
                "Place search failed: {}",
                status
            )));
        }
        Some(status) => {
            let detail = body.error_message.unwrap_or_default();
            return Err(PipelineError::enrichment(
                format!("Place search failed: {} {}", status, detail).trim().to_string(),
            ));
        }
    }

    Ok(body
        .results
        .unwrap_or_default()
        .into_iter()
        .take(max_results)
        .map(Place::from)
        .collect())
}
