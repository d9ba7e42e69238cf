use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A capability that turns a prompt into raw model text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Fails with `Configuration` when the credential is not available.
    fn check_credentials(&self) -> Result<()>;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    /// Name of the environment variable holding the API key.
    api_key_var: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

impl GeminiClient {
    pub fn new(base_url: String, model: String, api_key_var: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url,
            model,
            api_key_var,
            client,
        }
    }

    /// Key is looked up on every call, never cached.
    fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(PipelineError::missing_credential(&self.api_key_var)),
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn check_credentials(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self.api_key()?;
        if prompt.trim().is_empty() {
            return Err(PipelineError::InvalidRequest("Prompt is empty".to_string()));
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport_error("Failed to send request to Gemini", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("Gemini request failed: {} {}", status, body.trim());
            return Err(if is_transient_status(status) {
                PipelineError::transient_generation(message)
            } else {
                PipelineError::generation(message)
            });
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::generation(format!("Failed to read Gemini response: {}", e)))?;

        candidate_text(gemini_response)
    }
}

fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn classify_transport_error(context: &str, err: &reqwest::Error) -> PipelineError {
    let message = format!("{}: {}", context, err);
    if err.is_timeout() || err.is_connect() {
        PipelineError::transient_generation(message)
    } else {
        PipelineError::generation(message)
    }
}

/// Concatenate the text parts of the first candidate.
fn candidate_text(response: GeminiResponse) -> Result<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(PipelineError::generation("Gemini returned no candidate text"));
    }
    Ok(text)
}
