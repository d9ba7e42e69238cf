pub mod error;
pub mod llm;
pub mod prompt;
pub mod sanitize;
pub mod schema;
pub mod stage;

pub use error::{PipelineError, Result};
pub use llm::{GeminiClient, TextGenerator};
pub use prompt::Language;
pub use schema::{
    BloodGroup, BloodRequestRecord, ContractCheck, HistorySummary, Lenient, TriageRecord, Urgency,
};
pub use stage::{Stage, StageTracker};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::warn;

/// Drives prompt -> generation -> sanitize (-> decode) for one request.
#[derive(Clone)]
pub struct Extractor {
    generator: Arc<dyn TextGenerator>,
}

impl Extractor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn check_credentials(&self) -> Result<()> {
        self.generator.check_credentials()
    }

    async fn generate(&self, prompt: String, tracker: &mut StageTracker) -> Result<String> {
        tracker.advance(Stage::Prompted);
        let raw = self.generator.generate(&prompt).await?;
        tracker.advance(Stage::Generated);
        Ok(raw)
    }

    /// Generate and decode into a typed record. Contract strays are logged.
    pub async fn extract<T>(&self, prompt: String, tracker: &mut StageTracker) -> Result<T>
    where
        T: DeserializeOwned + ContractCheck,
    {
        self.check_credentials()?;
        let raw = self.generate(prompt, tracker).await?;

        let record: T = sanitize::decode(&raw)?;
        tracker.advance(Stage::Sanitized);

        let violations = record.violations();
        if !violations.is_empty() {
            warn!(?violations, "Model output does not match the output contract");
        }

        Ok(record)
    }

    /// Generate and return the sanitized text as-is.
    pub async fn extract_forward(&self, prompt: String, tracker: &mut StageTracker) -> Result<String> {
        self.check_credentials()?;
        let raw = self.generate(prompt, tracker).await?;

        let cleaned = sanitize::forward(&raw)?;
        tracker.advance(Stage::Sanitized);

        if let Ok(summary) = serde_json::from_str::<HistorySummary>(&cleaned) {
            let violations = summary.violations();
            if !violations.is_empty() {
                warn!(?violations, "Model output does not match the output contract");
            }
        }

        Ok(cleaned)
    }
}
