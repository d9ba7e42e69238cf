pub mod places;

pub use places::{Place, PlaceSearch, PlacesClient};

use std::sync::{Arc, LazyLock};

use extract::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_LOCATION: &str = "Dhaka, Bangladesh";

/// Used when the model gives no search keyword.
const FALLBACK_KEYWORD: &str = "Doctor";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// What to do when the place search fails after a successful extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentPolicy {
    /// The whole response fails.
    #[default]
    FailTogether,
    /// The extraction is returned without enrichment.
    Partial,
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").to_string()
}

/// `"<keyword> in <location>"`, with blank parts replaced by defaults.
pub fn build_query(keyword: Option<&str>, location: Option<&str>, default_location: &str) -> String {
    let keyword = keyword.map(collapse).filter(|k| !k.is_empty());
    let location = location.map(collapse).filter(|l| !l.is_empty());

    format!(
        "{} in {}",
        keyword.as_deref().unwrap_or(FALLBACK_KEYWORD),
        location.as_deref().unwrap_or(default_location)
    )
}

#[derive(Clone)]
pub struct Enricher {
    search: Arc<dyn PlaceSearch>,
    default_location: String,
    policy: EnrichmentPolicy,
}

impl Enricher {
    pub fn new(search: Arc<dyn PlaceSearch>, default_location: String, policy: EnrichmentPolicy) -> Self {
        Self {
            search,
            default_location,
            policy,
        }
    }

    pub fn check_credentials(&self) -> Result<()> {
        self.search.check_credentials()
    }

    pub fn query_for(&self, keyword: Option<&str>, location: Option<&str>) -> String {
        build_query(keyword, location, &self.default_location)
    }

    /// Search once for `keyword` near `location`.
    ///
    /// `Ok(None)` means the search failed and the policy allows leaving the
    /// enrichment out.
    pub async fn enrich(&self, keyword: Option<&str>, location: Option<&str>) -> Result<Option<Vec<Place>>> {
        let query = self.query_for(keyword, location);

        match self.search.search(&query).await {
            Ok(places) => {
                info!(query = %query, results = places.len(), "Place search complete");
                Ok(Some(places))
            }
            Err(e) if self.policy == EnrichmentPolicy::Partial => {
                warn!(query = %query, error = %e, "Place search failed, returning extraction only");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
