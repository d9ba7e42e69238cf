use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use enrich::Place;
use extract::PipelineError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Key the place search results are attached under.
pub const ENRICHMENT_KEY: &str = "internet_doctors";

/// The single body a request produces: success-shaped or error-shaped.
#[derive(Debug)]
pub enum Envelope {
    /// Record fields at the top level, plus enrichment when it ran.
    Success(Map<String, Value>),
    /// Sanitized model text sent as-is.
    Forward(String),
    Failure(PipelineError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    kind: &'a str,
}

/// Spread `record` at the top level and attach `enrichment` if present.
pub fn compose<T: Serialize>(record: &T, enrichment: Option<Vec<Place>>) -> Result<Envelope, PipelineError> {
    let mut fields = match serde_json::to_value(record)? {
        Value::Object(fields) => fields,
        other => {
            return Err(PipelineError::Parse(format!(
                "Model output is not a JSON object: {}",
                other
            )));
        }
    };

    if fields.contains_key("error") {
        return Err(PipelineError::Parse(
            "Model output contains a reserved `error` field".to_string(),
        ));
    }

    // The key belongs to the search results; a model-made value never passes through.
    fields.remove(ENRICHMENT_KEY);
    if let Some(places) = enrichment {
        fields.insert(ENRICHMENT_KEY.to_string(), serde_json::to_value(places)?);
    }

    Ok(Envelope::Success(fields))
}

/// Forwarded text gets the same `error` key check as composed records.
pub fn compose_forward(text: String) -> Result<Envelope, PipelineError> {
    let fields: Map<String, Value> = serde_json::from_str(&text)?;
    if fields.contains_key("error") {
        return Err(PipelineError::Parse(
            "Model output contains a reserved `error` field".to_string(),
        ));
    }
    Ok(Envelope::Forward(text))
}

impl From<Result<Envelope, PipelineError>> for Envelope {
    fn from(result: Result<Envelope, PipelineError>) -> Self {
        result.unwrap_or_else(Envelope::Failure)
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        match self {
            Envelope::Success(fields) => (StatusCode::OK, Json(Value::Object(fields))).into_response(),
            Envelope::Forward(text) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                text,
            )
                .into_response(),
            Envelope::Failure(error) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: error.message(),
                    kind: error.kind(),
                }),
            )
                .into_response(),
        }
    }
}
