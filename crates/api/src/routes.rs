use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, Method},
    routing::{get, post},
    Json, Router,
};
use enrich::Enricher;
use extract::{
    prompt, BloodRequestRecord, Extractor, Language, PipelineError, Stage, StageTracker, TriageRecord,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::envelope::{compose, compose_forward, Envelope};
use crate::metrics::{Flow, Metrics, MetricsSnapshot, TimedOperation};

#[derive(Clone)]
pub struct AppState {
    pub extractor: Extractor,
    pub enricher: Enricher,
    pub metrics: Arc<Metrics>,
}

#[derive(Deserialize)]
struct TriageRequest {
    #[serde(default)]
    symptoms: String,
    location: Option<String>,
    language: Option<String>,
}

#[derive(Deserialize)]
struct BloodRequest {
    #[serde(default, alias = "request")]
    text: String,
}

#[derive(Deserialize)]
struct HistoryRequest {
    #[serde(default)]
    history: Vec<Value>,
    language: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ]);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .route("/analyze-symptoms", post(analyze_symptoms))
        .route("/parse-blood-request", post(parse_blood_request))
        .route("/summarize-history", post(summarize_history))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

async fn analyze_symptoms(
    State(state): State<AppState>,
    payload: Result<Json<TriageRequest>, JsonRejection>,
) -> Envelope {
    let span = info_span!("analyze_symptoms", request_id = %Uuid::new_v4());
    async move {
        let mut tracker = StageTracker::new(Flow::Triage.name());
        let result = triage(&state, payload, &mut tracker).await;
        finish(&state, Flow::Triage, &mut tracker, result)
    }
    .instrument(span)
    .await
}

async fn parse_blood_request(
    State(state): State<AppState>,
    payload: Result<Json<BloodRequest>, JsonRejection>,
) -> Envelope {
    let span = info_span!("parse_blood_request", request_id = %Uuid::new_v4());
    async move {
        let mut tracker = StageTracker::new(Flow::BloodRequest.name());
        let result = blood_request(&state, payload, &mut tracker).await;
        finish(&state, Flow::BloodRequest, &mut tracker, result)
    }
    .instrument(span)
    .await
}

async fn summarize_history(
    State(state): State<AppState>,
    payload: Result<Json<HistoryRequest>, JsonRejection>,
) -> Envelope {
    let span = info_span!("summarize_history", request_id = %Uuid::new_v4());
    async move {
        let mut tracker = StageTracker::new(Flow::History.name());
        let result = history(&state, payload, &mut tracker).await;
        finish(&state, Flow::History, &mut tracker, result)
    }
    .instrument(span)
    .await
}

fn finish(
    state: &AppState,
    flow: Flow,
    tracker: &mut StageTracker,
    result: Result<Envelope, PipelineError>,
) -> Envelope {
    state.metrics.record_request(flow);
    match result {
        Ok(envelope) => {
            tracker.advance(Stage::Composed);
            state.metrics.record_success();
            envelope
        }
        Err(e) => {
            tracker.fail(&e);
            state.metrics.record_failure(&e);
            Envelope::Failure(e)
        }
    }
}

fn reject(rejection: JsonRejection) -> PipelineError {
    PipelineError::InvalidRequest(rejection.body_text())
}

/// Blank text is rejected; accepted text reaches the prompt unmodified.
fn required(text: &str, field: &str) -> Result<(), PipelineError> {
    if text.trim().is_empty() {
        return Err(PipelineError::InvalidRequest(format!("`{}` is required", field)));
    }
    Ok(())
}

async fn triage(
    state: &AppState,
    payload: Result<Json<TriageRequest>, JsonRejection>,
    tracker: &mut StageTracker,
) -> Result<Envelope, PipelineError> {
    let Json(request) = payload.map_err(reject)?;
    required(&request.symptoms, "symptoms")?;

    // Both secrets are checked before anything goes over the network.
    state.extractor.check_credentials()?;
    state.enricher.check_credentials()?;

    let language = Language::from_selector(request.language.as_deref());
    let timer = TimedOperation::start();
    let record: TriageRecord = state
        .extractor
        .extract(prompt::build_triage_prompt(&request.symptoms, language), tracker)
        .await?;
    state.metrics.record_generation(timer.elapsed());

    let timer = TimedOperation::start();
    let outcome = state
        .enricher
        .enrich(record.search_keyword().as_deref(), request.location.as_deref())
        .await;
    state.metrics.record_enrichment(timer.elapsed());
    let places = outcome?;
    if places.is_some() {
        tracker.advance(Stage::Enriched);
    }

    compose(&record, places)
}

async fn blood_request(
    state: &AppState,
    payload: Result<Json<BloodRequest>, JsonRejection>,
    tracker: &mut StageTracker,
) -> Result<Envelope, PipelineError> {
    let Json(request) = payload.map_err(reject)?;
    required(&request.text, "text")?;

    let timer = TimedOperation::start();
    let record: BloodRequestRecord = state
        .extractor
        .extract(prompt::build_blood_request_prompt(&request.text), tracker)
        .await?;
    state.metrics.record_generation(timer.elapsed());

    compose(&record, None)
}

async fn history(
    state: &AppState,
    payload: Result<Json<HistoryRequest>, JsonRejection>,
    tracker: &mut StageTracker,
) -> Result<Envelope, PipelineError> {
    let Json(request) = payload.map_err(reject)?;
    if request.history.is_empty() {
        return Err(PipelineError::InvalidRequest("`history` must not be empty".to_string()));
    }

    let language = Language::from_selector(request.language.as_deref());
    let timer = TimedOperation::start();
    let text = state
        .extractor
        .extract_forward(prompt::build_history_prompt(&request.history, language), tracker)
        .await?;
    state.metrics.record_generation(timer.elapsed());

    compose_forward(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use enrich::{EnrichmentPolicy, Place, PlaceSearch};
    use extract::TextGenerator;
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct FakeGenerator {
        reply: Result<String, PipelineError>,
        configured: bool,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        fn new(reply: Result<String, PipelineError>, configured: bool) -> Self {
            Self {
                reply,
                configured,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        fn check_credentials(&self) -> extract::Result<()> {
            if self.configured {
                Ok(())
            } else {
                Err(PipelineError::missing_credential("GEMINI_API_KEY"))
            }
        }

        async fn generate(&self, prompt: &str) -> extract::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    struct FakeSearch {
        reply: Result<Vec<Place>, PipelineError>,
        configured: bool,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PlaceSearch for FakeSearch {
        fn check_credentials(&self) -> extract::Result<()> {
            if self.configured {
                Ok(())
            } else {
                Err(PipelineError::missing_credential("GOOGLE_PLACES_API_KEY"))
            }
        }

        async fn search(&self, query: &str) -> extract::Result<Vec<Place>> {
            self.queries.lock().unwrap().push(query.to_string());
            self.reply.clone()
        }
    }

    struct Harness {
        generator: Arc<FakeGenerator>,
        search: Arc<FakeSearch>,
        app: Router,
    }

    impl Harness {
        fn generator_calls(&self) -> usize {
            self.generator.calls.load(Ordering::SeqCst)
        }

        fn search_queries(&self) -> Vec<String> {
            self.search.queries.lock().unwrap().clone()
        }

        fn prompts(&self) -> Vec<String> {
            self.generator.prompts.lock().unwrap().clone()
        }
    }

    const TRIAGE_REPLY: &str = "```json\n{\"urgency\": \"HIGH\", \"possible_conditions\": [\"Myocardial infarction\"], \"recommended_specialist\": \"Cardiologist\", \"advice\": \"Go to the nearest emergency room.\", \"first_aid\": [\"Chew an aspirin\"], \"search_query\": \"Best Cardiologist\"}\n```";

    fn clinic() -> Place {
        Place {
            name: "Heart Care Clinic".to_string(),
            address: Some("Dhanmondi, Dhaka".to_string()),
            rating: Some(4.5),
            user_ratings_total: Some(120),
            place_id: Some("p1".to_string()),
            open_now: None,
            maps_url: Some("https://www.google.com/maps/place/?q=place_id:p1".to_string()),
        }
    }

    fn harness_with(
        reply: Result<String, PipelineError>,
        search_reply: Result<Vec<Place>, PipelineError>,
        policy: EnrichmentPolicy,
    ) -> Harness {
        let generator = Arc::new(FakeGenerator::new(reply, true));
        let search = Arc::new(FakeSearch {
            reply: search_reply,
            configured: true,
            queries: Mutex::new(Vec::new()),
        });
        Harness::build(generator, search, policy)
    }

    impl Harness {
        fn build(generator: Arc<FakeGenerator>, search: Arc<FakeSearch>, policy: EnrichmentPolicy) -> Self {
            let state = AppState {
                extractor: Extractor::new(generator.clone()),
                enricher: Enricher::new(search.clone(), enrich::DEFAULT_LOCATION.to_string(), policy),
                metrics: Metrics::new(),
            };
            Harness {
                generator,
                search,
                app: router(state),
            }
        }
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Origin", "http://localhost:5173")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn is_error_envelope(body: &Value) -> bool {
        let object = body.as_object().unwrap();
        object.contains_key("error") && object.keys().all(|k| k == "error" || k == "kind")
    }

    #[tokio::test]
    async fn test_triage_success_with_default_location() {
        let h = harness_with(Ok(TRIAGE_REPLY.to_string()), Ok(vec![clinic()]), EnrichmentPolicy::FailTogether);

        let response = h
            .app
            .clone()
            .oneshot(post(
                "/analyze-symptoms",
                json!({"symptoms": "sudden chest pain and shortness of breath"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        let body = body_json(response).await;
        assert_eq!(body["urgency"], "HIGH");
        assert_eq!(body["search_query"], "Best Cardiologist");
        assert_eq!(body["internet_doctors"][0]["name"], "Heart Care Clinic");
        assert!(body.get("error").is_none());
        assert_eq!(h.search_queries(), vec!["Best Cardiologist in Dhaka, Bangladesh".to_string()]);
    }

    #[tokio::test]
    async fn test_triage_uses_caller_location_and_empty_results() {
        let h = harness_with(Ok(TRIAGE_REPLY.to_string()), Ok(Vec::new()), EnrichmentPolicy::FailTogether);

        let response = h
            .app
            .clone()
            .oneshot(post(
                "/analyze-symptoms",
                json!({"symptoms": "chest pain", "location": "Sylhet", "language": "bn"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["internet_doctors"], json!([]));
        assert_eq!(h.search_queries(), vec!["Best Cardiologist in Sylhet".to_string()]);
    }

    #[tokio::test]
    async fn test_unparseable_output_is_a_failure_envelope() {
        let h = harness_with(
            Ok("The patient should see a cardiologist.".to_string()),
            Ok(Vec::new()),
            EnrichmentPolicy::FailTogether,
        );

        let response = h
            .app
            .clone()
            .oneshot(post("/analyze-symptoms", json!({"symptoms": "chest pain"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(is_error_envelope(&body));
        assert_eq!(body["kind"], "parse_error");
        assert!(h.search_queries().is_empty());
    }

    #[tokio::test]
    async fn test_enrichment_failure_fails_whole_response() {
        let h = harness_with(
            Ok(TRIAGE_REPLY.to_string()),
            Err(PipelineError::enrichment("Place search request failed: 500 Internal Server Error")),
            EnrichmentPolicy::FailTogether,
        );

        let response = h
            .app
            .clone()
            .oneshot(post("/analyze-symptoms", json!({"symptoms": "chest pain"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(is_error_envelope(&body));
        assert_eq!(body["error"], "Place search request failed: 500 Internal Server Error");

        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let metrics = body_json(h.app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(metrics["enrichment_calls"], 1);
        assert_eq!(metrics["failures_by_kind"]["enrichment_error"], 1);
    }

    #[tokio::test]
    async fn test_partial_policy_omits_enrichment() {
        let h = harness_with(
            Ok(TRIAGE_REPLY.to_string()),
            Err(PipelineError::enrichment("Place search request failed: 500")),
            EnrichmentPolicy::Partial,
        );

        let response = h
            .app
            .clone()
            .oneshot(post("/analyze-symptoms", json!({"symptoms": "chest pain"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["urgency"], "HIGH");
        assert!(body.get("internet_doctors").is_none());
    }

    #[tokio::test]
    async fn test_missing_generation_key_makes_no_calls() {
        let generator = Arc::new(FakeGenerator::new(Ok(TRIAGE_REPLY.to_string()), false));
        let search = Arc::new(FakeSearch {
            reply: Ok(Vec::new()),
            configured: true,
            queries: Mutex::new(Vec::new()),
        });
        let h = Harness::build(generator, search, EnrichmentPolicy::FailTogether);

        let response = h
            .app
            .clone()
            .oneshot(post("/analyze-symptoms", json!({"symptoms": "chest pain"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body, json!({"error": "Missing required secret: GEMINI_API_KEY", "kind": "configuration_error"}));
        assert_eq!(h.generator_calls(), 0);
        assert!(h.search_queries().is_empty());
    }

    #[tokio::test]
    async fn test_missing_search_key_is_checked_before_generation() {
        let generator = Arc::new(FakeGenerator::new(Ok(TRIAGE_REPLY.to_string()), true));
        let search = Arc::new(FakeSearch {
            reply: Ok(Vec::new()),
            configured: false,
            queries: Mutex::new(Vec::new()),
        });
        let h = Harness::build(generator, search, EnrichmentPolicy::FailTogether);

        let response = h
            .app
            .clone()
            .oneshot(post("/analyze-symptoms", json!({"symptoms": "chest pain"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Missing required secret: GOOGLE_PLACES_API_KEY");
        assert_eq!(h.generator_calls(), 0);
    }

    #[tokio::test]
    async fn test_preflight_short_circuits() {
        let h = harness_with(Ok(TRIAGE_REPLY.to_string()), Ok(Vec::new()), EnrichmentPolicy::FailTogether);

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/analyze-symptoms")
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "authorization, content-type")
            .body(Body::empty())
            .unwrap();
        let response = h.app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("access-control-allow-origin").unwrap(), "*");
        let allowed = response
            .headers()
            .get("access-control-allow-headers")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(allowed.contains("x-client-info"));
        assert!(allowed.contains("apikey"));
        assert_eq!(h.generator_calls(), 0);
        assert!(h.search_queries().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_an_error_envelope() {
        let h = harness_with(Ok(TRIAGE_REPLY.to_string()), Ok(Vec::new()), EnrichmentPolicy::FailTogether);

        let request = Request::builder()
            .method("POST")
            .uri("/analyze-symptoms")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = h.app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(is_error_envelope(&body));
        assert_eq!(body["kind"], "invalid_request");

        let response = h
            .app
            .clone()
            .oneshot(post("/analyze-symptoms", json!({"symptoms": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.generator_calls(), 0);
    }

    #[tokio::test]
    async fn test_blood_request_is_decoded_without_enrichment() {
        let h = harness_with(
            Ok("```json\n{\"blood_group\": \"o-\", \"units\": 2, \"hospital\": \"Square Hospital\", \"urgency\": \"HIGH\"}\n```".to_string()),
            Ok(vec![clinic()]),
            EnrichmentPolicy::FailTogether,
        );

        let response = h
            .app
            .clone()
            .oneshot(post(
                "/parse-blood-request",
                json!({"text": "Urgent! 2 bags O negative needed at Square Hospital"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["blood_group"], "O-");
        assert_eq!(body["units"], 2);
        assert!(body.get("internet_doctors").is_none());
        assert!(h.search_queries().is_empty());
    }

    #[tokio::test]
    async fn test_mistyped_triage_fields_are_echoed() {
        let h = harness_with(
            Ok("```json\n{\"urgency\": 3, \"possible_conditions\": \"Angina\", \"advice\": \"Rest\", \"search_query\": [\"Best\", \"Cardiologist\"], \"vitals\": {\"bp\": \"140/90\", \"pulse\": [88, 92]}}\n```".to_string()),
            Ok(vec![clinic()]),
            EnrichmentPolicy::FailTogether,
        );

        let response = h
            .app
            .clone()
            .oneshot(post("/analyze-symptoms", json!({"symptoms": "chest tightness"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["urgency"], 3);
        assert_eq!(body["possible_conditions"], "Angina");
        assert_eq!(body["search_query"], json!(["Best", "Cardiologist"]));
        assert_eq!(body["vitals"], json!({"bp": "140/90", "pulse": [88, 92]}));
        assert_eq!(body["internet_doctors"][0]["name"], "Heart Care Clinic");
        assert_eq!(h.search_queries(), vec!["Best Cardiologist in Dhaka, Bangladesh".to_string()]);
    }

    #[tokio::test]
    async fn test_numeric_search_query_still_searches() {
        let h = harness_with(
            Ok("{\"urgency\": \"LOW\", \"search_query\": 24}".to_string()),
            Ok(Vec::new()),
            EnrichmentPolicy::FailTogether,
        );

        let response = h
            .app
            .clone()
            .oneshot(post("/analyze-symptoms", json!({"symptoms": "mild fever", "location": "Khulna"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["search_query"], 24);
        assert_eq!(h.search_queries(), vec!["24 in Khulna".to_string()]);
    }

    #[tokio::test]
    async fn test_blood_request_with_numeric_contact_is_echoed() {
        let h = harness_with(
            Ok("{\"blood_group\": \"B+\", \"units\": \"2 bags\", \"contact\": 8801711000000, \"urgency\": 2}".to_string()),
            Ok(Vec::new()),
            EnrichmentPolicy::FailTogether,
        );

        let response = h
            .app
            .clone()
            .oneshot(post("/parse-blood-request", json!({"text": "B+ needed, call 8801711000000"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["blood_group"], "B+");
        assert_eq!(body["units"], "2 bags");
        assert_eq!(body["contact"], 8801711000000u64);
        assert_eq!(body["urgency"], 2);
    }

    #[tokio::test]
    async fn test_request_text_reaches_prompt_untrimmed() {
        let h = harness_with(Ok(TRIAGE_REPLY.to_string()), Ok(Vec::new()), EnrichmentPolicy::FailTogether);

        h.app
            .clone()
            .oneshot(post("/analyze-symptoms", json!({"symptoms": "  chest pain\n   radiating to left arm\n"})))
            .await
            .unwrap();
        h.app
            .clone()
            .oneshot(post("/parse-blood-request", json!({"text": "\tO- needed\n"})))
            .await
            .unwrap();

        let prompts = h.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("SYMPTOMS:\n  chest pain\n   radiating to left arm\n\n"));
        assert!(prompts[1].contains("REQUEST:\n\tO- needed\n\n"));
    }

    #[tokio::test]
    async fn test_history_is_forwarded_verbatim() {
        let h = harness_with(
            Ok("```json\n{\"summary\": \"Recurring migraines\", \"risk_level\": \"MEDIUM\"}\n```".to_string()),
            Ok(Vec::new()),
            EnrichmentPolicy::FailTogether,
        );

        let response = h
            .app
            .clone()
            .oneshot(post(
                "/summarize-history",
                json!({"history": [{"symptoms": "headache", "urgency": "LOW"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "application/json");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(
            bytes.as_ref(),
            b"{\"summary\": \"Recurring migraines\", \"risk_level\": \"MEDIUM\"}"
        );
    }

    #[tokio::test]
    async fn test_empty_history_is_rejected() {
        let h = harness_with(Ok("{}".to_string()), Ok(Vec::new()), EnrichmentPolicy::FailTogether);

        let response = h
            .app
            .clone()
            .oneshot(post("/summarize-history", json!({"history": []})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.generator_calls(), 0);
    }

    #[tokio::test]
    async fn test_metrics_count_outcomes() {
        let h = harness_with(Ok("nope".to_string()), Ok(Vec::new()), EnrichmentPolicy::FailTogether);

        h.app
            .clone()
            .oneshot(post("/parse-blood-request", json!({"text": "need blood"})))
            .await
            .unwrap();

        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let body = body_json(h.app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(body["total_requests"], 1);
        assert_eq!(body["requests_by_flow"]["blood_request"], 1);
        assert_eq!(body["failures_by_kind"]["parse_error"], 1);
    }
}
