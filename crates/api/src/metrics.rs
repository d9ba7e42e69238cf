use extract::PipelineError;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Requests per route
    triage_requests: AtomicUsize,
    blood_requests: AtomicUsize,
    history_requests: AtomicUsize,

    // Failures by kind
    invalid_request_errors: AtomicUsize,
    configuration_errors: AtomicUsize,
    generation_errors: AtomicUsize,
    parse_errors: AtomicUsize,
    enrichment_errors: AtomicUsize,

    // Timing (in microseconds)
    total_generation_time_us: AtomicU64,
    generation_calls: AtomicUsize,
    total_enrichment_time_us: AtomicU64,
    enrichment_calls: AtomicUsize,
}

#[derive(Debug, Clone, Copy)]
pub enum Flow {
    Triage,
    BloodRequest,
    History,
}

impl Flow {
    pub fn name(&self) -> &'static str {
        match self {
            Flow::Triage => "triage",
            Flow::BloodRequest => "blood_request",
            Flow::History => "history",
        }
    }
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, flow: Flow) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let counter = match flow {
            Flow::Triage => &self.triage_requests,
            Flow::BloodRequest => &self.blood_requests,
            Flow::History => &self.history_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, error: &PipelineError) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        let counter = match error {
            PipelineError::InvalidRequest(_) => &self.invalid_request_errors,
            PipelineError::Configuration(_) => &self.configuration_errors,
            PipelineError::Generation { .. } => &self.generation_errors,
            PipelineError::Parse(_) => &self.parse_errors,
            PipelineError::Enrichment { .. } => &self.enrichment_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_generation(&self, duration: Duration) {
        self.total_generation_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.generation_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enrichment(&self, duration: Duration) {
        self.total_enrichment_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.enrichment_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            requests_by_flow: RequestsByFlow {
                triage: self.triage_requests.load(Ordering::Relaxed),
                blood_request: self.blood_requests.load(Ordering::Relaxed),
                history: self.history_requests.load(Ordering::Relaxed),
            },
            failures_by_kind: FailuresByKind {
                invalid_request: self.invalid_request_errors.load(Ordering::Relaxed),
                configuration_error: self.configuration_errors.load(Ordering::Relaxed),
                generation_error: self.generation_errors.load(Ordering::Relaxed),
                parse_error: self.parse_errors.load(Ordering::Relaxed),
                enrichment_error: self.enrichment_errors.load(Ordering::Relaxed),
            },
            avg_generation_time_ms: avg_time_ms(&self.total_generation_time_us, &self.generation_calls),
            avg_enrichment_time_ms: avg_time_ms(&self.total_enrichment_time_us, &self.enrichment_calls),
            enrichment_calls: self.enrichment_calls.load(Ordering::Relaxed),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    let cnt = count.load(Ordering::Relaxed) as f64;
    if cnt > 0.0 {
        total / cnt / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub requests_by_flow: RequestsByFlow,
    pub failures_by_kind: FailuresByKind,
    pub avg_generation_time_ms: f64,
    pub avg_enrichment_time_ms: f64,
    pub enrichment_calls: usize,
}

#[derive(Debug, Serialize)]
pub struct RequestsByFlow {
    pub triage: usize,
    pub blood_request: usize,
    pub history: usize,
}

#[derive(Debug, Serialize)]
pub struct FailuresByKind {
    pub invalid_request: usize,
    pub configuration_error: usize,
    pub generation_error: usize,
    pub parse_error: usize,
    pub enrichment_error: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
