use std::fmt;

use tracing::{debug, warn};

use crate::error::PipelineError;

/// Steps a single request moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    Prompted,
    Generated,
    Sanitized,
    Enriched,
    Composed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Prompted => "prompted",
            Stage::Generated => "generated",
            Stage::Sanitized => "sanitized",
            Stage::Enriched => "enriched",
            Stage::Composed => "composed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Forward-only position of one request in the pipeline.
#[derive(Debug)]
pub struct StageTracker {
    flow: &'static str,
    current: Stage,
    failed_at: Option<Stage>,
}

impl StageTracker {
    pub fn new(flow: &'static str) -> Self {
        Self {
            flow,
            current: Stage::Received,
            failed_at: None,
        }
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    /// Stage that was active when the request failed, if it did.
    pub fn failed_at(&self) -> Option<Stage> {
        self.failed_at
    }

    /// Move to `next`. Moves backwards or out of `Failed` are ignored.
    pub fn advance(&mut self, next: Stage) {
        if self.current == Stage::Failed || next <= self.current {
            return;
        }
        debug!(flow = self.flow, from = %self.current, to = %next, "Pipeline stage");
        self.current = next;
    }

    pub fn fail(&mut self, error: &PipelineError) {
        if self.current == Stage::Failed {
            return;
        }
        warn!(
            flow = self.flow,
            stage = %self.current,
            kind = error.kind(),
            error = %error,
            "Pipeline failed"
        );
        self.failed_at = Some(self.current);
        self.current = Stage::Failed;
    }
}
