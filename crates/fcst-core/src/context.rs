//! Execution Context: per-invocation state threaded through the pipeline
use crate::data_model::RunIdentity;
use chrono::{DateTime, Utc};

/// Scoped to one external call. Nothing in here survives the invocation.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub trace_id: String,
    pub action: &'static str,
    pub run: Option<RunIdentity>,
    pub started_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(action: &'static str) -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            action,
            run: None,
            started_at: Utc::now(),
        }
    }

    pub fn with_run(mut self, run: RunIdentity) -> Self {
        self.run = Some(run);
        self
    }

    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}
