//! Prometheus registry behind `/metrics`.
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static ACTIONS: OnceCell<IntCounterVec> = OnceCell::new();

/// Outcome label for an action that returned a message.
pub const OUTCOME_OK: &str = "ok";
/// Outcome label for a failure a later poll may clear.
pub const OUTCOME_RETRYABLE: &str = "retryable";
pub const OUTCOME_FAILED: &str = "failed";
/// Outcome label for a decoded action whose input the pipeline refused.
pub const OUTCOME_INVALID: &str = "invalid";
/// Outcome label for an envelope that never reached the pipeline.
pub const OUTCOME_REJECTED: &str = "rejected";

/// `fcst_actions_total{action,outcome}`, registered on first use.
pub fn actions() -> Result<&'static IntCounterVec, prometheus::Error> {
    ACTIONS.get_or_try_init(|| {
        let counter = IntCounterVec::new(
            Opts::new("fcst_actions_total", "Pipeline actions handled, by outcome"),
            &["action", "outcome"],
        )?;
        REGISTRY.register(Box::new(counter.clone()))?;
        Ok(counter)
    })
}

pub fn record(action: &str, outcome: &str) {
    match actions() {
        Ok(counter) => counter.with_label_values(&[action, outcome]).inc(),
        Err(e) => tracing::warn!(error = %e, "action counter unavailable"),
    }
}

pub fn encode() -> Result<String, prometheus::Error> {
    actions()?;
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_shows_up_in_exposition() {
        record("checkforecast", OUTCOME_RETRYABLE);
        let text = encode().unwrap();
        assert!(text.contains("fcst_actions_total"));
        assert!(text.contains(r#"action="checkforecast""#));
        assert!(text.contains(r#"outcome="retryable""#));
    }
}
