use crate::error::Result;
use prometheus::{
    histogram_opts, opts, Counter, CounterVec, Encoder, Histogram, Registry, TextEncoder,
};
use std::time::Duration;
use tracing::debug;

/// Client-side metrics for faucet sessions
#[derive(Debug)]
pub struct ClientMetrics {
    registry: Registry,

    // Claim metrics
    pub claims_submitted_total: Counter,
    pub claims_confirmed_total: Counter,
    pub claims_reverted_total: CounterVec,
    pub claims_failed_total: Counter,
    pub claims_rejected_locally_total: Counter,
    pub claim_confirmation_time: Histogram,

    // Read metrics
    pub refreshes_total: Counter,
    pub read_errors_total: Counter,
}

impl ClientMetrics {
    /// Create new metrics instance with its own registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let claims_submitted_total = Counter::with_opts(opts!(
            "faucet_claims_submitted_total",
            "Total number of claim transactions submitted"
        ))?;

        let claims_confirmed_total = Counter::with_opts(opts!(
            "faucet_claims_confirmed_total",
            "Total number of claim transactions confirmed"
        ))?;

        let claims_reverted_total = CounterVec::new(
            opts!(
                "faucet_claims_reverted_total",
                "Total number of claims rejected by the contract"
            ),
            &["reason"],
        )?;

        let claims_failed_total = Counter::with_opts(opts!(
            "faucet_claims_failed_total",
            "Total number of claims that failed before confirmation"
        ))?;

        let claims_rejected_locally_total = Counter::with_opts(opts!(
            "faucet_claims_rejected_locally_total",
            "Claims refused client-side (in flight, ineligible, not connected)"
        ))?;

        let claim_confirmation_time = Histogram::with_opts(histogram_opts!(
            "faucet_claim_confirmation_duration_seconds",
            "Time from submission to confirmed receipt"
        ))?;

        let refreshes_total = Counter::with_opts(opts!(
            "faucet_refreshes_total",
            "Total number of state refreshes"
        ))?;

        let read_errors_total = Counter::with_opts(opts!(
            "faucet_read_errors_total",
            "Total number of failed contract reads"
        ))?;

        registry.register(Box::new(claims_submitted_total.clone()))?;
        registry.register(Box::new(claims_confirmed_total.clone()))?;
        registry.register(Box::new(claims_reverted_total.clone()))?;
        registry.register(Box::new(claims_failed_total.clone()))?;
        registry.register(Box::new(claims_rejected_locally_total.clone()))?;
        registry.register(Box::new(claim_confirmation_time.clone()))?;
        registry.register(Box::new(refreshes_total.clone()))?;
        registry.register(Box::new(read_errors_total.clone()))?;

        Ok(Self {
            registry,
            claims_submitted_total,
            claims_confirmed_total,
            claims_reverted_total,
            claims_failed_total,
            claims_rejected_locally_total,
            claim_confirmation_time,
            refreshes_total,
            read_errors_total,
        })
    }

    pub fn record_claim_submitted(&self) {
        self.claims_submitted_total.inc();
    }

    /// Record a confirmed claim and how long confirmation took
    pub fn record_claim_confirmed(&self, elapsed: Duration) {
        self.claims_confirmed_total.inc();
        self.claim_confirmation_time.observe(elapsed.as_secs_f64());
        debug!("Recorded confirmed claim in {:?}", elapsed);
    }

    pub fn record_claim_reverted(&self, reason: &str) {
        self.claims_reverted_total.with_label_values(&[reason]).inc();
    }

    pub fn record_claim_failed(&self) {
        self.claims_failed_total.inc();
    }

    pub fn record_claim_rejected_locally(&self) {
        self.claims_rejected_locally_total.inc();
    }

    pub fn record_refresh(&self, success: bool) {
        self.refreshes_total.inc();
        if !success {
            self.read_errors_total.inc();
        }
    }

    /// Render all metrics in the Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::error::CommonError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_render() -> Result<()> {
        let metrics = ClientMetrics::new()?;
        metrics.record_claim_submitted();
        metrics.record_claim_confirmed(Duration::from_millis(250));
        metrics.record_claim_reverted("cooldown active");
        metrics.record_refresh(false);

        let text = metrics.gather()?;
        assert!(text.contains("faucet_claims_submitted_total 1"));
        assert!(text.contains("faucet_claims_confirmed_total 1"));
        assert!(text.contains("faucet_claims_reverted_total{reason=\"cooldown active\"} 1"));
        assert!(text.contains("faucet_read_errors_total 1"));
        Ok(())
    }

    #[test]
    fn test_independent_registries() -> Result<()> {
        // Each session owns its registry, so two instances never collide
        let a = ClientMetrics::new()?;
        let b = ClientMetrics::new()?;
        a.record_claim_failed();
        assert_eq!(a.claims_failed_total.get(), 1.0);
        assert_eq!(b.claims_failed_total.get(), 0.0);
        Ok(())
    }
}
