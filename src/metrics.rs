// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for guard decisions.

use crate::guard::{Decision, DenyReason};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

/// Metric handles registered on a private registry.
#[derive(Clone)]
pub struct GuardMetrics {
    registry: Registry,
    decisions: IntCounterVec,
    penalties: IntCounter,
    resets: IntCounter,
    tracked_keys: IntGaugeVec,
}

impl GuardMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new("abuse_guard_decisions_total", "Guard decisions by outcome"),
            &["outcome"],
        )?;
        let penalties = IntCounter::new(
            "abuse_guard_penalties_total",
            "Backoff penalties applied",
        )?;
        let resets = IntCounter::new("abuse_guard_resets_total", "Administrative resets")?;
        let tracked_keys = IntGaugeVec::new(
            Opts::new("abuse_guard_tracked_keys", "Keys currently held in memory"),
            &["scope"],
        )?;

        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(penalties.clone()))?;
        registry.register(Box::new(resets.clone()))?;
        registry.register(Box::new(tracked_keys.clone()))?;

        Ok(Self {
            registry,
            decisions,
            penalties,
            resets,
            tracked_keys,
        })
    }

    pub fn record(&self, decision: &Decision) {
        let outcome = match decision {
            Decision::Allowed => "allowed",
            Decision::Denied { reason, .. } => match reason {
                DenyReason::Penalized => "penalized",
                DenyReason::RateExceeded => {
                    self.penalties.inc();
                    "rate_exceeded"
                }
                DenyReason::NetworkRateExceeded => "network_rate_exceeded",
            },
        };
        self.decisions.with_label_values(&[outcome]).inc();
    }

    pub fn record_reset(&self) {
        self.resets.inc();
    }

    pub fn set_tracked_keys(&self, identifiers: usize, network_identities: usize) {
        self.tracked_keys
            .with_label_values(&["identifier"])
            .set(identifiers as i64);
        self.tracked_keys
            .with_label_values(&["network"])
            .set(network_identities as i64);
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_record_and_render() {
        let metrics = GuardMetrics::new().unwrap();
        metrics.record(&Decision::Allowed);
        metrics.record(&Decision::Denied {
            reason: DenyReason::RateExceeded,
            retry_after: Duration::from_secs(2),
        });
        metrics.set_tracked_keys(3, 1);

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"abuse_guard_decisions_total{outcome="allowed"} 1"#));
        assert!(text.contains(r#"abuse_guard_decisions_total{outcome="rate_exceeded"} 1"#));
        assert!(text.contains("abuse_guard_penalties_total 1"));
        assert!(text.contains(r#"abuse_guard_tracked_keys{scope="identifier"} 3"#));
    }
}
