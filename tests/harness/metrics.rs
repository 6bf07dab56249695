// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Metrics collection for attack simulation results.

use abuse_guard::{Decision, DenyReason};
use std::collections::{HashMap, HashSet};

/// Possible outcomes for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Allowed,
    RateExceeded,
    Penalized,
    NetworkRateExceeded,
}

impl From<&Decision> for Outcome {
    fn from(decision: &Decision) -> Self {
        match decision {
            Decision::Allowed => Outcome::Allowed,
            Decision::Denied { reason, .. } => match reason {
                DenyReason::RateExceeded => Outcome::RateExceeded,
                DenyReason::Penalized => Outcome::Penalized,
                DenyReason::NetworkRateExceeded => Outcome::NetworkRateExceeded,
            },
        }
    }
}

/// Collects outcomes during attack simulation.
#[derive(Debug, Default)]
pub struct AttackMetrics {
    outcomes: HashMap<Outcome, usize>,
    identities: HashSet<String>,
}

impl AttackMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request outcome.
    pub fn record(&mut self, decision: &Decision, identity: &str) {
        *self.outcomes.entry(decision.into()).or_insert(0) += 1;
        self.identities.insert(identity.to_string());
    }

    pub fn total_requests(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Ratio of blocked to total.
    pub fn block_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        (total - self.count(Outcome::Allowed)) as f64 / total as f64
    }

    pub fn unique_identities(&self) -> usize {
        self.identities.len()
    }
}

impl std::fmt::Display for AttackMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Attack Metrics Report ===")?;
        writeln!(f, "Total Requests:    {}", self.total_requests())?;
        writeln!(f, "Allowed:           {}", self.count(Outcome::Allowed))?;
        writeln!(f, "Rate Exceeded:     {}", self.count(Outcome::RateExceeded))?;
        writeln!(f, "Penalized:         {}", self.count(Outcome::Penalized))?;
        writeln!(f, "Network Limited:   {}", self.count(Outcome::NetworkRateExceeded))?;
        writeln!(f, "Block Rate:        {:.1}%", self.block_rate() * 100.0)?;
        writeln!(f, "Unique Identities: {}", self.unique_identities())
    }
}
