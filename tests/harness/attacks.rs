// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Attack simulation patterns for security testing.

use std::time::Duration;

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of requests to send
    pub total_requests: usize,
    /// Requests per second rate
    pub requests_per_second: f64,
    /// Number of unique network identities to simulate
    pub unique_identities: usize,
    /// Number of unique form sessions
    pub unique_sessions: usize,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            requests_per_second: 10.0,
            unique_identities: 1,
            unique_sessions: 1,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// One client hammering one form.
    pub fn single_identity_flood() -> Self {
        Self {
            total_requests: 200,
            requests_per_second: 100.0,
            ..Default::default()
        }
    }

    /// One client rotating sessions to dodge the per-session limit.
    pub fn session_rotation() -> Self {
        Self {
            total_requests: 200,
            requests_per_second: 20.0,
            unique_identities: 1,
            unique_sessions: 200,
        }
    }

    /// Many clients, each well under its own limit.
    pub fn distributed_attack() -> Self {
        Self {
            total_requests: 500,
            requests_per_second: 50.0,
            unique_identities: 100,
            unique_sessions: 100,
        }
    }

    /// A single visitor submitting slower than the window allows them to.
    pub fn slow_drip() -> Self {
        Self {
            total_requests: 30,
            requests_per_second: 0.04, // one every 25 seconds
            ..Default::default()
        }
    }

    /// Simulated time between consecutive requests.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second)
    }
}
