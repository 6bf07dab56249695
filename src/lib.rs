// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Abuse Guard
//!
//! In-memory abuse prevention for form submissions and conversion tracking:
//!
//! - Per-identifier sliding-window rate limiting (5 per minute default)
//! - Exponential backoff for identifiers that hit their limit (capped at 5 minutes)
//! - Independent per-network-identity limiting (10 per minute default)
//! - Periodic sweep of idle keys
//!
//! State lives only as long as the process; nothing is persisted or shared
//! between instances.

pub mod clock;
pub mod config;
pub mod guard;
pub mod handlers;
pub mod limits;
pub mod metrics;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::Config;
pub use guard::{AbuseGuard, Decision, DenyReason, GuardError, Limit, Verdict};
