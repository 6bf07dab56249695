// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding-window abuse guard with exponential backoff.
//!
//! Two independent keying strategies share one algorithm:
//! 1. Logical identifiers (`"contact-form"`, `"phone-click:<session>"`),
//!    which escalate to a backoff penalty when they hit their limit.
//! 2. Network identities (caller IP or similar), which are only counted.
//!
//! Every mutating call holds a write lock for its whole
//! filter-then-append sequence, so concurrent callers for the same key
//! observe the same ordering a single-threaded caller would.

use crate::clock::{Clock, SystemClock};
use crate::config::GuardConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Caller contract violations, rejected before any state is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("max_attempts must be positive")]
    InvalidMaxAttempts,

    #[error("window must be positive")]
    InvalidWindow,

    #[error("identifier must not be empty")]
    EmptyIdentifier,
}

/// A maximum number of attempts within a rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    max_attempts: u32,
    window: Duration,
}

impl Limit {
    /// Create a limit, rejecting zero attempts or a zero window.
    pub fn new(max_attempts: u32, window: Duration) -> Result<Self, GuardError> {
        if max_attempts == 0 {
            return Err(GuardError::InvalidMaxAttempts);
        }
        if window.is_zero() {
            return Err(GuardError::InvalidWindow);
        }
        Ok(Self {
            max_attempts,
            window,
        })
    }

    /// Create a limit with the window given in milliseconds.
    pub fn from_millis(max_attempts: u32, window_ms: u64) -> Result<Self, GuardError> {
        Self::new(max_attempts, Duration::from_millis(window_ms))
    }

    /// Both arguments must be non-zero.
    pub(crate) const fn preset(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }

    /// Default network identity limit: 10 per minute.
    pub const fn network() -> Self {
        Self::preset(10, Duration::from_secs(60))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for Limit {
    /// 5 attempts per minute.
    fn default() -> Self {
        Self::preset(5, Duration::from_secs(60))
    }
}

/// Outcome of a single identifier check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The attempt was recorded
    Allowed,
    /// A penalty from an earlier violation is still running
    Penalized {
        /// Time left on the penalty
        retry_after: Duration,
    },
    /// This call hit the limit and started a new penalty
    RateExceeded {
        /// Length of the new penalty
        retry_after: Duration,
    },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

/// Reason a combined check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Identifier is serving a backoff penalty
    Penalized,
    /// Identifier exceeded its limit on this call
    RateExceeded,
    /// Network identity exceeded its limit
    NetworkRateExceeded,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Penalized => write!(f, "Too many attempts, backoff in effect"),
            Self::RateExceeded => write!(f, "Rate limit exceeded"),
            Self::NetworkRateExceeded => write!(f, "Network rate limit exceeded"),
        }
    }
}

/// Outcome of [`AbuseGuard::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied {
        reason: DenyReason,
        /// Penalty time left for identifier denials; time until the oldest
        /// counted attempt leaves the window for network denials.
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

impl From<Verdict> for Decision {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Allowed => Decision::Allowed,
            Verdict::Penalized { retry_after } => Decision::Denied {
                reason: DenyReason::Penalized,
                retry_after,
            },
            Verdict::RateExceeded { retry_after } => Decision::Denied {
                reason: DenyReason::RateExceeded,
                retry_after,
            },
        }
    }
}

/// Exponential penalty schedule: `base * 2^excess`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Penalty for `excess` attempts over the limit.
    pub fn penalty(&self, excess: u32) -> Duration {
        2u32.checked_pow(excess)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |d| d.min(self.max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(300))
    }
}

/// Recorded attempts for one key.
#[derive(Debug, Default)]
struct AttemptLog {
    times: Vec<Instant>,
    /// Widest window this key has been evaluated against
    widest_window: Duration,
}

impl AttemptLog {
    /// Keep only attempts strictly newer than `now - window`.
    fn retain_recent(&mut self, now: Instant, window: Duration) {
        self.widest_window = self.widest_window.max(window);
        self.times.retain(|&t| now.duration_since(t) < window);
    }

    fn len(&self) -> usize {
        self.times.len()
    }

    fn push(&mut self, now: Instant) {
        self.times.push(now);
    }

    fn window_remaining(&self, now: Instant, window: Duration) -> Duration {
        self.times
            .iter()
            .min()
            .map_or(Duration::ZERO, |&oldest| {
                window.saturating_sub(now.duration_since(oldest))
            })
    }

    /// Idle once the newest attempt is older than both the TTL and every
    /// window the key was checked with.
    fn is_idle(&self, now: Instant, idle_ttl: Duration) -> bool {
        let horizon = idle_ttl.max(self.widest_window);
        self.times
            .iter()
            .max()
            .map_or(true, |&newest| now.duration_since(newest) >= horizon)
    }
}

/// Identifier attempts and penalties, guarded together.
#[derive(Debug, Default)]
struct IdentifierState {
    attempts: HashMap<String, AttemptLog>,
    /// Absolute penalty expiry per identifier
    penalties: HashMap<String, Instant>,
}

/// Thread-safe abuse guard.
pub struct AbuseGuard {
    clock: Arc<dyn Clock>,
    backoff: Backoff,
    idle_ttl: Duration,
    identifiers: RwLock<IdentifierState>,
    network: RwLock<HashMap<String, AttemptLog>>,
}

impl AbuseGuard {
    /// Create a guard on the system clock.
    pub fn new(config: &GuardConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a guard reading time from `clock`.
    pub fn with_clock(config: &GuardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            backoff: Backoff::new(config.backoff_base(), config.backoff_max()),
            idle_ttl: config.idle_ttl(),
            identifiers: RwLock::new(IdentifierState::default()),
            network: RwLock::new(HashMap::new()),
        }
    }

    /// Check and record an attempt for `identifier`.
    pub async fn allow(&self, identifier: &str, limit: Limit) -> bool {
        self.decide(identifier, limit).await.is_allowed()
    }

    /// Check and record an attempt for `identifier`, reporting why a
    /// denial happened.
    pub async fn decide(&self, identifier: &str, limit: Limit) -> Verdict {
        let mut guard = self.identifiers.write().await;
        let state = &mut *guard;
        // Read under the lock so each log stays in insertion order
        let now = self.clock.now();

        if let Some(&until) = state.penalties.get(identifier) {
            if now < until {
                let retry_after = until - now;
                debug!(identifier, ?retry_after, "Identifier penalized");
                return Verdict::Penalized { retry_after };
            }
        }

        let attempts = state.attempts.entry(identifier.to_owned()).or_default();
        attempts.retain_recent(now, limit.window);

        let count = u32::try_from(attempts.len()).unwrap_or(u32::MAX);
        if count >= limit.max_attempts {
            let excess = count - limit.max_attempts + 1;
            let penalty = self.backoff.penalty(excess);
            state.penalties.insert(identifier.to_owned(), now + penalty);
            warn!(identifier, count, excess, ?penalty, "Limit reached, applying backoff");
            return Verdict::RateExceeded {
                retry_after: penalty,
            };
        }

        attempts.push(now);
        debug!(identifier, count = count + 1, "Attempt allowed");
        Verdict::Allowed
    }

    /// Check and record an attempt for a network identity. Never penalizes.
    pub async fn allow_network_identity(&self, identity: &str, limit: Limit) -> bool {
        self.network_verdict(identity, limit).await.is_none()
    }

    /// `None` when allowed, otherwise time until the oldest counted attempt
    /// ages out of the window.
    async fn network_verdict(&self, identity: &str, limit: Limit) -> Option<Duration> {
        let mut network = self.network.write().await;
        let now = self.clock.now();
        let attempts = network.entry(identity.to_owned()).or_default();
        attempts.retain_recent(now, limit.window);

        if attempts.len() >= limit.max_attempts as usize {
            let retry_after = attempts.window_remaining(now, limit.window);
            debug!(identity, ?retry_after, "Network identity rate limit exceeded");
            return Some(retry_after);
        }

        attempts.push(now);
        None
    }

    /// Check the network identity (when known), then the identifier.
    ///
    /// A network denial does not consume an identifier attempt.
    pub async fn check(
        &self,
        identifier: &str,
        network_identity: Option<&str>,
        limit: Limit,
        network_limit: Limit,
    ) -> Decision {
        if let Some(identity) = network_identity {
            if let Some(retry_after) = self.network_verdict(identity, network_limit).await {
                return Decision::Denied {
                    reason: DenyReason::NetworkRateExceeded,
                    retry_after,
                };
            }
        }

        self.decide(identifier, limit).await.into()
    }

    /// Time until the oldest recorded attempt for `identifier` leaves a
    /// window of `window`. Zero when nothing is recorded.
    pub async fn remaining_window_time(&self, identifier: &str, window: Duration) -> Duration {
        let now = self.clock.now();
        let state = self.identifiers.read().await;
        state
            .attempts
            .get(identifier)
            .map_or(Duration::ZERO, |attempts| attempts.window_remaining(now, window))
    }

    /// Network identity counterpart of [`remaining_window_time`](Self::remaining_window_time).
    pub async fn remaining_network_window_time(
        &self,
        identity: &str,
        window: Duration,
    ) -> Duration {
        let now = self.clock.now();
        let network = self.network.read().await;
        network
            .get(identity)
            .map_or(Duration::ZERO, |attempts| attempts.window_remaining(now, window))
    }

    /// Time left on the identifier's penalty, zero if none is active.
    pub async fn backoff_remaining(&self, identifier: &str) -> Duration {
        let now = self.clock.now();
        let state = self.identifiers.read().await;
        state
            .penalties
            .get(identifier)
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(now))
    }

    pub async fn is_penalized(&self, identifier: &str) -> bool {
        !self.backoff_remaining(identifier).await.is_zero()
    }

    /// Forget all attempts and any penalty for `identifier`.
    pub async fn reset(&self, identifier: &str) {
        let mut state = self.identifiers.write().await;
        let had_attempts = state.attempts.remove(identifier).is_some();
        let had_penalty = state.penalties.remove(identifier).is_some();
        info!(identifier, had_attempts, had_penalty, "Identifier reset");
    }

    /// Forget all attempts for a network identity.
    pub async fn reset_network_identity(&self, identity: &str) {
        let mut network = self.network.write().await;
        let had_attempts = network.remove(identity).is_some();
        info!(identity, had_attempts, "Network identity reset");
    }

    /// Drop keys idle for longer than the configured TTL, along with
    /// expired penalties. Returns the number of map entries removed.
    ///
    /// A key is idle once its newest attempt is older than both the TTL and
    /// the widest window it was ever checked with, so no later check with
    /// those windows could count what the sweep drops.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let idle_ttl = self.idle_ttl;
        let mut removed = 0;

        {
            let mut guard = self.identifiers.write().await;
            let state = &mut *guard;
            let penalties = &state.penalties;

            let before = state.attempts.len();
            state.attempts.retain(|id, attempts| {
                !attempts.is_idle(now, idle_ttl)
                    || penalties.get(id).is_some_and(|&until| now < until)
            });
            removed += before - state.attempts.len();

            let before = state.penalties.len();
            state.penalties.retain(|_, until| now < *until);
            removed += before - state.penalties.len();
        }

        {
            let mut network = self.network.write().await;
            let before = network.len();
            network.retain(|_, attempts| !attempts.is_idle(now, idle_ttl));
            removed += before - network.len();
        }

        if removed > 0 {
            info!(removed, "Swept idle abuse guard entries");
        }
        removed
    }

    /// Number of tracked `(identifiers, network identities)`.
    pub async fn tracked_keys(&self) -> (usize, usize) {
        let identifiers = self.identifiers.read().await.attempts.len();
        let network = self.network.read().await.len();
        (identifiers, network)
    }
}

impl Default for AbuseGuard {
    fn default() -> Self {
        Self::new(&GuardConfig::default())
    }
}
