// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the abuse guard service.
//!
//! Form front ends call `/check` before accepting a submission and may call
//! `/status/:identifier` to show the visitor how long to wait.

use crate::config::Config;
use crate::guard::{AbuseGuard, Decision, GuardError, Limit};
use crate::metrics::GuardMetrics;
use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Shared application state.
pub struct AppState {
    pub guard: AbuseGuard,
    pub metrics: GuardMetrics,
    pub config: Config,
    limit: Limit,
    network_limit: Limit,
}

impl AppState {
    /// Validate the configured default limits and assemble the state.
    pub fn new(
        config: Config,
        guard: AbuseGuard,
        metrics: GuardMetrics,
    ) -> Result<Self, GuardError> {
        let limit = config.guard.default_limit()?;
        let network_limit = config.guard.network_limit()?;
        Ok(Self {
            guard,
            metrics,
            config,
            limit,
            network_limit,
        })
    }

    /// Refresh the tracked-keys gauge.
    pub async fn refresh_gauges(&self) {
        let (identifiers, network) = self.guard.tracked_keys().await;
        self.metrics.set_tracked_keys(identifiers, network);
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Guard check request.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub identifier: String,
    #[serde(default)]
    pub network_identity: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub window_ms: Option<u64>,
}

/// Guard check response.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

/// Query parameters for `/status/:identifier`.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub window_ms: Option<u64>,
    /// Also report the window for this network identity
    #[serde(default)]
    pub network_identity: Option<String>,
}

/// Current standing of one identifier.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub identifier: String,
    pub penalized: bool,
    pub backoff_remaining_ms: u64,
    pub remaining_window_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_remaining_window_ms: Option<u64>,
}

/// Reset request; at least one key must be present.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub network_identity: Option<String>,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/check", post(check))
        .route("/status/:identifier", get(status))
        .route("/reset", post(reset));

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(metrics));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn bad_request(err: GuardError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: err.to_string(),
            code: "INVALID_REQUEST",
        }),
    )
        .into_response()
}

/// Keys are compared after trimming; blank keys count as absent.
fn key(raw: &str) -> Option<&str> {
    Some(raw.trim()).filter(|s| !s.is_empty())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "abuse-guard",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Check and record an attempt.
///
/// Denials are reported with 200 so callers can always read the body.
pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> Response {
    debug!(
        identifier = %req.identifier,
        network_identity = ?req.network_identity,
        "Processing guard check"
    );

    let Some(identifier) = key(&req.identifier) else {
        return bad_request(GuardError::EmptyIdentifier);
    };

    let limit = match (req.max_attempts, req.window_ms) {
        (None, None) => state.limit,
        (max_attempts, window_ms) => {
            let max_attempts = max_attempts.unwrap_or(state.limit.max_attempts());
            let window = window_ms.map_or(state.limit.window(), Duration::from_millis);
            match Limit::new(max_attempts, window) {
                Ok(limit) => limit,
                Err(err) => return bad_request(err),
            }
        }
    };

    let network_identity = req.network_identity.as_deref().and_then(key);

    let decision = state
        .guard
        .check(identifier, network_identity, limit, state.network_limit)
        .await;
    state.metrics.record(&decision);

    let body = match decision {
        Decision::Allowed => CheckResponse {
            allowed: true,
            reason: None,
            retry_after_ms: None,
        },
        Decision::Denied {
            reason,
            retry_after,
        } => {
            info!(
                identifier,
                reason = %reason,
                retry_after_ms = millis(retry_after),
                "Request denied"
            );
            CheckResponse {
                allowed: false,
                reason: Some(reason.to_string()),
                retry_after_ms: Some(millis(retry_after)),
            }
        }
    };

    (StatusCode::OK, Json(body)).into_response()
}

/// Report penalty and window state without recording an attempt.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let Some(identifier) = key(&identifier) else {
        return bad_request(GuardError::EmptyIdentifier);
    };

    let window = match query.window_ms {
        Some(ms) => match Limit::from_millis(1, ms) {
            Ok(limit) => limit.window(),
            Err(err) => return bad_request(err),
        },
        None => state.limit.window(),
    };

    let backoff = state.guard.backoff_remaining(identifier).await;
    let remaining = state.guard.remaining_window_time(identifier, window).await;

    let network_remaining = match query.network_identity.as_deref().and_then(key) {
        Some(identity) => Some(
            state
                .guard
                .remaining_network_window_time(identity, state.network_limit.window())
                .await,
        ),
        None => None,
    };

    Json(StatusResponse {
        identifier: identifier.to_owned(),
        penalized: !backoff.is_zero(),
        backoff_remaining_ms: millis(backoff),
        remaining_window_ms: millis(remaining),
        network_remaining_window_ms: network_remaining.map(millis),
    })
    .into_response()
}

/// Administrative reset of an identifier and/or a network identity.
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetRequest>,
) -> Response {
    let identifier = req.identifier.as_deref().and_then(key);
    let identity = req.network_identity.as_deref().and_then(key);

    if identifier.is_none() && identity.is_none() {
        return bad_request(GuardError::EmptyIdentifier);
    }

    if let Some(id) = identifier {
        state.guard.reset(id).await;
        state.metrics.record_reset();
    }
    if let Some(identity) = identity {
        state.guard.reset_network_identity(identity).await;
        state.metrics.record_reset();
    }

    StatusCode::NO_CONTENT.into_response()
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state.refresh_gauges().await;
    match state.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
