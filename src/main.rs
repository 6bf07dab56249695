// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Abuse Guard Service
//!
//! Rate limits form submissions and tracking events for the site's front
//! ends. Callers POST to `/check` before accepting a submission and treat a
//! denial as "retry later".
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `MAX_ATTEMPTS` / `WINDOW_MS`: Default identifier limit (default: 5 per 60000 ms)
//! - `NETWORK_MAX_ATTEMPTS` / `NETWORK_WINDOW_MS`: Network identity limit (default: 10 per 60000 ms)
//! - `BACKOFF_BASE_MS` / `BACKOFF_MAX_MS`: Penalty schedule (default: 1000 / 300000)
//! - `IDLE_TTL_MS`: Idle key lifetime before sweeping (default: 300000)
//! - `SWEEP_INTERVAL_SECS`: Sweep period, 0 disables (default: 60)
//! - `METRICS_ENABLED`: Serve Prometheus metrics (default: true)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use abuse_guard::{
    config::Config,
    guard::AbuseGuard,
    handlers::{router, AppState},
    metrics::GuardMetrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        max_attempts = config.guard.max_attempts,
        window_ms = config.guard.window_ms,
        network_max_attempts = config.guard.network_max_attempts,
        backoff_max_ms = config.guard.backoff_max_ms,
        "Starting abuse guard"
    );

    let guard = AbuseGuard::new(&config.guard);
    let metrics = GuardMetrics::new()?;
    let state = Arc::new(AppState::new(config.clone(), guard, metrics)?);

    // Spawn sweep task
    if let Some(period) = config.guard.sweep_interval() {
        let sweep_state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                sweep_state.guard.sweep().await;
                sweep_state.refresh_gauges().await;
            }
        });
    }

    let app = router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
