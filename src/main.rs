// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use crate::application::battery_service::BatteryService;
use crate::application::clock::Clock;
use crate::domain::charge::ChargeEstimator;
use crate::domain::health::HealthEstimator;
use crate::domain::metrics::MetricsCalculator;
use crate::infrastructure::config::{load_config, ServerSettings};
use crate::infrastructure::system_clock::SystemClock;
use crate::infrastructure::thingspeak_channel::ThingSpeakChannel;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    battery_metrics, calibrate, charge_state, health_check, set_mode,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_config()?;

    // Create channel (infrastructure layer)
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let channel = Arc::new(ThingSpeakChannel::new(config.channel.clone(), clock.clone())?);

    // Create service (application layer)
    let battery = &config.battery;
    let spec = battery.spec();
    let battery_service = BatteryService::new(
        channel,
        clock,
        ChargeEstimator::new(spec.rated_capacity_ah, battery.recharge_policy),
        HealthEstimator::new(spec, battery.health_model),
        MetricsCalculator::new(
            spec,
            battery.efficiency_factor,
            battery.average_speed_kmh,
            battery.runtime_mode,
        ),
    );

    let state = Arc::new(AppState { battery_service });
    let router = build_router(state, &config.server);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind_address))?;
    tracing::info!(
        address = %config.server.bind_address,
        health_model = ?battery.health_model,
        runtime_mode = ?battery.runtime_mode,
        recharge_policy = ?battery.recharge_policy,
        "Starting battery-monitor service"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_router(state: Arc<AppState>, server: &ServerSettings) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(health_check))
        .route("/api/battery", get(battery_metrics))
        .route("/api/battery/state", get(charge_state))
        .route("/api/battery/calibrate", post(calibrate))
        .route("/api/mode", post(set_mode))
        .with_state(state);

    // Dashboard assets
    if let Some(dir) = &server.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutting down");
}
