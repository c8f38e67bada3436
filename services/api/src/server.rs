use crate::cli::ServeArgs;
use crate::infra::{build_market_service, AppState};
use crate::routes::with_allocation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use stall_market::config::{AppConfig, AppEnvironment};
use stall_market::error::AppError;
use stall_market::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(stalls) = args.stalls.take() {
        config.stall_seed = Some(stalls);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let use_sample = config.environment == AppEnvironment::Development;
    let (service, stalls) = build_market_service(
        config.ledger.clone(),
        config.stall_seed.as_deref(),
        use_sample,
    )?;
    if stalls.is_empty() {
        warn!("no stall catalogue loaded; applications will be refused until stalls exist");
    } else {
        info!(
            stalls = stalls.len(),
            seed = ?config.stall_seed,
            "stall catalogue registered"
        );
    }

    let app = with_allocation_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "stall market service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
