use crate::cli::ServeArgs;
use crate::infra::{build_service, AppState};
use crate::routes::with_service_routes;
use crate::scheduler;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use feed_relay::config::AppConfig;
use feed_relay::error::AppError;
use feed_relay::telemetry::{self, LogSink};
use std::sync::atomic::Ordering;
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

    telemetry::init(&config.telemetry, LogSink::Stdout)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(build_service(&config));
    if !service.is_source_configured() {
        warn!("FEED_SOURCE_URL is not set, conversions will be rejected");
    }

    if config.schedule.auto_update {
        scheduler::spawn_daily(Arc::clone(&service), config.schedule.update_time);
        info!(at = %config.schedule.update_time, "daily conversion scheduled");
    }

    let app = with_service_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "feed relay ready");

    axum::serve(listener, app).await?;
    Ok(())
}
