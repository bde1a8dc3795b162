use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryComplaintRepository, LoggingNotificationGateway, SeededDirectory,
};
use crate::routes::with_complaint_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use complaints::complaints::ComplaintService;
use complaints::config::AppConfig;
use complaints::error::AppError;
use complaints::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryComplaintRepository::default());
    let gateway = Arc::new(LoggingNotificationGateway);
    let directory = Arc::new(SeededDirectory::community());
    let complaint_service = Arc::new(ComplaintService::new(
        repository,
        gateway,
        directory,
        config.engine.clone(),
    ));

    let app = with_complaint_routes(complaint_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "complaint lifecycle service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
