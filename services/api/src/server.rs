use crate::cli::ServeArgs;
use crate::infra::{
    lifecycle_policy, AllowlistRoleProvider, AppState, InMemoryApplicationRepository,
    InMemoryAuditTrail, LoggingNotificationGateway,
};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use judgedesk::config::AppConfig;
use judgedesk::error::AppError;
use judgedesk::telemetry;
use judgedesk::workflows::applicants::{AdminGateway, ApplicationLifecycle};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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

    let repository = Arc::new(InMemoryApplicationRepository::default());
    let audit = Arc::new(InMemoryAuditTrail::default());
    let notifications = Arc::new(LoggingNotificationGateway);
    let lifecycle = Arc::new(ApplicationLifecycle::new(
        repository,
        audit,
        notifications,
        lifecycle_policy(&config.lifecycle),
    ));
    let roles = Arc::new(AllowlistRoleProvider::new(
        config.lifecycle.admin_actors.clone(),
    ));
    let admin = Arc::new(AdminGateway::new(lifecycle.clone(), roles));

    let app = with_application_routes(lifecycle, admin)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "applicant lifecycle service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
