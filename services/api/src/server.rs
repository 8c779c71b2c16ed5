use crate::cli::ServeArgs;
use crate::infra::{AlertServices, AppState};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use ivi_alerts::clock::{Clock, SystemClock};
use ivi_alerts::config::AppConfig;
use ivi_alerts::error::AppError;
use ivi_alerts::scheduler::spawn_driver;
use ivi_alerts::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

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

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let services = AlertServices::in_memory(&config.alerts, clock.clone());
    if let Err(err) = services.scheduler.initialize() {
        error!(error = %err, "scheduler state could not be initialized");
    }
    let driver = spawn_driver(
        services.scheduler.clone(),
        clock,
        config.scheduler.tick_interval,
    );

    let app = with_operational_routes(services.alerts, services.scheduler)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, locale = ?config.alerts.locale, "ivi risk alert service ready");

    let served = axum::serve(listener, app).await;
    driver.abort();
    served?;
    Ok(())
}
