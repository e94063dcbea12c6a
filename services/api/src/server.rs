use crate::cli::ServeArgs;
use crate::infra::{load_reference, AppState, InMemoryQuoteRepository, InMemoryStatusHistory};
use crate::routes::with_quote_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use fleet_lease::config::AppConfig;
use fleet_lease::error::AppError;
use fleet_lease::telemetry;
use fleet_lease::workflows::quote::{CostEngine, QuoteService};
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

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let reference = Arc::new(load_reference(args.catalog.as_deref())?);
    let quote_service = Arc::new(QuoteService::new(
        Arc::new(InMemoryQuoteRepository::default()),
        Arc::new(InMemoryStatusHistory::default()),
        reference,
        CostEngine::new(config.pricing.clone()),
    ));

    let app = with_quote_routes(quote_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        base_rate = %config.pricing.depreciation_base_rate,
        "fleet lease quote service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
