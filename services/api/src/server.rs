use crate::cli::ServeArgs;
use crate::infra::{AppState, CatalogStore};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use imoveis::admin::AdminAuthenticator;
use imoveis::catalog::{CatalogService, CatalogState};
use imoveis::config::AppConfig;
use imoveis::error::AppError;
use imoveis::telemetry;
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
    if let Some(data) = args.data.take() {
        config.catalog.data_path = Some(data);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = CatalogStore::open(&config.catalog)?;
    let store_label = store.describe();
    let service = Arc::new(CatalogService::new(Arc::new(store)));

    let auth = Arc::new(AdminAuthenticator::from_config(&config.admin));
    if !auth.is_enabled() {
        warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set; admin login is disabled");
    }

    let state = CatalogState::new(service, auth).with_contact(config.contact.clone());
    let app = with_service_routes(state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, store = %store_label, "imoveis api ready");

    axum::serve(listener, app).await?;
    Ok(())
}
