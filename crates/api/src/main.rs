//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use common::{Money, ProductId};
use domain::{HttpProductCatalog, InMemoryProductCatalog, ProductCatalog};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryOrderRepository, OrderRepository, PostgresOrderRepository};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<R: OrderRepository + 'static>(
    repo: R,
    catalog: Arc<dyn ProductCatalog>,
    metrics_handle: PrometheusHandle,
    config: &Config,
) {
    let state = api::create_state(repo, catalog);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting order service");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Product catalog client
    let catalog: Arc<dyn ProductCatalog> = match &config.products_url {
        Some(url) => Arc::new(HttpProductCatalog::new(
            url.clone(),
            config.products_timeout,
        )),
        None => {
            tracing::warn!("PRODUCTS_URL not set, using seeded in-memory catalog");
            let catalog = InMemoryProductCatalog::new();
            catalog.insert(ProductId::new(1), Money::from_cents(1000), "Widget");
            catalog.insert(ProductId::new(2), Money::from_cents(500), "Gadget");
            Arc::new(catalog)
        }
    };

    // 4. Order store and server
    match config.database_url.clone() {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let repo = PostgresOrderRepository::new(pool);
            repo.run_migrations().await.expect("migrations failed");
            tracing::info!("database connected");

            serve(repo, catalog, metrics_handle, &config).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory order store");
            serve(
                InMemoryOrderRepository::new(),
                catalog,
                metrics_handle,
                &config,
            )
            .await;
        }
    }
}
