//! HTTP API server for the order service.
//!
//! Thin adapters over the order lifecycle service, with structured logging
//! (tracing) and Prometheus metrics. Request handlers own payload shape
//! checks; all business rules live in the `domain` crate.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use domain::{InMemoryPaymentSessions, OrderService, ProductCatalog};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderRepository;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R: OrderRepository + 'static>(
    state: Arc<AppState<R>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create::<R>).get(routes::orders::list::<R>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<R>).put(routes::orders::update::<R>),
        )
        .route(
            "/orders/{id}/status",
            patch(routes::orders::change_status::<R>),
        )
        .route(
            "/payments/confirmed",
            post(routes::payments::confirmed::<R>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a repository and catalog client.
pub fn create_state<R: OrderRepository>(
    repo: R,
    catalog: Arc<dyn ProductCatalog>,
) -> Arc<AppState<R>> {
    Arc::new(AppState {
        orders: OrderService::new(repo, catalog, InMemoryPaymentSessions::new()),
    })
}
