//! HTTP API server for the shop backend.
//!
//! Provides REST endpoints for accounts, the catalog, promotions and
//! checkout, with bearer-token authentication, problem+json errors,
//! structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post, put};
use domain::Store;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Identity
        .route("/auth/register", post(routes::auth::register::<S>))
        .route("/auth/login", post(routes::auth::login::<S>))
        .route("/auth/carriers/register", post(routes::auth::register_carrier::<S>))
        .route("/auth/carriers/login", post(routes::auth::login_carrier::<S>))
        .route("/users/me", get(routes::users::me))
        .route("/users", get(routes::users::list::<S>))
        .route(
            "/users/{id}",
            get(routes::users::get::<S>).delete(routes::users::deactivate::<S>),
        )
        .route("/users/{id}/addresses", post(routes::users::add_address::<S>))
        .route(
            "/users/{id}/addresses/{address_id}",
            delete(routes::users::remove_address::<S>),
        )
        .route("/users/{id}/roles", put(routes::users::set_roles::<S>))
        // Catalog
        .route(
            "/categories",
            get(routes::categories::list::<S>).post(routes::categories::create::<S>),
        )
        .route(
            "/categories/{id}",
            get(routes::categories::get::<S>)
                .put(routes::categories::update::<S>)
                .delete(routes::categories::delete::<S>),
        )
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route(
            "/products/{id}",
            get(routes::products::get::<S>)
                .put(routes::products::update::<S>)
                .delete(routes::products::deactivate::<S>),
        )
        .route("/products/{id}/images", post(routes::products::add_image::<S>))
        .route(
            "/products/{id}/images/{image_id}",
            delete(routes::products::remove_image::<S>),
        )
        .route(
            "/products/{id}/inventory",
            patch(routes::products::update_inventory::<S>),
        )
        // Promotions
        .route(
            "/shipping-methods",
            get(routes::shipping_methods::list::<S>).post(routes::shipping_methods::create::<S>),
        )
        .route(
            "/shipping-methods/{id}",
            put(routes::shipping_methods::update::<S>)
                .delete(routes::shipping_methods::deactivate::<S>),
        )
        .route(
            "/sales",
            get(routes::sales::list::<S>).post(routes::sales::create::<S>),
        )
        .route(
            "/sales/{id}",
            get(routes::sales::get::<S>)
                .put(routes::sales::update::<S>)
                .delete(routes::sales::deactivate::<S>),
        )
        .route(
            "/coupons",
            get(routes::coupons::list::<S>).post(routes::coupons::create::<S>),
        )
        .route(
            "/coupons/{id}",
            get(routes::coupons::get::<S>)
                .put(routes::coupons::update::<S>)
                .delete(routes::coupons::deactivate::<S>),
        )
        // Ordering
        .route("/orders/quote", post(routes::orders::quote::<S>))
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::place::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/ship", post(routes::orders::ship::<S>))
        .route("/orders/{id}/deliver", post(routes::orders::deliver::<S>))
        .route("/shipments", get(routes::orders::shipments::<S>))
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
