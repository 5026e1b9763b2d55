pub mod auth;
mod categories;
pub mod error;
pub mod gate;
pub mod metrics;
mod products;
mod validation;


use axum::{
    middleware,
    routing::{delete, get, patch, post, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;
use gate::{auth_gate, Gate, RoleSet};

pub use error::{ApiError, ErrorCode};

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public, except the ones acting on the caller's session)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify", post(auth::verify))
        .route("/resend-otp", post(auth::resend_otp))
        .route("/refresh", post(auth::refresh))
        .route("/me", gated(&state, RoleSet::ANY, get(auth::me)))
        .route("/logout", gated(&state, RoleSet::ANY, post(auth::logout)));

    // Reads are public, writes go through the gate
    let category_routes = Router::new()
        .route(
            "/",
            get(categories::list_categories).merge(gated(
                &state,
                RoleSet::ADMIN,
                post(categories::create_category),
            )),
        )
        .route(
            "/:id",
            get(categories::get_category)
                .merge(gated(
                    &state,
                    RoleSet::EDITORS,
                    patch(categories::update_category),
                ))
                .merge(gated(
                    &state,
                    RoleSet::ADMIN,
                    delete(categories::delete_category),
                )),
        );

    let product_routes = Router::new()
        .route(
            "/",
            get(products::list_products).merge(gated(
                &state,
                RoleSet::ADMIN,
                post(products::create_product),
            )),
        )
        .route(
            "/:id",
            get(products::get_product)
                .merge(gated(
                    &state,
                    RoleSet::EDITORS,
                    patch(products::update_product),
                ))
                .merge(gated(
                    &state,
                    RoleSet::ADMIN,
                    delete(products::delete_product),
                )),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .nest("/auth", auth_routes)
        .nest("/category", category_routes)
        .nest("/product", product_routes)
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Put the methods of `route` behind the auth gate, admitting only `roles`.
///
/// Only matched methods are gated; other methods still get a 405.
fn gated(
    state: &Arc<AppState>,
    roles: RoleSet,
    route: MethodRouter<Arc<AppState>>,
) -> MethodRouter<Arc<AppState>> {
    route.route_layer(middleware::from_fn_with_state(
        Gate::new(state.clone(), roles),
        auth_gate,
    ))
}

async fn health_check() -> &'static str {
    "OK"
}
