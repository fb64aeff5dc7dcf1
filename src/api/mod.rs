//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints for Research Locker.
//! It includes:
//! - Auth and profile endpoints
//! - Article, tag, author, collection and publisher endpoints
//! - DOI reference and Crossref lookup endpoints
//! - PDF uploads
//! - Plans and PayPal checkout
//! - Home buttons
//! - Health checks and the uniform error surface

pub mod articles;
pub mod auth;
pub mod authors;
pub mod billing;
pub mod collections;
pub mod crossref;
pub mod doi_references;
pub mod error;
pub mod health;
pub mod home_buttons;
pub mod middleware;
pub mod profile;
pub mod publishers;
pub mod tags;
pub mod upload;

use axum::{extract::DefaultBodyLimit, middleware as axum_middleware, Router};
use tower_http::{catch_panic::CatchPanicLayer, services::ServeDir, trace::TraceLayer};

pub use error::AppError;
pub use middleware::{AppState, AuthenticatedUser};

/// Build the `/v1` API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a valid access token)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/profile", profile::router())
        .nest("/articles", articles::router())
        .nest("/tag", tags::protected_router())
        .nest("/authors", authors::router())
        .nest("/collections", collections::router())
        .nest("/publishers", publishers::router())
        .nest("/doi-references", doi_references::router())
        .nest("/crossref", crossref::router())
        .nest("/upload", upload::router())
        .nest("/paypal", billing::paypal_router())
        .nest("/home-buttons", home_buttons::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/tag", tags::public_router())
        .nest("/plans", billing::plans_router())
        .nest("/home-buttons", home_buttons::public_router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let body_limit = usize::try_from(config.upload.max_file_size).unwrap_or(usize::MAX);

    // Legacy mount used by older extension builds
    let legacy_authors = authors::router().route_layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::require_auth,
    ));

    let router = Router::new()
        .merge(health::router())
        .nest("/v1", build_api_router(state.clone()))
        .nest("/api/authors", legacy_authors)
        .nest_service("/v1/uploads", ServeDir::new(&config.upload.path))
        .fallback(middleware::route_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        // Turns every error response into the JSON/HTML envelope and logs it
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            error::render_errors,
        ));

    middleware::with_security_headers(router, &config.server)
        .layer(middleware::cors_layer(&config.server))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
