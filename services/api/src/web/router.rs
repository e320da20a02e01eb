//! services/api/src/web/router.rs
//!
//! Assembles the full axum application: public and protected routes, the
//! object store's static files, CORS and the Swagger UI.

use crate::error::ApiError;
use crate::web::{
    auth::{login_handler, logout_handler, session_handler, signup_handler},
    drafts::submit_draft_handler,
    middleware::require_auth,
    rest::{
        category_all_handler, category_create_handler, recipe_all_handler, recipe_by_id_handler,
        recipe_create_handler, recipe_delete_handler, ApiDoc,
    },
    state::AppState,
};
use crate::adapters::storage::PUBLIC_PREFIX;
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Large enough for a cover plus a full set of step photos.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS origin: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/session", get(session_handler))
        .route("/api/trpc/recipe.all", get(recipe_all_handler))
        .route("/api/trpc/recipe.byId", get(recipe_by_id_handler))
        .route("/api/trpc/category.all", get(category_all_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/trpc/recipe.create", post(recipe_create_handler))
        .route("/api/trpc/recipe.delete", post(recipe_delete_handler))
        .route("/api/trpc/category.create", post(category_create_handler))
        .route("/api/drafts/submit", post(submit_draft_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(&state.config.storage_path))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state);

    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
