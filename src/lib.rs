pub mod api;
pub mod config;
pub mod entities;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::IngestConfig;
use crate::services::storage::StorageService;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::create_session_handler,
        api::handlers::upload::submit_chunk_handler,
        api::handlers::upload::resume_point_handler,
        api::handlers::upload::session_status_handler,
        api::handlers::upload::cancel_session_handler,
        api::handlers::upload::list_sessions_handler,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            services::upload_service::CreateSessionRequest,
            services::upload_service::CreateSessionResponse,
            services::upload_service::ChunkProgress,
            services::upload_service::SessionStatus,
            services::upload_service::PendingSessionResponse,
            api::handlers::upload::ResumePointResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "uploads", description = "Resumable upload endpoints"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub upload_service: Arc<UploadService>,
    pub config: IngestConfig,
}

pub fn create_app(state: AppState) -> Router {
    // Chunk bodies arrive as raw octet streams; leave headroom over the
    // configured chunk size for framing.
    let chunk_body_limit = state.config.chunk_size as usize + 1024 * 1024;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/uploads",
            post(api::handlers::upload::create_session_handler)
                .get(api::handlers::upload::list_sessions_handler),
        )
        .route(
            "/uploads/:session_id",
            get(api::handlers::upload::session_status_handler)
                .delete(api::handlers::upload::cancel_session_handler),
        )
        .route(
            "/uploads/:session_id/chunks/:chunk_number",
            put(api::handlers::upload::submit_chunk_handler)
                .layer(axum::extract::DefaultBodyLimit::max(chunk_body_limit)),
        )
        .route(
            "/uploads/:session_id/resume",
            get(api::handlers::upload::resume_point_handler),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
