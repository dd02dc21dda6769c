pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::middleware::request_id::{REQUEST_ID_HEADER, request_id_middleware};
use crate::config::UploaderConfig;
use crate::services::print_service::PrintService;
use crate::services::storage::BlobStore;
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub upload_service: Arc<UploadService>,
    pub print_service: Arc<PrintService>,
    pub config: UploaderConfig,
}

impl AppState {
    pub fn new(config: UploaderConfig, blob_store: Arc<dyn BlobStore>) -> Self {
        let upload_service = Arc::new(UploadService::new(
            blob_store,
            config.upload_dir.clone(),
        ));
        let print_service = Arc::new(PrintService::new(
            config.print.clone(),
            config.upload_dir.clone(),
        ));

        Self {
            upload_service,
            print_service,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            get(api::handlers::upload::index).fallback(api::handlers::upload::upload_files),
        )
        .route(
            "/printer/:printername/file/:filename",
            post(api::handlers::print::print_file).fallback(api::handlers::upload::not_found),
        )
        .fallback(api::handlers::upload::not_found)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_upload_size,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        // outermost, so the trace span already sees a generated id
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
