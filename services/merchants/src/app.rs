//! Merchant service HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! Collection routes are registered with and without the trailing slash so
//! both `/api/merchants` and `/api/merchants/` resolve.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::config::{DEFAULT_MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE};
use crate::observability;
use crate::store::MerchantStore;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

pub const SERVICE_NAME: &str = "merchants";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MerchantStore + Send + Sync>,
    pub api_version: String,
    pub page_size: usize,
    pub max_page_size: usize,
}

impl AppState {
    /// State with default paging, as used by tests and embedders.
    pub fn new(store: Arc<dyn MerchantStore + Send + Sync>) -> Self {
        Self {
            store,
            api_version: "v1".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    Router::new()
        .route("/api", get(api::system::api_root))
        .route("/api/", get(api::system::api_root))
        .route("/v1/system/info", get(api::system::system_info))
        .route("/v1/system/health", get(api::system::system_health))
        .route(
            "/api/merchants",
            get(api::merchants::list_merchants).post(api::merchants::create_merchant),
        )
        .route(
            "/api/merchants/",
            get(api::merchants::list_merchants).post(api::merchants::create_merchant),
        )
        .route("/api/merchants/statistics/", get(api::merchants::merchant_statistics))
        .route("/api/merchants/export_csv/", get(api::merchants::export_csv))
        .route("/api/merchants/generate_report/", get(api::merchants::generate_report))
        .route(
            "/api/merchants/:id/",
            get(api::merchants::get_merchant)
                .put(api::merchants::update_merchant)
                .patch(api::merchants::patch_merchant)
                .delete(api::merchants::delete_merchant),
        )
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/api/openapi.json", ApiDoc::openapi()),
        )
        .layer(trace_layer)
        .with_state(state)
}
