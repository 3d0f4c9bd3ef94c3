mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(api::search_handler, api::reload_handler, api::build_handler, api::stats_handler),
    components(schemas(
        types::SearchForm,
        types::SearchResponse,
        types::SearchResult,
        types::IndexInfo,
        types::StatsResponse
    )),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// 构建API服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/search", post(api::search_handler))
        .route("/reload", post(api::reload_handler))
        .route("/build", post(api::build_handler))
        .route("/stats", get(api::stats_handler));
    if let Some(dir) = &state.video_dir {
        router = router.nest_service("/videos", ServeDir::new(dir));
    }
    router
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::disable())
        // 上传限制：10M
        .layer(RequestBodyLimitLayer::new(1024 * 1024 * 10))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
