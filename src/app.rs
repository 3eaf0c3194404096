use crate::services::backend::BackendClient;
use crate::services::{pages, proxy};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub const STATIC_DIR: &str = "static";

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<BackendClient>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/chapters/:slug", get(pages::chapter))
        .route("/signup", get(pages::signup_form).post(pages::signup_submit))
        .route("/signout", post(pages::sign_out))
        .route("/api/chapters", get(pages::chapter_index))
        .route("/api/chat", post(proxy::chat))
        .route("/api/chat/", post(proxy::chat))
        .route("/api/auth/signup", post(proxy::signup))
        .route("/api/auth/login", post(proxy::login))
        .route("/api/content/personalize", post(proxy::personalize))
        .route("/api/content/translate", post(proxy::translate))
        .route("/health", get(pages::health))
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .fallback(pages::not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(AllowMethods::any())
                .allow_headers(AllowHeaders::any()),
        )
}
