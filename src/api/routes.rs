use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use super::handlers;
use crate::capability::Capabilities;
use crate::config::Config;
use crate::task::TaskStore;
use crate::upload::UploadDir;

const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;
const CORS_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

pub struct AppState {
    pub capabilities: Capabilities,
    pub store: Arc<dyn TaskStore>,
    pub image_uploads: UploadDir,
}

impl AppState {
    pub fn new(capabilities: Capabilities, store: Arc<dyn TaskStore>, config: &Config) -> Self {
        Self {
            capabilities,
            store,
            image_uploads: UploadDir::new(config.uploads.image_dir.clone()),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_LENGTH])
        .max_age(CORS_MAX_AGE);

    // Credentials cannot be combined with a wildcard origin.
    if origins.iter().any(|origin| origin == "*") {
        cors.allow_origin(AllowOrigin::any())
    } else {
        cors.allow_origin(AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        ))
        .allow_credentials(true)
    }
}

pub fn create_router(state: Arc<AppState>, config: &Config) -> Router {
    Router::new()
        .route("/tts", post(handlers::tts))
        .route("/tts/languages", get(handlers::languages))
        .route("/tts/voices/:language", get(handlers::voices))
        .route("/tts/models", get(handlers::models))
        .route("/vts", post(handlers::vts))
        .route("/remove-bg", post(handlers::remove_bg))
        .route("/speech-recognition", post(handlers::speech_recognition))
        .route("/face-recognition", post(handlers::face_recognition))
        .route("/ocr", post(handlers::ocr))
        .route("/translate", post(handlers::translate))
        .route("/upload-audio", post(handlers::upload_audio))
        .route("/tasks", get(handlers::list_tasks))
        .route("/tasks/:id", get(handlers::get_task))
        .route("/health", get(handlers::health))
        .nest_service("/uploads", ServeDir::new(&config.uploads.root))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(&config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
