pub mod handlers;
pub mod routes;

use serde::{Deserialize, Serialize};

/// `POST /tts`. Every field is optional at parse time; presence and defaults
/// are applied by the handler.
#[derive(Debug, Default, Deserialize)]
pub struct TtsRequest {
    pub text: Option<String>,
    pub language: Option<String>,
    pub voice: Option<String>,
    pub speed: Option<f64>,
    pub pitch: Option<f64>,
    pub volume: Option<f64>,
}

/// `POST /vts` and `POST /speech-recognition`.
#[derive(Debug, Default, Deserialize)]
pub struct AudioUrlRequest {
    pub audio_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TranslateRequest {
    pub text: Option<String>,
    pub dest_lang: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AudioUrlResponse {
    pub audio_url: String,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub transcript: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessedImageResponse {
    pub processed_image_path: String,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub translated_text: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
