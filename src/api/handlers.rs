use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, State,
    },
    Json,
};
use bytes::Bytes;
use serde_json::Value;

use super::{
    AudioUrlRequest, AudioUrlResponse, HealthResponse, ProcessedImageResponse, TextResponse,
    TranscriptResponse, TranslateRequest, TranslateResponse, TtsRequest,
};
use crate::api::routes::AppState;
use crate::capability::{ModelsResponse, SpeechSynthesis, Voice};
use crate::error::AppError;
use crate::task::{Task, TaskId};
use crate::upload::sanitize_file_name;

const DEFAULT_LANGUAGE: &str = "en";

/// Unwraps a JSON body, turning axum's rejection into a 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// A field that is absent or blank counts as missing.
pub(crate) fn require(field: &str, value: Option<String>) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::missing(field))
}

/// Zero is what an unset numeric field decodes to in most clients.
fn non_zero_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| *v != 0.0).unwrap_or(default)
}

impl TtsRequest {
    fn into_synthesis(self) -> Result<SpeechSynthesis, AppError> {
        let text = require("text", self.text)?;
        let language = self
            .language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Ok(SpeechSynthesis {
            text,
            language,
            voice: self.voice.map(|v| v.trim().to_string()).unwrap_or_default(),
            speed: non_zero_or(self.speed, 1.0),
            pitch: self.pitch.unwrap_or(0.0),
            volume: non_zero_or(self.volume, 1.0),
        })
    }
}

/// An uploaded file pulled out of a multipart form.
struct UploadedFile {
    name: String,
    content: Bytes,
}

/// Reads the multipart part called `field`, ignoring any others.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
    field: &str,
) -> Result<UploadedFile, AppError> {
    let mut multipart = multipart.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let name = part
            .file_name()
            .and_then(sanitize_file_name)
            .ok_or_else(|| AppError::BadRequest(format!("'{}' must carry a file name", field)))?;
        let content = part
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return Ok(UploadedFile { name, content });
    }

    Err(AppError::missing(field))
}

/// Saves an uploaded image where the adapters can read it back.
async fn save_image(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<std::path::PathBuf, AppError> {
    let file = read_upload(multipart, "image").await?;
    Ok(state.image_uploads.save(&file.name, &file.content).await?)
}

pub async fn tts(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Json<AudioUrlResponse>, AppError> {
    let request = json_body(payload)?.into_synthesis()?;
    let audio_url = state.capabilities.text_to_voice.synthesize(request).await?;
    Ok(Json(AudioUrlResponse { audio_url }))
}

pub async fn vts(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AudioUrlRequest>, JsonRejection>,
) -> Result<Json<TranscriptResponse>, AppError> {
    let audio_url = require("audio_url", json_body(payload)?.audio_url)?;
    let transcript = state.capabilities.voice_to_text.transcribe(&audio_url).await?;
    Ok(Json(TranscriptResponse { transcript }))
}

pub async fn speech_recognition(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AudioUrlRequest>, JsonRejection>,
) -> Result<Json<TranscriptResponse>, AppError> {
    let audio_url = require("audio_url", json_body(payload)?.audio_url)?;
    let transcript = state
        .capabilities
        .speech_recognition
        .recognize(&audio_url)
        .await?;
    Ok(Json(TranscriptResponse { transcript }))
}

pub async fn remove_bg(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessedImageResponse>, AppError> {
    let image = save_image(&state, multipart).await?;
    let processed_image_path = state
        .capabilities
        .background_removal
        .remove_background(&image)
        .await?;
    Ok(Json(ProcessedImageResponse {
        processed_image_path,
    }))
}

pub async fn face_recognition(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, AppError> {
    let image = save_image(&state, multipart).await?;
    let result = state
        .capabilities
        .face_recognition
        .recognize_faces(&image)
        .await?;
    Ok(Json(result))
}

pub async fn ocr(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TextResponse>, AppError> {
    let image = save_image(&state, multipart).await?;
    let text = state.capabilities.ocr.extract_text(&image).await?;
    Ok(Json(TextResponse { text }))
}

pub async fn translate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslateResponse>, AppError> {
    let request = json_body(payload)?;
    let text = require("text", request.text)?;
    let dest_lang = require("dest_lang", request.dest_lang)?;

    let translated_text = state
        .capabilities
        .translation
        .translate(&text, dest_lang.trim())
        .await?;
    Ok(Json(TranslateResponse { translated_text }))
}

pub async fn upload_audio(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AudioUrlResponse>, AppError> {
    let file = read_upload(multipart, "audio").await?;
    let audio_url = state
        .capabilities
        .audio_upload
        .upload(&file.name, &file.content)
        .await?;
    Ok(Json(AudioUrlResponse { audio_url }))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, AppError> {
    let id: i32 = id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid task id '{}'", id)))?;
    let id = TaskId(id);

    state
        .store
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or(AppError::TaskNotFound(id))
}

pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Task>>, AppError> {
    Ok(Json(state.store.list().await?))
}

pub async fn languages(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.capabilities.voice_catalog.languages().await?))
}

pub async fn voices(
    State(state): State<Arc<AppState>>,
    Path(language): Path<String>,
) -> Result<Json<Vec<Voice>>, AppError> {
    Ok(Json(state.capabilities.voice_catalog.voices(&language).await?))
}

pub async fn models(State(state): State<Arc<AppState>>) -> Result<Json<ModelsResponse>, AppError> {
    Ok(Json(state.capabilities.voice_catalog.models().await?))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
