//! Per-capability adapters.
//!
//! Each capability is a small trait so the dispatcher can compose them and
//! tests can swap any one of them out. The `Http*` adapters translate one
//! domain request into one call against one backend and record a task for it.

pub mod image;
pub mod speech;
pub mod translation;
pub mod tts;
pub mod upload;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::client::{ClientError, ServiceClient, ServiceResponse};
use crate::config::Config;
use crate::task::TaskRecorder;
use crate::upload::UploadDir;

pub use image::{HttpBackgroundRemoval, HttpFaceRecognition, HttpOcr};
pub use speech::{HttpSpeechRecognition, HttpVoiceToText};
pub use translation::HttpTranslation;
pub use tts::{HttpTextToVoice, ModelDetails, ModelsResponse, SpeechSynthesis, Voice};
pub use upload::LocalAudioUpload;

#[derive(thiserror::Error, Debug)]
pub enum CapabilityError {
    #[error("could not reach {service}: {source}")]
    Unreachable {
        service: &'static str,
        #[source]
        source: ClientError,
    },

    #[error("{service} reported failure: {reason}")]
    Rejected {
        service: &'static str,
        reason: String,
    },

    #[error("could not parse {service} response: {reason}")]
    Malformed {
        service: &'static str,
        reason: String,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("could not store upload: {0}")]
    Storage(#[from] std::io::Error),
}

#[async_trait]
pub trait TextToVoice: Send + Sync {
    /// Synthesizes speech and returns a URL the client can fetch it from.
    async fn synthesize(&self, request: SpeechSynthesis) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait VoiceCatalog: Send + Sync {
    async fn models(&self) -> Result<ModelsResponse, CapabilityError>;

    async fn languages(&self) -> Result<Vec<String>, CapabilityError>;

    async fn voices(&self, language: &str) -> Result<Vec<Voice>, CapabilityError>;
}

#[async_trait]
pub trait VoiceToText: Send + Sync {
    async fn transcribe(&self, audio_url: &str) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait BackgroundRemoval: Send + Sync {
    /// Returns the backend's path to the processed image.
    async fn remove_background(&self, image: &Path) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait SpeechRecognition: Send + Sync {
    async fn recognize(&self, audio_url: &str) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait FaceRecognition: Send + Sync {
    /// Backend-defined result, passed through without validation.
    async fn recognize_faces(&self, image: &Path) -> Result<Value, CapabilityError>;
}

#[async_trait]
pub trait Ocr: Send + Sync {
    async fn extract_text(&self, image: &Path) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait Translation: Send + Sync {
    async fn translate(&self, text: &str, dest_lang: &str) -> Result<String, CapabilityError>;
}

#[async_trait]
pub trait AudioUpload: Send + Sync {
    /// Stores the audio file and returns its public URL.
    async fn upload(&self, file_name: &str, content: &[u8]) -> Result<String, CapabilityError>;
}

/// Every capability the gateway dispatches to.
#[derive(Clone)]
pub struct Capabilities {
    pub text_to_voice: Arc<dyn TextToVoice>,
    pub voice_catalog: Arc<dyn VoiceCatalog>,
    pub voice_to_text: Arc<dyn VoiceToText>,
    pub background_removal: Arc<dyn BackgroundRemoval>,
    pub speech_recognition: Arc<dyn SpeechRecognition>,
    pub face_recognition: Arc<dyn FaceRecognition>,
    pub ocr: Arc<dyn Ocr>,
    pub translation: Arc<dyn Translation>,
    pub audio_upload: Arc<dyn AudioUpload>,
}

impl Capabilities {
    /// Wires the HTTP adapters against the configured backends.
    pub fn from_config(config: &Config, client: ServiceClient, recorder: TaskRecorder) -> Self {
        let services = &config.services;
        let tts = Arc::new(HttpTextToVoice::new(
            Backend::new(client.clone(), &services.tts, recorder.clone()),
            config.server.tts_audio_base_url.clone(),
        ));

        Self {
            text_to_voice: tts.clone(),
            voice_catalog: tts,
            voice_to_text: Arc::new(HttpVoiceToText::new(Backend::new(
                client.clone(),
                &services.voice_to_text,
                recorder.clone(),
            ))),
            background_removal: Arc::new(HttpBackgroundRemoval::new(Backend::new(
                client.clone(),
                &services.background_removal,
                recorder.clone(),
            ))),
            speech_recognition: Arc::new(HttpSpeechRecognition::new(Backend::new(
                client.clone(),
                &services.speech_recognition,
                recorder.clone(),
            ))),
            face_recognition: Arc::new(HttpFaceRecognition::new(Backend::new(
                client.clone(),
                &services.face_recognition,
                recorder.clone(),
            ))),
            ocr: Arc::new(HttpOcr::new(Backend::new(
                client.clone(),
                &services.ocr,
                recorder.clone(),
            ))),
            translation: Arc::new(HttpTranslation::new(Backend::new(
                client,
                &services.translation,
                recorder,
            ))),
            audio_upload: Arc::new(LocalAudioUpload::new(
                UploadDir::new(config.uploads.audio_dir.clone()),
                config.server.public_base_url.clone(),
            )),
        }
    }
}

/// One backend service: where it lives, how to call it, where to record.
#[derive(Clone)]
pub struct Backend {
    client: ServiceClient,
    base_url: String,
    recorder: TaskRecorder,
}

impl Backend {
    pub fn new(client: ServiceClient, base_url: &str, recorder: TaskRecorder) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            recorder,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub fn recorder(&self) -> &TaskRecorder {
        &self.recorder
    }
}

/// Failure markers some backends put in an otherwise successful response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Outcome {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Outcome {
    /// `require_status` makes an absent `status` field a failure too.
    pub(crate) fn check(&self, service: &'static str, require_status: bool) -> Result<(), CapabilityError> {
        if let Some(error) = &self.error {
            return Err(CapabilityError::Rejected {
                service,
                reason: error.clone(),
            });
        }
        match self.status.as_deref() {
            Some("success") => Ok(()),
            None if !require_status => Ok(()),
            Some(other) => Err(CapabilityError::Rejected {
                service,
                reason: format!("status '{}'", other),
            }),
            None => Err(CapabilityError::Rejected {
                service,
                reason: "missing status".to_string(),
            }),
        }
    }
}

pub(crate) fn unreachable(service: &'static str) -> impl FnOnce(ClientError) -> CapabilityError {
    move |source| CapabilityError::Unreachable { service, source }
}

pub(crate) fn decode<T: DeserializeOwned>(
    service: &'static str,
    response: &ServiceResponse,
) -> Result<T, CapabilityError> {
    response.json().map_err(|e| CapabilityError::Malformed {
        service,
        reason: e.to_string(),
    })
}

/// Rejects a missing or empty string field in a backend response.
pub(crate) fn required(
    service: &'static str,
    field: &'static str,
    value: Option<String>,
) -> Result<String, CapabilityError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CapabilityError::Malformed {
            service,
            reason: format!("missing '{}'", field),
        })
}
