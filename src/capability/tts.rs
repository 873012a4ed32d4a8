use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{decode, unreachable, Backend, CapabilityError, Outcome, TextToVoice, VoiceCatalog};

const SERVICE: &str = "text-to-voice";

/// A fully defaulted synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechSynthesis {
    pub text: String,
    pub language: String,
    /// Backend model id; empty keeps the backend's current model.
    pub voice: String,
    pub speed: f64,
    pub pitch: f64,
    pub volume: f64,
}

impl SpeechSynthesis {
    fn backend_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("text".into(), json!(self.text));
        body.insert("language".into(), json!(self.language));
        if !self.voice.is_empty() {
            body.insert("model".into(), json!(self.voice));
        }
        body.insert("speed".into(), json!(self.speed));
        body.insert("pitch".into(), json!(self.pitch));
        body.insert("volume".into(), json!(self.volume));
        Value::Object(body)
    }
}

#[derive(Debug, Deserialize)]
struct SynthesisResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(flatten)]
    outcome: Outcome,
}

#[derive(Debug, Serialize)]
struct SynthesisOutput {
    audio_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDetails {
    pub model_id: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub dataset: String,
    #[serde(default)]
    pub language: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub current_model: String,
    #[serde(default)]
    pub models_by_language: HashMap<String, Vec<ModelDetails>>,
    #[serde(default)]
    pub total_models: usize,
}

#[derive(Debug, Deserialize)]
struct LanguagesResponse {
    languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gender: Option<String>,
    pub model: String,
    pub language: String,
}

impl From<&ModelDetails> for Voice {
    fn from(model: &ModelDetails) -> Self {
        Self {
            id: model.model_id.clone(),
            name: display_name(model),
            gender: None,
            model: model.model_id.clone(),
            language: model.language.clone(),
        }
    }
}

/// Architecture when the backend knows it, else the last segment of the model
/// id (e.g. `tts_models/en/ljspeech/vits` -> `vits`).
fn display_name(model: &ModelDetails) -> String {
    if !model.architecture.is_empty() && model.architecture != "unknown" {
        return model.architecture.clone();
    }
    model
        .model_id
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(&model.model_id)
        .to_string()
}

pub struct HttpTextToVoice {
    backend: Backend,
    audio_base_url: String,
}

impl HttpTextToVoice {
    pub fn new(backend: Backend, audio_base_url: String) -> Self {
        Self {
            backend,
            audio_base_url: audio_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn call(&self, request: &SpeechSynthesis) -> Result<String, CapabilityError> {
        let response = self
            .backend
            .client()
            .post_json(&self.backend.url("/tts"), request.backend_body())
            .await
            .map_err(unreachable(SERVICE))?;

        let body: SynthesisResponse = decode(SERVICE, &response)?;
        body.outcome.check(SERVICE, false)?;
        if body.success == Some(false) {
            return Err(CapabilityError::Rejected {
                service: SERVICE,
                reason: "success=false".to_string(),
            });
        }

        match (body.filename, body.audio_url) {
            (Some(filename), _) if !filename.is_empty() => {
                Ok(format!("{}/{}", self.audio_base_url, filename))
            }
            (_, Some(url)) if !url.is_empty() => Ok(url),
            _ => Err(CapabilityError::Malformed {
                service: SERVICE,
                reason: "neither 'filename' nor 'audio_url' in response".to_string(),
            }),
        }
    }
}

#[async_trait]
impl TextToVoice for HttpTextToVoice {
    async fn synthesize(&self, request: SpeechSynthesis) -> Result<String, CapabilityError> {
        tracing::info!(
            "Synthesizing {} chars, language '{}', voice '{}'",
            request.text.chars().count(),
            request.language,
            request.voice
        );
        let input = serde_json::to_value(&request).unwrap_or(Value::Null);
        let output = self
            .backend
            .recorder()
            .track(SERVICE, input, async {
                self.call(&request)
                    .await
                    .map(|audio_url| SynthesisOutput { audio_url })
            })
            .await?;
        Ok(output.audio_url)
    }
}

#[async_trait]
impl VoiceCatalog for HttpTextToVoice {
    async fn models(&self) -> Result<ModelsResponse, CapabilityError> {
        let response = self
            .backend
            .client()
            .get(&self.backend.url("/models"))
            .await
            .map_err(unreachable(SERVICE))?;
        decode(SERVICE, &response)
    }

    async fn languages(&self) -> Result<Vec<String>, CapabilityError> {
        let response = self
            .backend
            .client()
            .get(&self.backend.url("/models/languages"))
            .await
            .map_err(unreachable(SERVICE))?;
        let body: LanguagesResponse = decode(SERVICE, &response)?;
        Ok(body.languages)
    }

    async fn voices(&self, language: &str) -> Result<Vec<Voice>, CapabilityError> {
        let models = self.models().await?;
        let voices = models
            .models_by_language
            .get(language)
            .ok_or_else(|| {
                CapabilityError::NotFound(format!("no models found for language: {}", language))
            })?
            .iter()
            .map(Voice::from)
            .collect();
        Ok(voices)
    }
}
