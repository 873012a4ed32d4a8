use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    decode, required, unreachable, Backend, CapabilityError, Outcome, SpeechRecognition,
    VoiceToText,
};

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    transcript: Option<String>,
    /// The speech-recognition worker answers with `text`.
    #[serde(default)]
    text: Option<String>,
    #[serde(flatten)]
    outcome: Outcome,
}

#[derive(Debug, Serialize)]
struct TranscriptOutput {
    transcript: String,
}

/// Posts `{audio_url}` to `path` and pulls the transcript out of the answer.
async fn transcribe_url(
    backend: &Backend,
    service: &'static str,
    path: &str,
    audio_url: &str,
) -> Result<String, CapabilityError> {
    let input = json!({ "audio_url": audio_url });
    let output = backend
        .recorder()
        .track(service, input.clone(), async {
            let response = backend
                .client()
                .post_json(&backend.url(path), input)
                .await
                .map_err(unreachable(service))?;
            let body: TranscriptResponse = decode(service, &response)?;
            body.outcome.check(service, false)?;
            let transcript = required(service, "transcript", body.transcript.or(body.text))?;
            Ok::<_, CapabilityError>(TranscriptOutput { transcript })
        })
        .await?;
    Ok(output.transcript)
}

pub struct HttpVoiceToText {
    backend: Backend,
}

impl HttpVoiceToText {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl VoiceToText for HttpVoiceToText {
    async fn transcribe(&self, audio_url: &str) -> Result<String, CapabilityError> {
        tracing::info!("Transcribing {}", audio_url);
        transcribe_url(&self.backend, "voice-to-text", "/convert", audio_url).await
    }
}

pub struct HttpSpeechRecognition {
    backend: Backend,
}

impl HttpSpeechRecognition {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SpeechRecognition for HttpSpeechRecognition {
    async fn recognize(&self, audio_url: &str) -> Result<String, CapabilityError> {
        tracing::info!("Recognizing speech in {}", audio_url);
        transcribe_url(&self.backend, "speech-recognition", "/recognize", audio_url).await
    }
}
