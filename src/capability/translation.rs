use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{decode, required, unreachable, Backend, CapabilityError, Outcome, Translation};

pub struct HttpTranslation {
    backend: Backend,
}

impl HttpTranslation {
    const SERVICE: &'static str = "translation";

    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[derive(Debug, Deserialize)]
struct TranslationResponse {
    #[serde(default)]
    translated_text: Option<String>,
    #[serde(flatten)]
    outcome: Outcome,
}

#[derive(Debug, Serialize)]
struct TranslationOutput {
    translated_text: String,
}

#[async_trait]
impl Translation for HttpTranslation {
    async fn translate(&self, text: &str, dest_lang: &str) -> Result<String, CapabilityError> {
        let service = Self::SERVICE;
        tracing::info!("Translating {} chars into {}", text.chars().count(), dest_lang);

        let input = json!({ "text": text, "dest_lang": dest_lang });
        let output = self
            .backend
            .recorder()
            .track(service, input.clone(), async {
                let response = self
                    .backend
                    .client()
                    .post_json(&self.backend.url("/translate"), input)
                    .await
                    .map_err(unreachable(service))?;
                let body: TranslationResponse = decode(service, &response)?;
                body.outcome.check(service, false)?;
                let translated_text = required(service, "translated_text", body.translated_text)?;
                Ok::<_, CapabilityError>(TranslationOutput { translated_text })
            })
            .await?;
        Ok(output.translated_text)
    }
}
