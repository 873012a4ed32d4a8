//! Adapters that ship an uploaded image to a backend as multipart `image`.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    decode, required, unreachable, Backend, BackgroundRemoval, CapabilityError, FaceRecognition,
    Ocr, Outcome,
};
use crate::client::ServiceResponse;

const IMAGE_FIELD: &str = "image";

async fn post_image(
    backend: &Backend,
    service: &'static str,
    path: &str,
    image: &Path,
) -> Result<ServiceResponse, CapabilityError> {
    backend
        .client()
        .post_file(&backend.url(path), IMAGE_FIELD, image.to_path_buf())
        .await
        .map_err(unreachable(service))
}

fn image_input(image: &Path) -> Value {
    json!({ "image_path": image.display().to_string() })
}

pub struct HttpBackgroundRemoval {
    backend: Backend,
}

impl HttpBackgroundRemoval {
    const SERVICE: &'static str = "background-removal";

    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[derive(Debug, Deserialize)]
struct ProcessedImage {
    #[serde(default)]
    processed_image_path: Option<String>,
    #[serde(flatten)]
    outcome: Outcome,
}

#[derive(Debug, Serialize)]
struct ProcessedOutput {
    processed_image_path: String,
}

#[async_trait]
impl BackgroundRemoval for HttpBackgroundRemoval {
    async fn remove_background(&self, image: &Path) -> Result<String, CapabilityError> {
        let service = Self::SERVICE;
        tracing::info!("Removing background from {}", image.display());

        let output = self
            .backend
            .recorder()
            .track(service, image_input(image), async {
                let response = post_image(&self.backend, service, "/remove-bg", image).await?;
                let body: ProcessedImage = decode(service, &response)?;
                body.outcome.check(service, false)?;
                let processed_image_path =
                    required(service, "processed_image_path", body.processed_image_path)?;
                Ok::<_, CapabilityError>(ProcessedOutput {
                    processed_image_path,
                })
            })
            .await?;

        tracing::info!("Background removed, result at {}", output.processed_image_path);
        Ok(output.processed_image_path)
    }
}

pub struct HttpFaceRecognition {
    backend: Backend,
}

impl HttpFaceRecognition {
    const SERVICE: &'static str = "face-recognition";

    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl FaceRecognition for HttpFaceRecognition {
    async fn recognize_faces(&self, image: &Path) -> Result<Value, CapabilityError> {
        let service = Self::SERVICE;
        tracing::info!("Recognizing faces in {}", image.display());

        self.backend
            .recorder()
            .track(service, image_input(image), async {
                let response = post_image(&self.backend, service, "/recognize-face", image).await?;
                let body: Value = decode(service, &response)?;
                if !body.is_object() {
                    return Err(CapabilityError::Malformed {
                        service,
                        reason: "expected a JSON object".to_string(),
                    });
                }
                let outcome: Outcome = serde_json::from_value(body.clone()).unwrap_or_default();
                if outcome.error.is_some() {
                    outcome.check(service, false)?;
                }
                Ok::<_, CapabilityError>(body)
            })
            .await
    }
}

pub struct HttpOcr {
    backend: Backend,
}

impl HttpOcr {
    const SERVICE: &'static str = "ocr";

    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    text: String,
    #[serde(flatten)]
    outcome: Outcome,
}

#[derive(Debug, Serialize)]
struct OcrOutput {
    text: String,
}

#[async_trait]
impl Ocr for HttpOcr {
    async fn extract_text(&self, image: &Path) -> Result<String, CapabilityError> {
        let service = Self::SERVICE;
        tracing::info!("Running OCR on {}", image.display());

        let output = self
            .backend
            .recorder()
            .track(service, image_input(image), async {
                let response = post_image(&self.backend, service, "/ocr", image).await?;
                let body: OcrResponse = decode(service, &response)?;
                // OCR is only trusted when it says so explicitly.
                body.outcome.check(service, true)?;
                Ok::<_, CapabilityError>(OcrOutput { text: body.text })
            })
            .await?;
        Ok(output.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ServiceClient;
    use crate::task::{InMemoryTaskStore, TaskRecorder, TaskStatus, TaskStore};
    use crate::testing::MockBackend;
    use axum::{extract::Multipart, http::StatusCode, routing::post, Json, Router};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    fn backend(mock: &MockBackend, store: Arc<InMemoryTaskStore>) -> Backend {
        let client = ServiceClient::new(Duration::from_secs(5)).unwrap();
        Backend::new(client, &mock.base_url(), TaskRecorder::new(store))
    }

    fn image_file(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"fake image bytes").unwrap();
        path
    }

    async fn field_name(mut multipart: Multipart) -> String {
        let field = multipart.next_field().await.unwrap().unwrap();
        field.name().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_ocr_success() {
        let mock = MockBackend::start(Router::new().route(
            "/ocr",
            post(|multipart: Multipart| async move {
                assert_eq!(field_name(multipart).await, "image");
                Json(json!({"text": "TOTAL 9.99", "status": "success"}))
            }),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryTaskStore::new());

        let text = HttpOcr::new(backend(&mock, store.clone()))
            .extract_text(&image_file(&dir, "receipt.png"))
            .await
            .unwrap();
        assert_eq!(text, "TOTAL 9.99");

        let task = &store.list().await.unwrap()[0];
        assert_eq!(task.service_name, "ocr");
        assert_eq!(task.output_data, Some(json!({"text": "TOTAL 9.99"})));
    }

    #[tokio::test]
    async fn test_ocr_without_status_is_rejected() {
        let mock = MockBackend::start(Router::new().route(
            "/ocr",
            post(|| async { Json(json!({"text": "maybe"})) }),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();

        let err = HttpOcr::new(backend(&mock, Arc::new(InMemoryTaskStore::new())))
            .extract_text(&image_file(&dir, "a.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Rejected { service: "ocr", .. }));
    }

    #[tokio::test]
    async fn test_background_removal_503_fails_task() {
        let mock = MockBackend::start(Router::new().route(
            "/remove-bg",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryTaskStore::new());

        let err = HttpBackgroundRemoval::new(backend(&mock, store.clone()))
            .remove_background(&image_file(&dir, "cat.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Unreachable { .. }));

        let tasks = store.list().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_background_removal_returns_path() {
        let mock = MockBackend::start(Router::new().route(
            "/remove-bg",
            post(|| async { Json(json!({"processed_image_path": "/shared/images/out.png"})) }),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();

        let path = HttpBackgroundRemoval::new(backend(&mock, Arc::new(InMemoryTaskStore::new())))
            .remove_background(&image_file(&dir, "cat.jpg"))
            .await
            .unwrap();
        assert_eq!(path, "/shared/images/out.png");
    }

    #[tokio::test]
    async fn test_face_recognition_passthrough() {
        let result = json!({"faces": [{"box": [1, 2, 3, 4], "name": "unknown"}], "count": 1});
        let expected = result.clone();
        let mock = MockBackend::start(Router::new().route(
            "/recognize-face",
            post(move || {
                let result = result.clone();
                async move { Json(result) }
            }),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();

        let value = HttpFaceRecognition::new(backend(&mock, Arc::new(InMemoryTaskStore::new())))
            .recognize_faces(&image_file(&dir, "team.jpg"))
            .await
            .unwrap();
        assert_eq!(value, expected);
    }
}
