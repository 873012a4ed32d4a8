//! Stand-in speech-recognition worker.
//!
//! Answers every request with a fixed transcript after a configurable delay,
//! recording the work as a task the same way a real worker would.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{health, json_body, require};
use crate::api::AudioUrlRequest;
use crate::error::AppError;
use crate::task::{NewTask, TaskStatus, TaskStore};

pub const SERVICE: &str = "speech-recognition";
pub const RECOGNIZED_TEXT: &str = "Recognized speech text";

pub struct RecognizerState {
    pub store: Arc<dyn TaskStore>,
    pub delay: Duration,
}

#[derive(Debug, Serialize)]
pub struct RecognitionResponse {
    pub text: String,
    pub transcript: String,
    pub status: String,
}

async fn recognize(
    State(state): State<Arc<RecognizerState>>,
    payload: Result<Json<AudioUrlRequest>, JsonRejection>,
) -> Result<Json<RecognitionResponse>, AppError> {
    let audio_url = require("audio_url", json_body(payload)?.audio_url)?;

    // This worker owns its record, so any store failure fails the request.
    let task = state
        .store
        .create(NewTask::new(SERVICE, json!({ "audio_url": audio_url })))
        .await?;
    tracing::info!("Task {} recognizing {}", task.id, audio_url);

    tokio::time::sleep(state.delay).await;

    state
        .store
        .finish(task.id, TaskStatus::Completed, json!({ "text": RECOGNIZED_TEXT }))
        .await?;

    Ok(Json(RecognitionResponse {
        text: RECOGNIZED_TEXT.to_string(),
        transcript: RECOGNIZED_TEXT.to_string(),
        status: "success".to_string(),
    }))
}

pub fn create_router(state: Arc<RecognizerState>) -> Router {
    Router::new()
        .route("/recognize", post(recognize))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{InMemoryTaskStore, StoreError, StoreResult, Task, TaskId};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    struct ReadOnlyStore;

    #[async_trait]
    impl TaskStore for ReadOnlyStore {
        async fn create(&self, _task: NewTask) -> StoreResult<Task> {
            Err(StoreError::persistence(std::io::Error::other("read-only")))
        }

        async fn finish(&self, id: TaskId, _status: TaskStatus, _output: Value) -> StoreResult<Task> {
            Err(StoreError::NotFound(id))
        }

        async fn find_by_id(&self, _id: TaskId) -> StoreResult<Option<Task>> {
            Ok(None)
        }

        async fn list(&self) -> StoreResult<Vec<Task>> {
            Ok(Vec::new())
        }
    }

    /// Accepts new tasks but cannot update them.
    struct NoUpdateStore(InMemoryTaskStore);

    #[async_trait]
    impl TaskStore for NoUpdateStore {
        async fn create(&self, task: NewTask) -> StoreResult<Task> {
            self.0.create(task).await
        }

        async fn finish(&self, _id: TaskId, _status: TaskStatus, _output: Value) -> StoreResult<Task> {
            Err(StoreError::persistence(std::io::Error::other("update failed")))
        }

        async fn find_by_id(&self, id: TaskId) -> StoreResult<Option<Task>> {
            self.0.find_by_id(id).await
        }

        async fn list(&self) -> StoreResult<Vec<Task>> {
            self.0.list().await
        }
    }

    fn router(store: Arc<dyn TaskStore>) -> Router {
        create_router(Arc::new(RecognizerState {
            store,
            delay: Duration::ZERO,
        }))
    }

    fn recognize_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/recognize")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_recognize_completes_task() {
        let store = Arc::new(InMemoryTaskStore::new());

        let response = router(store.clone())
            .oneshot(recognize_request(r#"{"audio_url":"http://files.test/a.wav"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            json!({
                "text": RECOGNIZED_TEXT,
                "transcript": RECOGNIZED_TEXT,
                "status": "success"
            })
        );

        let task = &store.list().await.unwrap()[0];
        assert_eq!(task.service_name, SERVICE);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.output_data, Some(json!({"text": RECOGNIZED_TEXT})));
    }

    #[tokio::test]
    async fn test_missing_audio_url_writes_no_task() {
        let store = Arc::new(InMemoryTaskStore::new());

        let response = router(store.clone())
            .oneshot(recognize_request("{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_task_update_failure_is_500() {
        let response = router(Arc::new(NoUpdateStore(InMemoryTaskStore::new())))
            .oneshot(recognize_request(r#"{"audio_url":"http://files.test/a.wav"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "STORAGE_ERROR");
    }

    #[tokio::test]
    async fn test_task_create_failure_is_500() {
        let response = router(Arc::new(ReadOnlyStore))
            .oneshot(recognize_request(r#"{"audio_url":"http://files.test/a.wav"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
