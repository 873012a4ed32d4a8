//! Outbound HTTP client shared by every backend adapter.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Longest slice of an error body kept for diagnostics.
const MAX_ERROR_BODY: usize = 2048;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("service call failed: {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("service call failed: {url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("service call failed: could not build request for {url}: {reason}")]
    Encode { url: String, reason: String },
}

/// Request body for an outbound call.
#[derive(Debug, Clone)]
pub enum Payload {
    Empty,
    Json(Value),
    /// A local file sent as multipart form data under `field`.
    File { field: &'static str, path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ServiceResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
}

impl ServiceClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub async fn call(
        &self,
        method: Method,
        url: &str,
        payload: Payload,
        headers: &HeaderMap,
    ) -> Result<ServiceResponse, ClientError> {
        let mut request = self.http.request(method.clone(), url).headers(headers.clone());

        request = match payload {
            Payload::Empty => request,
            // `.json` sets `Content-Type: application/json`.
            Payload::Json(body) => request.json(&body),
            Payload::File { field, path } => {
                let unreadable = |e: std::io::Error| ClientError::Encode {
                    url: url.to_string(),
                    reason: format!("cannot read {}: {}", path.display(), e),
                };
                let file = tokio::fs::File::open(&path).await.map_err(unreadable)?;
                let length = file.metadata().await.map_err(unreadable)?.len();
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_else(|| field.to_string());
                // Streamed from disk; the length lets reqwest send Content-Length.
                let part = Part::stream_with_length(Body::from(file), length).file_name(file_name);
                request.multipart(Form::new().part(field, part))
            }
        };

        tracing::debug!("{} {}", method, url);

        let response = request.send().await.map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let body: String = text.chars().take(MAX_ERROR_BODY).collect();
            tracing::error!("{} {} returned {}: {}", method, url, status, body);
            return Err(ClientError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }

        Ok(ServiceResponse { status, body })
    }

    pub async fn get(&self, url: &str) -> Result<ServiceResponse, ClientError> {
        self.call(Method::GET, url, Payload::Empty, &HeaderMap::new())
            .await
    }

    pub async fn post_json(&self, url: &str, body: Value) -> Result<ServiceResponse, ClientError> {
        self.call(Method::POST, url, Payload::Json(body), &HeaderMap::new())
            .await
    }

    pub async fn post_file(
        &self,
        url: &str,
        field: &'static str,
        path: PathBuf,
    ) -> Result<ServiceResponse, ClientError> {
        self.call(
            Method::POST,
            url,
            Payload::File { field, path },
            &HeaderMap::new(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use axum::{
        extract::Multipart,
        http::{header, HeaderMap as AxumHeaders, StatusCode as AxumStatus},
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;

    fn client() -> ServiceClient {
        ServiceClient::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_json_body_sets_content_type() {
        let backend = MockBackend::start(Router::new().route(
            "/echo",
            post(|headers: AxumHeaders, Json(body): Json<Value>| async move {
                let content_type = headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "content_type": content_type, "body": body }))
            }),
        ))
        .await;

        let response = client()
            .post_json(&backend.url("/echo"), json!({"text": "hi"}))
            .await
            .unwrap();
        let echoed: Value = response.json().unwrap();
        assert_eq!(echoed["content_type"], "application/json");
        assert_eq!(echoed["body"]["text"], "hi");
    }

    #[tokio::test]
    async fn test_non_2xx_is_error_with_status_and_body() {
        let backend = MockBackend::start(Router::new().route(
            "/down",
            get(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "maintenance") }),
        ))
        .await;

        let err = client().get(&backend.url("/down")).await.unwrap_err();
        match &err {
            ClientError::Status { status, body, .. } => {
                assert_eq!(*status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("service call failed"));
    }

    #[tokio::test]
    async fn test_file_sent_as_multipart() {
        let backend = MockBackend::start(Router::new().route(
            "/upload",
            post(|mut multipart: Multipart| async move {
                let field = multipart.next_field().await.unwrap().unwrap();
                let name = field.name().unwrap_or_default().to_string();
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.unwrap();
                Json(json!({ "field": name, "file_name": file_name, "len": data.len() }))
            }),
        ))
        .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        std::fs::write(&path, b"\x89PNG fake").unwrap();

        let response = client()
            .post_file(&backend.url("/upload"), "image", path)
            .await
            .unwrap();
        let seen: Value = response.json().unwrap();
        assert_eq!(seen["field"], "image");
        assert_eq!(seen["file_name"], "receipt.png");
        assert_eq!(seen["len"], 9);
    }

    #[tokio::test]
    async fn test_missing_file_is_encode_error() {
        let err = client()
            .post_file("http://127.0.0.1:9/unused", "image", "/nonexistent/x.png".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Encode { .. }));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let backend = MockBackend::start(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too late"
            }),
        ))
        .await;

        let client = ServiceClient::new(Duration::from_millis(100)).unwrap();
        let err = client.get(&backend.url("/slow")).await.unwrap_err();
        match &err {
            ClientError::Transport { source, .. } => assert!(source.is_timeout()),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("service call failed"));
    }

    #[tokio::test]
    async fn test_unreachable_is_transport_error() {
        let err = client().get("http://127.0.0.1:9/nothing").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
    }
}
