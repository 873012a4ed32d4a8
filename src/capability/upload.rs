use async_trait::async_trait;

use super::{AudioUpload, CapabilityError};
use crate::upload::UploadDir;

/// Stores uploaded audio on local disk and serves it back under `/uploads/audio`.
pub struct LocalAudioUpload {
    dir: UploadDir,
    public_base_url: String,
}

impl LocalAudioUpload {
    pub fn new(dir: UploadDir, public_base_url: impl Into<String>) -> Self {
        Self {
            dir,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AudioUpload for LocalAudioUpload {
    async fn upload(&self, file_name: &str, content: &[u8]) -> Result<String, CapabilityError> {
        let path = self.dir.save(file_name, content).await?;
        let stored = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();

        tracing::info!("Stored audio upload {}", path.display());
        Ok(format!("{}/uploads/audio/{}", self.public_base_url, stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let tmp = tempfile::tempdir().unwrap();
        let upload = LocalAudioUpload::new(UploadDir::new(tmp.path()), "http://localhost:81/");

        let url = upload.upload("nested/voice.mp3", b"ID3").await.unwrap();
        let stored = url
            .strip_prefix("http://localhost:81/uploads/audio/")
            .unwrap();
        assert!(stored.ends_with("_voice.mp3"), "{}", url);
        assert_eq!(std::fs::read(tmp.path().join(stored)).unwrap(), b"ID3");
    }

    #[tokio::test]
    async fn test_repeated_upload_keeps_earlier_url() {
        let tmp = tempfile::tempdir().unwrap();
        let upload = LocalAudioUpload::new(UploadDir::new(tmp.path()), "http://localhost:81");

        let first = upload.upload("take.wav", b"first").await.unwrap();
        let second = upload.upload("take.wav", b"second").await.unwrap();
        assert_ne!(first, second);

        let stored = first.rsplit('/').next().unwrap();
        assert_eq!(std::fs::read(tmp.path().join(stored)).unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_upload_bad_name_is_storage_error() {
        let tmp = tempfile::tempdir().unwrap();
        let upload = LocalAudioUpload::new(UploadDir::new(tmp.path()), "http://localhost:81");

        let err = upload.upload("", b"ID3").await.unwrap_err();
        assert!(matches!(err, CapabilityError::Storage(_)));
    }
}
