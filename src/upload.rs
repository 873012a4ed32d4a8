//! Local media directories for uploaded files.

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes `content` under the directory as `{uuid}_{name}`, where `name`
    /// is the final path component of `file_name`. Every call gets its own
    /// file. Returns the path written.
    pub async fn save(&self, file_name: &str, content: &[u8]) -> io::Result<PathBuf> {
        let name = sanitize_file_name(file_name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unusable file name '{}'", file_name),
            )
        })?;

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(format!("{}_{}", Uuid::new_v4().simple(), name));
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(content).await?;
        file.flush().await?;
        tracing::debug!("Saved {} bytes to {}", content.len(), path.display());
        Ok(path)
    }
}

/// Final path component of a client-supplied name, if it has one.
pub fn sanitize_file_name(file_name: &str) -> Option<String> {
    // Clients on Windows send backslash-separated names.
    let normalized = file_name.replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
}
