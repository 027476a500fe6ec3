use std::path::PathBuf;
use async_trait::async_trait;
use tracing::debug;
use super::{ArtifactSource, ModelArtifact};
use crate::error::WorkerError;

/// Reads the artifact from the local filesystem.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ArtifactSource for FileSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<ModelArtifact, WorkerError> {
        let bytes = tokio::fs::read(&self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Read model artifact");
        Ok(ModelArtifact::new(bytes))
    }
}

/// Serves an artifact that is already in memory, e.g. one embedded with `include_bytes!`.
#[derive(Clone, Debug)]
pub struct InMemorySource {
    artifact: ModelArtifact,
}

impl InMemorySource {
    pub fn new(bytes: impl Into<std::sync::Arc<[u8]>>) -> Self {
        Self { artifact: ModelArtifact::new(bytes) }
    }
}

#[async_trait]
impl ArtifactSource for InMemorySource {
    fn location(&self) -> String {
        format!("<memory: {} bytes>", self.artifact.len())
    }

    async fn fetch(&self) -> Result<ModelArtifact, WorkerError> {
        Ok(self.artifact.clone())
    }
}
