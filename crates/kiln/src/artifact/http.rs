use async_trait::async_trait;
use tracing::debug;
use super::{ArtifactSource, ModelArtifact};
use crate::error::WorkerError;

/// Downloads the artifact over HTTP(S).
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl ArtifactSource for HttpSource {
    fn location(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<ModelArtifact, WorkerError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| WorkerError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::Fetch(format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )
            .trim_end()
            .to_string()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WorkerError::Fetch(e.to_string()))?;
        debug!(url = %self.url, bytes = bytes.len(), "Downloaded model artifact");
        Ok(ModelArtifact::new(bytes.to_vec()))
    }
}
