//! Worker configuration.

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::artifact::{ArtifactSource, FileSource};
use crate::backend::Backend;

/// Default location of the reference model
pub const DEFAULT_MODEL_PATH: &str = "models/double_vector.onnx";

/// Settings for one inference worker.
///
/// Every field has a default, so a partial JSON document such as
/// `{"backends": ["cpu"]}` is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Filesystem path, or `http(s)://` URL when the `http` feature is enabled
    pub model_path: String,

    /// Backend candidates, most preferred first
    pub backends: Vec<Backend>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            backends: Backend::PRIORITY.to_vec(),
        }
    }
}

impl WorkerConfig {
    pub fn with_model_path(mut self, model_path: impl Into<String>) -> Self {
        self.model_path = model_path.into();
        self
    }

    pub fn with_backends(mut self, backends: impl IntoIterator<Item = Backend>) -> Self {
        self.backends = backends.into_iter().collect();
        self
    }

    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The artifact source `model_path` points at.
    pub fn artifact_source(&self) -> Arc<dyn ArtifactSource> {
        #[cfg(feature = "http")]
        {
            if self.model_path.starts_with("http://") || self.model_path.starts_with("https://") {
                return Arc::new(crate::artifact::HttpSource::new(self.model_path.clone()));
            }
        }
        Arc::new(FileSource::new(&self.model_path))
    }
}
