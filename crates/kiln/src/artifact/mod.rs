//! Model artifact loading.
//!
//! The artifact is an opaque byte buffer. It is fetched once per handshake by an
//! [`ArtifactSource`] and then shared, read-only, with every session the engine
//! creates from it.

mod file;
#[cfg_attr(docsrs, doc(cfg(feature = "http")))]
#[cfg(feature = "http")]
mod http;

use std::sync::Arc;
use async_trait::async_trait;
use crate::error::WorkerError;

pub use file::{FileSource, InMemorySource};
#[cfg(feature = "http")]
pub use http::HttpSource;

/// The trained model graph, immutable once fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelArtifact {
    bytes: Arc<[u8]>,
}

impl ModelArtifact {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Where the worker fetches its model from.
#[async_trait]
pub trait ArtifactSource: Send + Sync + 'static {
    /// Human readable location, used in logs.
    fn location(&self) -> String;

    /// Fetch the complete artifact. Any failure is fatal to the handshake.
    async fn fetch(&self) -> Result<ModelArtifact, WorkerError>;
}
