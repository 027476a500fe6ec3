use std::fmt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::artifact::ModelArtifact;
use crate::tensor::NamedTensors;

/// Error type engines report back to the worker.
///
/// The worker never inspects it beyond its display text.
pub type EngineError = Box<dyn std::error::Error + Send + Sync>;

/// An execution capability a session can be bound to.
///
/// Candidates are tried in the order they appear in the worker configuration;
/// [`Backend::PRIORITY`] is the default order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Hardware accelerated execution (GPU or similar device)
    Accelerated,
    /// Generic host CPU execution
    Cpu,
}

impl Backend {
    /// Default descending preference order.
    pub const PRIORITY: [Backend; 2] = [Backend::Accelerated, Backend::Cpu];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Accelerated => "accelerated",
            Backend::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The backend reported on a completed handshake.
///
/// `Fallback` is a sentinel, not a capability: it is reported when no
/// candidate could be bound and the handshake degraded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SelectedBackend {
    Backend(Backend),
    Fallback,
}

impl SelectedBackend {
    pub const FALLBACK_NAME: &'static str = "fallback";

    /// The bound backend, if this is not the fallback sentinel.
    pub fn backend(&self) -> Option<Backend> {
        match self {
            SelectedBackend::Backend(backend) => Some(*backend),
            SelectedBackend::Fallback => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SelectedBackend::Fallback)
    }
}

impl From<Backend> for SelectedBackend {
    fn from(backend: Backend) -> Self {
        SelectedBackend::Backend(backend)
    }
}

impl From<SelectedBackend> for String {
    fn from(selected: SelectedBackend) -> Self {
        selected.to_string()
    }
}

impl TryFrom<String> for SelectedBackend {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "accelerated" => Ok(Backend::Accelerated.into()),
            "cpu" => Ok(Backend::Cpu.into()),
            SelectedBackend::FALLBACK_NAME => Ok(SelectedBackend::Fallback),
            other => Err(format!("unknown backend {other:?}")),
        }
    }
}

impl fmt::Display for SelectedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectedBackend::Backend(backend) => write!(f, "{backend}"),
            SelectedBackend::Fallback => f.write_str(Self::FALLBACK_NAME),
        }
    }
}

/// The external engine that turns a model artifact into runnable sessions.
///
/// Creating a session may allocate devices, so the worker only ever has one
/// creation attempt outstanding and tries candidates strictly one after another.
///
/// # Example
///
/// ```ignore
/// use kiln::backend::{Backend, EngineError, InferenceEngine, InferenceSession};
/// use kiln::artifact::ModelArtifact;
/// use async_trait::async_trait;
///
/// struct CpuOnly;
///
/// #[async_trait]
/// impl InferenceEngine for CpuOnly {
///     async fn create_session(
///         &self,
///         artifact: &ModelArtifact,
///         backend: Backend,
///     ) -> Result<Box<dyn InferenceSession>, EngineError> {
///         match backend {
///             Backend::Cpu => Ok(Box::new(MySession::compile(artifact.bytes())?)),
///             other => Err(format!("{other} is not supported").into()),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait InferenceEngine: Send + Sync + 'static {
    /// Bind `artifact` to `backend`, or explain why that backend is unavailable.
    async fn create_session(
        &self,
        artifact: &ModelArtifact,
        backend: Backend,
    ) -> Result<Box<dyn InferenceSession>, EngineError>;
}

/// A loaded model bound to one backend for its whole lifetime.
#[async_trait]
pub trait InferenceSession: Send + Sync {
    /// Execute the graph against named input tensors, returning named outputs.
    async fn run(&self, inputs: NamedTensors) -> Result<NamedTensors, EngineError>;
}
