//! Error types for the worker, the controller and the wire protocol.

use thiserror::Error;

/// Failures raised while servicing a single worker request.
///
/// None of these terminate the worker. Each one is turned into an
/// [`crate::protocol::Response::Error`] carrying its display text.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to load model: {0}")]
    Fetch(String),

    #[error("Failed to load model: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model not loaded. Call load first.")]
    ModelNotLoaded,

    #[error("No available execution provider (last error: {last})")]
    NoBackendAvailable { last: String },

    #[error("Backend {backend} failed to create a session: {reason}")]
    Backend { backend: String, reason: String },

    #[error("Inference failed: {0}")]
    Session(String),

    #[error("Session produced no tensor named {0:?}")]
    MissingOutput(String),

    #[error("No input provided for run command")]
    EmptyInput,

    #[error("Inference engine panicked: {0}")]
    EnginePanic(String),
}

/// Rejections of user supplied input, raised by the controller before anything is sent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Invalid input. Please enter comma-separated numbers.")]
    Empty,

    #[error("Invalid input {token:?} at position {position}. Please enter comma-separated numbers.")]
    InvalidNumber { position: usize, token: String },
}

/// Failures moving envelopes across a framed transport.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker channel closed")]
    ChannelClosed,
}
