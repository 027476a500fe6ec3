use std::fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::backend::{Backend, SelectedBackend};

/// Correlates a request with the responses it produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A message plus the id of the request it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: RequestId,
    pub message: T,
}

impl<T> Envelope<T> {
    pub fn new(id: RequestId, message: T) -> Self {
        Self { id, message }
    }
}

impl Envelope<Request> {
    /// Wrap a request under a freshly generated id.
    pub fn request(message: Request) -> Self {
        Self::new(RequestId::new(), message)
    }
}

/// Requests the controller sends to the worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Load the model and bind a session.
    Handshake,
    /// Run inference over a single input vector.
    Run { input: Vec<f32> },
    /// Report the adopted backend and artifact load time.
    Stats,
    /// A message type this build does not understand. Ignored by the worker.
    #[serde(other)]
    Unknown,
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Handshake => "handshake",
            Request::Run { .. } => "run",
            Request::Stats => "stats",
            Request::Unknown => "unknown",
        }
    }
}

/// Messages the worker sends back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Progress narration. Never terminal.
    Status { message: String },

    /// Terminal response to [`Request::Handshake`].
    ///
    /// `success` with a `warning` is the degraded outcome: no backend could be
    /// bound and `backend` is the fallback sentinel. `success == false` means the
    /// artifact could not be loaded and `warning` carries the reason.
    HandshakeComplete {
        success: bool,
        backend: SelectedBackend,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        load_time_ms: Option<f64>,
    },

    /// Terminal response to [`Request::Run`].
    Result { output: Vec<f32>, duration_ms: f64 },

    /// Terminal response to [`Request::Stats`].
    Stats {
        #[serde(default)]
        backend: Option<Backend>,
        #[serde(default)]
        load_time_ms: Option<f64>,
    },

    /// Terminal response to any request that failed.
    Error { message: String },

    /// A message type this build does not understand. Ignored by the controller.
    #[serde(other)]
    Unknown,
}

impl Response {
    pub fn status(message: impl Into<String>) -> Self {
        Response::Status { message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error { message: message.into() }
    }

    /// Whether this response ends its request's in-flight interval.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Response::Status { .. } | Response::Unknown)
    }
}
