use serde::Serialize;
use tracing::warn;
use crate::backend::SelectedBackend;
use crate::protocol::Response;

pub const STATUS_INITIALIZING: &str = "Initializing";
pub const STATUS_READY: &str = "Model loaded successfully. Ready to run inference.";
pub const STATUS_RUNNING: &str = "Running inference...";
pub const STATUS_COMPLETE: &str = "Inference complete";

/// Everything the controller knows, last message wins.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ControllerState {
    /// Human readable phase label
    pub status: String,
    /// True from the moment a request is sent until its terminal response arrives
    pub loading: bool,
    pub selected_backend: Option<SelectedBackend>,
    pub last_error: Option<String>,
    pub last_result: Option<Vec<f32>>,
    pub last_inference_ms: Option<f64>,
    pub load_time_ms: Option<f64>,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            status: STATUS_INITIALIZING.to_string(),
            loading: false,
            selected_backend: None,
            last_error: None,
            last_result: None,
            last_inference_ms: None,
            load_time_ms: None,
        }
    }
}

impl ControllerState {
    /// A request has just been sent.
    pub(crate) fn begin_request(&mut self) {
        self.loading = true;
    }

    /// A run request has just been sent; the previous result is cleared.
    pub(crate) fn begin_run(&mut self) {
        self.loading = true;
        self.status = STATUS_RUNNING.to_string();
        self.last_result = None;
        self.last_inference_ms = None;
    }

    /// A request could not be handed to the worker at all.
    pub(crate) fn send_failed(&mut self, message: &str) {
        self.loading = false;
        self.status = format!("Error: {message}");
        self.last_error = Some(message.to_string());
    }

    /// Fold one worker message into the state.
    pub fn apply(&mut self, response: &Response) {
        match response {
            Response::Status { message } => {
                self.status = message.clone();
            }
            Response::HandshakeComplete { success: true, backend, warning, load_time_ms } => {
                self.loading = false;
                self.selected_backend = Some(*backend);
                self.load_time_ms = *load_time_ms;
                self.status = match warning {
                    Some(warning) => format!(
                        "Model loaded with warnings: {warning} - You may still be able to run inference."
                    ),
                    None => STATUS_READY.to_string(),
                };
            }
            Response::HandshakeComplete { success: false, warning, .. } => {
                let reason = warning.clone().unwrap_or_else(|| "unknown error".to_string());
                self.loading = false;
                self.status = format!("Error loading model: {reason}");
                self.last_error = Some(reason);
            }
            Response::Result { output, duration_ms } => {
                self.loading = false;
                self.status = STATUS_COMPLETE.to_string();
                self.last_result = Some(output.clone());
                self.last_inference_ms = Some(*duration_ms);
                self.last_error = None;
            }
            Response::Stats { backend, load_time_ms } => {
                self.loading = false;
                if let Some(backend) = backend {
                    self.selected_backend = Some((*backend).into());
                }
                if load_time_ms.is_some() {
                    self.load_time_ms = *load_time_ms;
                }
            }
            Response::Error { message } => {
                self.loading = false;
                self.status = format!("Error: {message}");
                self.last_error = Some(message.clone());
            }
            Response::Unknown => {
                warn!("Unknown message type from worker");
            }
        }
    }

    /// Pure form of [`ControllerState::apply`].
    pub fn reduce(mut self, response: &Response) -> Self {
        self.apply(response);
        self
    }
}
