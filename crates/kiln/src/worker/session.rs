use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use futures::FutureExt;
use tracing::{debug, info, warn};
use crate::artifact::{ArtifactSource, ModelArtifact};
use crate::backend::{Backend, InferenceEngine, InferenceSession, SelectedBackend};
use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::tensor::constant::{INPUT_NAME, OUTPUT_NAME};
use crate::tensor::{NamedTensors, Tensor};

/// Where the worker is in its load → bind → run cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerPhase {
    Uninitialized,
    Loading,
    SessionCreating,
    Ready(Backend),
    Running(Backend),
    /// Every backend failed; the handshake still succeeded, with this warning.
    Degraded(String),
    /// The last step failed. The worker keeps accepting requests.
    Failed(String),
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerPhase::Uninitialized => f.write_str("uninitialized"),
            WorkerPhase::Loading => f.write_str("loading"),
            WorkerPhase::SessionCreating => f.write_str("session-creating"),
            WorkerPhase::Ready(backend) => write!(f, "ready({backend})"),
            WorkerPhase::Running(backend) => write!(f, "running({backend})"),
            WorkerPhase::Degraded(warning) => write!(f, "degraded({warning})"),
            WorkerPhase::Failed(error) => write!(f, "failed({error})"),
        }
    }
}

/// Outcome of a handshake, ready to be put on the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct HandshakeOutcome {
    pub success: bool,
    pub backend: SelectedBackend,
    pub warning: Option<String>,
    pub load_time_ms: Option<f64>,
}

/// Output of one successful inference.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutput {
    pub output: Vec<f32>,
    pub duration: Duration,
}

/// A session together with the one backend it was created on.
struct BoundSession {
    backend: Backend,
    session: Box<dyn InferenceSession>,
}

/// Owns the model artifact, the session and the backend fallback policy.
///
/// Only the worker task touches this value, so nothing in it is synchronised.
pub struct SessionLifecycle {
    engine: Arc<dyn InferenceEngine>,
    source: Arc<dyn ArtifactSource>,
    backends: Vec<Backend>,
    artifact: Option<ModelArtifact>,
    session: Option<BoundSession>,
    phase: WorkerPhase,
    load_time: Option<Duration>,
}

impl SessionLifecycle {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        source: Arc<dyn ArtifactSource>,
        backends: Vec<Backend>,
    ) -> Self {
        Self {
            engine,
            source,
            backends,
            artifact: None,
            session: None,
            phase: WorkerPhase::Uninitialized,
            load_time: None,
        }
    }

    pub fn from_config(engine: Arc<dyn InferenceEngine>, config: &WorkerConfig) -> Self {
        Self::new(engine, config.artifact_source(), config.backends.clone())
    }

    pub fn phase(&self) -> &WorkerPhase {
        &self.phase
    }

    /// The backend the live session is bound to, if any.
    pub fn backend(&self) -> Option<Backend> {
        self.session.as_ref().map(|bound| bound.backend)
    }

    pub fn load_time_ms(&self) -> Option<f64> {
        self.load_time.map(duration_ms)
    }

    /// Fetch the artifact. Failure leaves the worker in [`WorkerPhase::Failed`].
    pub async fn load(&mut self) -> Result<(), WorkerError> {
        self.phase = WorkerPhase::Loading;
        info!(location = %self.source.location(), "Loading model");

        let start = Instant::now();
        match self.source.fetch().await {
            Ok(artifact) => {
                self.load_time = Some(start.elapsed());
                info!(bytes = artifact.len(), load_time_ms = self.load_time_ms(), "Model loaded");
                self.artifact = Some(artifact);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Error loading model");
                self.phase = WorkerPhase::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Try each backend candidate in order and adopt the first that binds.
    ///
    /// Candidates are attempted one at a time; a later one is only tried after
    /// the previous attempt has definitively failed. An unavailable candidate is
    /// logged and skipped. Only exhausting the whole list is an error.
    pub async fn create_session(&mut self) -> Result<Backend, WorkerError> {
        let Some(artifact) = self.artifact.clone() else {
            self.phase = WorkerPhase::Failed(WorkerError::ModelNotLoaded.to_string());
            return Err(WorkerError::ModelNotLoaded);
        };
        self.phase = WorkerPhase::SessionCreating;

        let mut last = String::from("no backends configured");
        for backend in self.backends.clone() {
            debug!(%backend, "Trying execution provider");
            match self.attempt(&artifact, backend).await {
                Ok(session) => {
                    info!(%backend, "Successfully created session");
                    self.session = Some(BoundSession { backend, session });
                    self.phase = WorkerPhase::Ready(backend);
                    return Ok(backend);
                }
                Err(e) => {
                    warn!(%backend, error = %e, "Execution provider not available");
                    last = e.to_string();
                }
            }
        }

        let err = WorkerError::NoBackendAvailable { last };
        self.phase = WorkerPhase::Failed(err.to_string());
        Err(err)
    }

    async fn attempt(
        &self,
        artifact: &ModelArtifact,
        backend: Backend,
    ) -> Result<Box<dyn InferenceSession>, WorkerError> {
        let creation = AssertUnwindSafe(self.engine.create_session(artifact, backend))
            .catch_unwind()
            .await
            .map_err(|panic| WorkerError::EnginePanic(panic_message(panic)))?;

        creation.map_err(|e| WorkerError::Backend {
            backend: backend.to_string(),
            reason: e.to_string(),
        })
    }

    /// Load the model and bind a session, degrading rather than failing when
    /// no backend is available.
    ///
    /// `status` is called with progress narration before each step.
    pub async fn handshake(&mut self, mut status: impl FnMut(&str)) -> HandshakeOutcome {
        if let Some(backend) = self.backend() {
            debug!(%backend, "Handshake repeated; reporting existing session");
            return self.outcome(backend.into(), None);
        }

        status("Loading model...");
        if let Err(e) = self.load().await {
            return HandshakeOutcome {
                success: false,
                backend: SelectedBackend::Fallback,
                warning: Some(e.to_string()),
                load_time_ms: None,
            };
        }

        status("Creating session...");
        match self.create_session().await {
            Ok(backend) => self.outcome(backend.into(), None),
            Err(e) => {
                let warning = e.to_string();
                warn!(%warning, "All backends failed; continuing in degraded mode");
                self.phase = WorkerPhase::Degraded(warning.clone());
                self.outcome(SelectedBackend::Fallback, Some(warning))
            }
        }
    }

    fn outcome(&self, backend: SelectedBackend, warning: Option<String>) -> HandshakeOutcome {
        HandshakeOutcome {
            success: true,
            backend,
            warning,
            load_time_ms: self.load_time_ms(),
        }
    }

    /// Run one inference over `input`.
    ///
    /// With no live session this makes exactly one lazy attempt to get one
    /// (fetching the artifact first if it was never loaded). If that attempt
    /// fails the run fails; nothing is retried.
    pub async fn run(&mut self, input: Vec<f32>) -> Result<RunOutput, WorkerError> {
        if input.is_empty() {
            return Err(WorkerError::EmptyInput);
        }

        if self.session.is_none() {
            warn!("Session not created before run. Attempting to create now.");
            if self.artifact.is_none() {
                self.load().await?;
            }
            self.create_session().await?;
        }

        let Some(bound) = self.session.as_ref() else {
            return Err(WorkerError::ModelNotLoaded);
        };
        let backend = bound.backend;
        self.phase = WorkerPhase::Running(backend);

        let inputs = NamedTensors::from([(INPUT_NAME.to_string(), Tensor::vector(input))]);
        let start = Instant::now();
        let result = AssertUnwindSafe(bound.session.run(inputs))
            .catch_unwind()
            .await
            .map_err(|panic| WorkerError::EnginePanic(panic_message(panic)))
            .and_then(|run| run.map_err(|e| WorkerError::Session(e.to_string())))
            .and_then(|mut outputs| {
                outputs
                    .remove(OUTPUT_NAME)
                    .ok_or_else(|| WorkerError::MissingOutput(OUTPUT_NAME.to_string()))
            })
            .and_then(|output| match output.data().iter().position(|v| !v.is_finite()) {
                Some(idx) => Err(WorkerError::Session(format!(
                    "output element {idx} is not a finite number"
                ))),
                None => Ok(output),
            });
        let duration = start.elapsed();

        match result {
            Ok(output) => {
                self.phase = WorkerPhase::Ready(backend);
                debug!(%backend, elements = output.len(), duration_ms = duration_ms(duration), "Inference complete");
                Ok(RunOutput { output: output.into_vec(), duration })
            }
            Err(e) => {
                self.phase = WorkerPhase::Failed(e.to_string());
                Err(e)
            }
        }
    }
}

pub(crate) fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
