use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use crate::artifact::ModelArtifact;
use crate::backend::{Backend, EngineError, InferenceEngine, InferenceSession};
use crate::tensor::constant::{INPUT_NAME, OUTPUT_NAME};
use crate::tensor::{NamedTensors, Tensor};

/// How a scripted backend behaves when asked for a session
#[derive(Clone, Debug)]
pub enum Availability {
    Available,
    Unavailable(String),
    Panics,
}

/// How sessions produced by the mock behave when run
#[derive(Clone, Debug)]
pub enum RunBehavior {
    /// Multiply every element by the factor (the reference model doubles)
    Scale(f32),
    Fails(String),
    NoOutput,
    Panics,
}

// A scriptable engine for testing
#[derive(Clone)]
pub struct MockEngine {
    availability: HashMap<Backend, Availability>,
    run: RunBehavior,
    attempts: Arc<Mutex<Vec<Backend>>>,
    runs: Arc<Mutex<usize>>,
}

impl MockEngine {
    /// Every backend available, sessions double their input.
    pub fn doubling() -> Self {
        Self {
            availability: HashMap::new(),
            run: RunBehavior::Scale(2.0),
            attempts: Default::default(),
            runs: Default::default(),
        }
    }

    pub fn with_backend(mut self, backend: Backend, availability: Availability) -> Self {
        self.availability.insert(backend, availability);
        self
    }

    pub fn unavailable(self, backend: Backend) -> Self {
        let reason = format!("{backend} adapter not found");
        self.with_backend(backend, Availability::Unavailable(reason))
    }

    pub fn with_run(mut self, run: RunBehavior) -> Self {
        self.run = run;
        self
    }

    /// Backends a session was requested for, in request order.
    pub fn attempts(&self) -> Vec<Backend> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn runs(&self) -> usize {
        *self.runs.lock().unwrap()
    }
}

#[async_trait]
impl InferenceEngine for MockEngine {
    async fn create_session(
        &self,
        artifact: &ModelArtifact,
        backend: Backend,
    ) -> Result<Box<dyn InferenceSession>, EngineError> {
        self.attempts.lock().unwrap().push(backend);
        assert!(!artifact.is_empty(), "sessions are only created from loaded artifacts");

        match self.availability.get(&backend).cloned().unwrap_or(Availability::Available) {
            Availability::Available => Ok(Box::new(MockSession {
                run: self.run.clone(),
                runs: self.runs.clone(),
            })),
            Availability::Unavailable(reason) => Err(reason.into()),
            Availability::Panics => panic!("driver crashed while initialising {backend}"),
        }
    }
}

struct MockSession {
    run: RunBehavior,
    runs: Arc<Mutex<usize>>,
}

#[async_trait]
impl InferenceSession for MockSession {
    async fn run(&self, mut inputs: NamedTensors) -> Result<NamedTensors, EngineError> {
        *self.runs.lock().unwrap() += 1;
        let input = inputs
            .remove(INPUT_NAME)
            .ok_or_else(|| format!("missing input tensor {INPUT_NAME:?}"))?;
        assert_eq!(input.shape(), &[input.len()], "input must be rank 1");

        match &self.run {
            RunBehavior::Scale(factor) => {
                let output = input.into_vec().into_iter().map(|v| v * factor).collect();
                Ok(NamedTensors::from([(OUTPUT_NAME.to_string(), Tensor::vector(output))]))
            }
            RunBehavior::Fails(reason) => Err(reason.clone().into()),
            RunBehavior::NoOutput => Ok(NamedTensors::new()),
            RunBehavior::Panics => panic!("kernel fault"),
        }
    }
}
