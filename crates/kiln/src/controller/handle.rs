use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use super::input::parse_input;
use super::state::ControllerState;
use crate::error::InputError;
use crate::protocol::{Envelope, Request, RequestId, Response};
use crate::worker::WorkerHandle;

/// What happened to a request the caller asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// The request was handed to the worker.
    Sent(RequestId),
    /// Another request is still in flight; nothing was sent.
    Busy,
    /// The model never loaded, or the worker is gone; nothing was sent.
    Unavailable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Readiness {
    Pending,
    Ready,
    Failed,
}

type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Foreground side of the protocol.
///
/// Owns the [`ControllerState`], the worker handle and the single-request-in-flight
/// guard. The handshake is sent exactly once, when the controller is created.
/// Responses are only consumed when the caller drives [`Controller::next_message`]
/// (or [`Controller::settle`]), so the controller never blocks on the worker.
pub struct Controller {
    worker: Option<WorkerHandle>,
    responses: Option<UnboundedReceiver<Envelope<Response>>>,
    state: ControllerState,
    in_flight: Option<RequestId>,
    readiness: Readiness,
    publisher: watch::Sender<ControllerState>,
    on_error: Option<ErrorCallback>,
}

impl Controller {
    /// Take ownership of a freshly spawned worker and send it the handshake.
    pub fn new(worker: WorkerHandle, responses: UnboundedReceiver<Envelope<Response>>) -> Self {
        let (publisher, _) = watch::channel(ControllerState::default());
        let mut controller = Self {
            worker: Some(worker),
            responses: Some(responses),
            state: ControllerState::default(),
            in_flight: None,
            readiness: Readiness::Pending,
            publisher,
            on_error: None,
        };

        if let Dispatch::Unavailable = controller.dispatch(Request::Handshake) {
            controller.readiness = Readiness::Failed;
        }
        controller
    }

    /// Register an observer that is called with every error message.
    pub fn with_error_callback(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Observe every state change.
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.publisher.subscribe()
    }

    pub fn is_terminated(&self) -> bool {
        self.worker.is_none()
    }

    /// Send a run request, unless one is already in flight.
    pub fn run(&mut self, input: Vec<f32>) -> Dispatch {
        if self.in_flight.is_some() {
            debug!("Run requested while a request is in flight; ignoring");
            return Dispatch::Busy;
        }
        if self.readiness == Readiness::Failed {
            return Dispatch::Unavailable;
        }
        self.dispatch(Request::Run { input })
    }

    /// Validate user text and send it as a run request.
    ///
    /// Validation errors are returned synchronously and never reach the worker.
    pub fn run_text(&mut self, text: &str) -> Result<Dispatch, InputError> {
        let input = parse_input(text)?;
        Ok(self.run(input))
    }

    /// Ask the worker for its backend and load time.
    pub fn request_stats(&mut self) -> Dispatch {
        if self.in_flight.is_some() {
            return Dispatch::Busy;
        }
        self.dispatch(Request::Stats)
    }

    fn dispatch(&mut self, request: Request) -> Dispatch {
        let Some(worker) = self.worker.as_ref() else {
            return Dispatch::Unavailable;
        };

        let is_run = matches!(request, Request::Run { .. });
        let envelope = Envelope::request(request);
        let id = envelope.id;
        debug!(%id, kind = envelope.message.kind(), "Sending request");

        match worker.send(envelope) {
            Ok(()) => {
                self.in_flight = Some(id);
                if is_run {
                    self.state.begin_run();
                } else {
                    self.state.begin_request();
                }
                self.publish();
                Dispatch::Sent(id)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "Failed to send request to worker");
                self.state.send_failed(&message);
                self.report_error(&message);
                self.publish();
                Dispatch::Unavailable
            }
        }
    }

    /// Wait for the next worker message and fold it into the state.
    ///
    /// Returns `None` once the controller is terminated or the worker has gone
    /// away; the state is left as it was.
    pub async fn next_message(&mut self) -> Option<&ControllerState> {
        let envelope = self.responses.as_mut()?.recv().await;
        let Some(Envelope { id, message }) = envelope else {
            info!("Worker response channel closed");
            self.responses = None;
            return None;
        };

        if self.in_flight != Some(id) {
            warn!(%id, "Ignoring response for a request that is not in flight");
            return Some(&self.state);
        }

        self.state.apply(&message);
        match &message {
            Response::HandshakeComplete { success, .. } => {
                self.readiness = if *success { Readiness::Ready } else { Readiness::Failed };
                if !success {
                    if let Some(error) = self.state.last_error.clone() {
                        self.report_error(&error);
                    }
                }
            }
            Response::Error { message } => self.report_error(message),
            _ => {}
        }
        if message.is_terminal() {
            self.in_flight = None;
        }
        self.publish();
        Some(&self.state)
    }

    /// Process messages until no request is in flight.
    pub async fn settle(&mut self) -> &ControllerState {
        while self.in_flight.is_some() {
            if self.next_message().await.is_none() {
                break;
            }
        }
        &self.state
    }

    /// Stop the worker. No further messages are processed and the state is frozen.
    ///
    /// The response receiver is dropped here, so anything the aborted task still
    /// emits is discarded rather than applied.
    pub fn terminate(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.terminate();
        }
        self.responses = None;
        self.in_flight = None;
    }

    fn report_error(&self, message: &str) {
        if let Some(callback) = &self.on_error {
            callback(message);
        }
    }

    fn publish(&self) {
        self.publisher.send_replace(self.state.clone());
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use crate::artifact::{FileSource, InMemorySource};
    use crate::backend::mock_engine::{MockEngine, RunBehavior};
    use crate::backend::{Backend, SelectedBackend};
    use crate::controller::state::{STATUS_COMPLETE, STATUS_READY, STATUS_RUNNING};
    use crate::worker::SessionLifecycle;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn controller(engine: &MockEngine) -> Controller {
        init_tracing();
        let (worker, responses) = WorkerHandle::spawn(SessionLifecycle::new(
            Arc::new(engine.clone()),
            Arc::new(InMemorySource::new(b"double".to_vec())),
            Backend::PRIORITY.to_vec(),
        ));
        Controller::new(worker, responses)
    }

    #[tokio::test]
    async fn test_handshake_sent_on_creation() {
        let engine = MockEngine::doubling();
        let mut controller = controller(&engine);
        assert!(controller.state().loading);

        let state = controller.settle().await;

        assert!(!state.loading);
        assert_eq!(state.status, STATUS_READY);
        assert_eq!(state.selected_backend, Some(SelectedBackend::Backend(Backend::Accelerated)));
        assert_eq!(engine.attempts(), vec![Backend::Accelerated]);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let engine = MockEngine::doubling();
        let mut controller = controller(&engine);
        controller.settle().await;

        let dispatch = controller.run_text("1,2,3,4").unwrap();
        assert!(matches!(dispatch, Dispatch::Sent(_)));
        assert!(controller.state().loading);
        assert_eq!(controller.state().status, STATUS_RUNNING);

        let state = controller.settle().await;
        assert!(!state.loading);
        assert_eq!(state.status, STATUS_COMPLETE);
        assert_eq!(state.last_result, Some(vec![2.0, 4.0, 6.0, 8.0]));
        assert!(state.last_inference_ms.unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_loading_toggles_once_per_request() {
        let engine = MockEngine::doubling();
        let mut controller = controller(&engine);
        controller.settle().await;
        let mut states = controller.subscribe();
        states.borrow_and_update();

        controller.run(vec![1.0]);
        let mut observed = vec![states.borrow_and_update().loading];
        while controller.state().loading {
            controller.next_message().await.unwrap();
            observed.push(states.borrow_and_update().loading);
        }

        // true while sent, narrated and running, false exactly once at the end
        assert_eq!(observed.iter().filter(|loading| !**loading).count(), 1);
        assert_eq!(observed.last(), Some(&false));
        assert!(observed[..observed.len() - 1].iter().all(|loading| *loading));
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_worker() {
        let engine = MockEngine::doubling();
        let mut controller = controller(&engine);
        controller.settle().await;
        let before = controller.state().clone();

        let err = controller.run_text("1,2,x,4").unwrap_err();

        assert_eq!(err, InputError::InvalidNumber { position: 3, token: "x".to_string() });
        assert_eq!(controller.state(), &before);
        assert_eq!(engine.runs(), 0);
    }

    #[tokio::test]
    async fn test_second_run_while_loading_is_noop() {
        let engine = MockEngine::doubling();
        let mut controller = controller(&engine);
        controller.settle().await;

        let first = controller.run(vec![1.0, 2.0]);
        let second = controller.run(vec![9.0]);
        assert!(matches!(first, Dispatch::Sent(_)));
        assert_eq!(second, Dispatch::Busy);

        let state = controller.settle().await;
        assert_eq!(state.last_result, Some(vec![2.0, 4.0]));
        assert_eq!(engine.runs(), 1);
    }

    #[tokio::test]
    async fn test_run_during_handshake_is_noop() {
        let engine = MockEngine::doubling();
        let mut controller = controller(&engine);

        assert_eq!(controller.run(vec![1.0]), Dispatch::Busy);
        assert_eq!(controller.request_stats(), Dispatch::Busy);

        controller.settle().await;
        assert_eq!(engine.runs(), 0);
    }

    #[tokio::test]
    async fn test_degraded_handshake_still_allows_runs() {
        let engine = MockEngine::doubling()
            .unavailable(Backend::Accelerated)
            .unavailable(Backend::Cpu);
        let errors = Arc::new(Mutex::new(vec![]));
        let mut controller = controller(&engine).with_error_callback({
            let errors = errors.clone();
            move |message| errors.lock().unwrap().push(message.to_string())
        });

        let state = controller.settle().await;
        assert!(state.status.starts_with("Model loaded with warnings: No available execution provider"));
        assert_eq!(state.selected_backend, Some(SelectedBackend::Fallback));
        assert!(errors.lock().unwrap().is_empty());

        // the lazy session attempt fails again, surfacing as an error response
        assert!(matches!(controller.run(vec![1.0]), Dispatch::Sent(_)));
        let state = controller.settle().await;
        assert!(!state.loading);
        assert!(state.status.starts_with("Error: No available execution provider"));
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_handshake_blocks_runs() {
        init_tracing();
        let engine = MockEngine::doubling();
        let (worker, responses) = WorkerHandle::spawn(SessionLifecycle::new(
            Arc::new(engine.clone()),
            Arc::new(FileSource::new("/no/such/double_vector.onnx")),
            Backend::PRIORITY.to_vec(),
        ));
        let errors = Arc::new(Mutex::new(vec![]));
        let mut controller = Controller::new(worker, responses).with_error_callback({
            let errors = errors.clone();
            move |message| errors.lock().unwrap().push(message.to_string())
        });

        let state = controller.settle().await;
        assert!(!state.loading);
        assert!(state.status.starts_with("Error loading model: Failed to load model"));
        assert_eq!(errors.lock().unwrap().len(), 1);

        assert_eq!(controller.run(vec![1.0]), Dispatch::Unavailable);
        assert_eq!(engine.runs(), 0);
    }

    #[tokio::test]
    async fn test_run_error_then_recover() {
        let engine = MockEngine::doubling().with_run(RunBehavior::Fails("device lost".to_string()));
        let mut controller = controller(&engine);
        controller.settle().await;

        controller.run(vec![1.0]);
        let state = controller.settle().await;
        assert_eq!(state.status, "Error: Inference failed: device lost");
        assert!(!state.loading);

        // the worker is still alive and answers the next request
        assert!(matches!(controller.request_stats(), Dispatch::Sent(_)));
        let state = controller.settle().await;
        assert!(!state.loading);
        assert_eq!(state.selected_backend, Some(SelectedBackend::Backend(Backend::Accelerated)));
    }

    #[tokio::test]
    async fn test_terminate_freezes_state() {
        let engine = MockEngine::doubling();
        let mut controller = controller(&engine);
        controller.settle().await;
        controller.run(vec![1.0]);
        let frozen = controller.state().clone();

        controller.terminate();

        assert!(controller.is_terminated());
        assert!(controller.next_message().await.is_none());
        assert_eq!(controller.state(), &frozen);
        assert_eq!(controller.run(vec![2.0]), Dispatch::Unavailable);
        assert_eq!(controller.state(), &frozen);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_terminate_mid_run_discards_late_responses() {
        let engine = MockEngine::doubling();
        let mut controller = controller(&engine);
        controller.settle().await;
        let mut updates = controller.subscribe();

        controller.run(vec![1.0, 2.0]);
        tokio::task::yield_now().await;
        controller.terminate();
        let frozen = controller.state().clone();
        updates.borrow_and_update();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(controller.next_message().await.is_none());
        assert_eq!(controller.state(), &frozen);
        assert!(controller.state().last_result.is_none());
        assert!(!updates.has_changed().unwrap_or(false));
    }

    #[tokio::test]
    async fn test_stale_responses_are_ignored() {
        let engine = MockEngine::doubling();
        let (worker, responses) = WorkerHandle::spawn(SessionLifecycle::new(
            Arc::new(engine.clone()),
            Arc::new(InMemorySource::new(b"double".to_vec())),
            Backend::PRIORITY.to_vec(),
        ));
        // a request the controller does not know about
        worker.send(Envelope::request(Request::Stats)).unwrap();
        let mut controller = Controller::new(worker, responses);

        let stale = controller.next_message().await.unwrap().clone();
        assert!(stale.loading, "stats answer for a foreign id must not end the handshake");

        let state = controller.settle().await;
        assert_eq!(state.status, STATUS_READY);
    }
}
