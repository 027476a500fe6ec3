//! Module for running the worker as a background task.

use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use super::handler::{Outbox, RequestHandler};
use super::session::SessionLifecycle;
use crate::error::ProtocolError;
use crate::protocol::{Envelope, Request, Response};

/// A handle for managing the background task that owns the model and session.
///
/// Requests are processed strictly one after another in arrival order: the
/// task finishes every step of one request, status notifications and terminal
/// response included, before it reads the next.
///
/// # Example
///
/// ```ignore
/// use kiln::worker::{SessionLifecycle, WorkerHandle};
/// use kiln::protocol::{Envelope, Request};
///
/// async fn example(lifecycle: SessionLifecycle) {
///     let (worker, mut responses) = WorkerHandle::spawn(lifecycle);
///     worker.send(Envelope::request(Request::Handshake)).unwrap();
///
///     while let Some(envelope) = responses.recv().await {
///         println!("{:?}", envelope.message);
///     }
///     // Worker will be terminated when dropped
/// }
/// ```
pub struct WorkerHandle {
    /// Flag indicating whether the background task should keep processing
    running: Arc<AtomicBool>,

    /// Handle to the spawned task, becomes `None` after termination
    handle: Option<JoinHandle<()>>,

    /// Request channel into the task
    requests: UnboundedSender<Envelope<Request>>,
}

impl WorkerHandle {
    /// Spawns the worker task on the current tokio runtime.
    ///
    /// # Returns
    ///
    /// The handle, and the receiving end of the worker's response channel.
    pub fn spawn(lifecycle: SessionLifecycle) -> (Self, UnboundedReceiver<Envelope<Response>>) {
        let running = Arc::new(AtomicBool::new(true));
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(worker_loop(
            RequestHandler::new(lifecycle),
            running.clone(),
            request_rx,
            response_tx,
        ));

        let worker = Self {
            running,
            handle: Some(handle),
            requests: request_tx,
        };
        (worker, response_rx)
    }

    /// Queue a request for the worker.
    pub fn send(&self, envelope: Envelope<Request>) -> Result<(), ProtocolError> {
        if !self.is_running() {
            return Err(ProtocolError::ChannelClosed);
        }
        self.requests
            .send(envelope)
            .map_err(|_| ProtocolError::ChannelClosed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.requests.is_closed()
    }

    /// Stops the worker.
    ///
    /// This method:
    /// 1. Sets the running flag to `false` so no queued request is started
    /// 2. Requests cancellation of the task
    ///
    /// Cancellation takes effect the next time the task yields. On a
    /// multi-threaded runtime a request already in progress may still emit
    /// responses after this returns. Callers that must see nothing further
    /// also drop their response receiver, as
    /// [`Controller::terminate`](crate::controller::Controller::terminate) does.
    pub fn terminate(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Worker terminated");
        }
    }
}

impl Drop for WorkerHandle {
    /// Ensures the background task is terminated when the handle is dropped.
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn worker_loop(
    mut handler: RequestHandler,
    running: Arc<AtomicBool>,
    mut requests: UnboundedReceiver<Envelope<Request>>,
    outbox: Outbox,
) {
    info!("Worker started");
    while let Some(envelope) = requests.recv().await {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        handler.handle(envelope, &outbox).await;
    }
    debug!("Worker request channel closed");
}
