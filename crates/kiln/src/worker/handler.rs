use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error};
use super::session::{duration_ms, SessionLifecycle};
use crate::protocol::{Envelope, Request, RequestId, Response};

/// Where the worker puts responses for the controller.
pub type Outbox = UnboundedSender<Envelope<Response>>;

/// Turns requests into lifecycle calls and lifecycle results into responses.
///
/// Each call to [`RequestHandler::handle`] emits zero or more status
/// notifications followed by exactly one terminal response, except for
/// [`Request::Unknown`], which is logged and dropped.
pub struct RequestHandler {
    lifecycle: SessionLifecycle,
}

impl RequestHandler {
    pub fn new(lifecycle: SessionLifecycle) -> Self {
        Self { lifecycle }
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    pub async fn handle(&mut self, envelope: Envelope<Request>, outbox: &Outbox) {
        let Envelope { id, message } = envelope;
        debug!(%id, kind = message.kind(), "Handling request");

        match message {
            Request::Handshake => {
                let outcome = self
                    .lifecycle
                    .handshake(|message| emit(outbox, id, Response::status(message)))
                    .await;
                emit(outbox, id, Response::HandshakeComplete {
                    success: outcome.success,
                    backend: outcome.backend,
                    warning: outcome.warning,
                    load_time_ms: outcome.load_time_ms,
                });
            }
            Request::Run { input } => {
                if !input.is_empty() {
                    emit(outbox, id, Response::status("Running inference..."));
                }
                match self.lifecycle.run(input).await {
                    Ok(run) => emit(outbox, id, Response::Result {
                        output: run.output,
                        duration_ms: duration_ms(run.duration),
                    }),
                    Err(e) => {
                        error!(%id, error = %e, "Error running inference");
                        emit(outbox, id, Response::error(e.to_string()));
                    }
                }
            }
            Request::Stats => {
                emit(outbox, id, Response::Stats {
                    backend: self.lifecycle.backend(),
                    load_time_ms: self.lifecycle.load_time_ms(),
                });
            }
            Request::Unknown => {
                error!(%id, "Unknown message type");
            }
        }
    }
}

fn emit(outbox: &Outbox, id: RequestId, response: Response) {
    if outbox.send(Envelope::new(id, response)).is_err() {
        debug!(%id, "Controller is gone; dropping response");
    }
}
