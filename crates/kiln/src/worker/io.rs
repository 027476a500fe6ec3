//! Serving the worker over a byte stream, e.g. a child process's stdin/stdout.

use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use super::handler::{Outbox, RequestHandler};
use super::session::SessionLifecycle;
use crate::error::ProtocolError;
use crate::protocol::framing::{FramedReader, FramedWriter};
use crate::protocol::{Envelope, Request, RequestId, Response};

/// Read JSON-line requests from `reader` and answer them on `writer` until the
/// reader reaches end of stream.
///
/// Requests are handled one at a time. Responses are written as they are
/// produced, so status notifications reach the peer before the request finishes.
/// A line that carries a request id but an invalid body is answered with an
/// error response under that id. Anything else that does not decode is logged
/// and skipped.
pub async fn serve_io<R, W>(lifecycle: SessionLifecycle, reader: R, writer: W) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (outbox, mut responses) = mpsc::unbounded_channel::<Envelope<Response>>();
    let mut handler = RequestHandler::new(lifecycle);
    let mut reader = FramedReader::new(reader);
    let mut writer = FramedWriter::new(writer);

    let serve = async move {
        while let Some(next) = reader.next::<Value>().await {
            let line = match next {
                Ok(line) => line,
                Err(ProtocolError::Decode(e)) => {
                    warn!(error = %e, "Skipping undecodable request line");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match Envelope::<Request>::deserialize(&line) {
                Ok(envelope) => handler.handle(envelope, &outbox).await,
                Err(e) => reject(&line, &e, &outbox),
            }
        }
        info!("Request stream closed");
        Ok(())
    };

    let write = async move {
        while let Some(envelope) = responses.recv().await {
            writer.send(&envelope).await?;
        }
        Ok::<(), ProtocolError>(())
    };

    let (served, written) = tokio::join!(serve, write);
    served?;
    written
}

/// Answer a well-formed JSON line that is not a valid request.
///
/// When the line carries a usable id the peer is waiting on that request, so it
/// gets an error response. Without one there is nobody to answer.
fn reject(line: &Value, e: &serde_json::Error, outbox: &Outbox) {
    let id = line.get("id").and_then(|id| RequestId::deserialize(id).ok());
    match id {
        Some(id) => {
            warn!(%id, error = %e, "Rejecting malformed request");
            let response = Envelope::new(id, Response::error(format!("Malformed request: {e}")));
            if outbox.send(response).is_err() {
                debug!(%id, "Response writer is gone; dropping rejection");
            }
        }
        None => warn!(error = %e, "Skipping request line without a usable id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{split, AsyncWriteExt};
    use crate::artifact::InMemorySource;
    use crate::backend::Backend;
    use crate::backend::mock_engine::MockEngine;
    use crate::protocol::framing::encode_line;

    fn lifecycle() -> SessionLifecycle {
        SessionLifecycle::new(
            Arc::new(MockEngine::doubling().unavailable(Backend::Accelerated)),
            Arc::new(InMemorySource::new(b"double".to_vec())),
            Backend::PRIORITY.to_vec(),
        )
    }

    /// Write `lines` to a fresh worker, close the stream and collect every response.
    async fn exchange(lines: &[String]) -> Vec<Envelope<Response>> {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, server_write) = split(server);
        let worker = tokio::spawn(serve_io(lifecycle(), server_read, server_write));

        let (client_read, mut client_write) = split(client);
        for line in lines {
            client_write.write_all(line.as_bytes()).await.unwrap();
        }
        client_write.shutdown().await.unwrap();
        drop(client_write);

        let mut reader = FramedReader::new(client_read);
        let mut received = vec![];
        while let Some(envelope) = reader.next::<Envelope<Response>>().await {
            received.push(envelope.unwrap());
        }
        worker.await.unwrap().unwrap();
        received
    }

    #[tokio::test]
    async fn test_malformed_request_with_id_gets_an_error() {
        let id = RequestId::new();
        let line = format!("{{\"id\":\"{id}\",\"message\":{{\"type\":\"run\",\"input\":\"abc\"}}}}\n");

        let received = exchange(&[line]).await;

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].id, id);
        assert!(matches!(
            &received[0].message,
            Response::Error { message } if message.starts_with("Malformed request: ")
        ));
    }

    #[tokio::test]
    async fn test_lines_without_an_id_are_skipped() {
        let stats = Envelope::request(Request::Stats);
        let received = exchange(&[
            "not json\n".to_string(),
            "{\"message\":{\"type\":\"run\"}}\n".to_string(),
            encode_line(&stats).unwrap(),
        ])
        .await;

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].id, stats.id);
        assert!(matches!(received[0].message, Response::Stats { backend: None, .. }));
    }

    #[tokio::test]
    async fn test_serves_requests_over_a_stream() {
        let (client, server) = tokio::io::duplex(4096);
        let (server_read, server_write) = split(server);
        let worker = tokio::spawn(serve_io(lifecycle(), server_read, server_write));

        let (client_read, mut client_write) = split(client);
        let handshake = Envelope::request(Request::Handshake);
        let run = Envelope::request(Request::Run { input: vec![1.0, 2.0, 3.0, 4.0] });
        client_write.write_all(encode_line(&handshake).unwrap().as_bytes()).await.unwrap();
        client_write.write_all(b"{\"id\": \"garbage\"}\n").await.unwrap();
        client_write.write_all(encode_line(&run).unwrap().as_bytes()).await.unwrap();
        client_write.shutdown().await.unwrap();
        drop(client_write);

        let mut reader = FramedReader::new(client_read);
        let mut received = vec![];
        while let Some(envelope) = reader.next::<Envelope<Response>>().await {
            received.push(envelope.unwrap());
        }
        worker.await.unwrap().unwrap();

        let messages: Vec<_> = received.iter().map(|e| e.message.clone()).collect();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0], Response::status("Loading model..."));
        assert_eq!(messages[1], Response::status("Creating session..."));
        assert!(matches!(&messages[2], Response::HandshakeComplete { success: true, .. }));
        assert_eq!(messages[3], Response::status("Running inference..."));
        assert!(matches!(&messages[4], Response::Result { output, .. } if output == &vec![2.0, 4.0, 6.0, 8.0]));

        assert!(received[..3].iter().all(|e| e.id == handshake.id));
        assert!(received[3..].iter().all(|e| e.id == run.id));
    }
}
