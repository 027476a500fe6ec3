//! JSON Lines framing: one serialized envelope per `\n`-terminated line.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use crate::error::ProtocolError;

/// Serialize `value` as a single line, trailing newline included.
pub fn encode_line<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(value).map_err(ProtocolError::Encode)?;
    line.push('\n');
    Ok(line)
}

/// Parse one line, with or without its trailing newline.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(line.trim_end()).map_err(ProtocolError::Decode)
}

/// Reads framed messages off an async byte stream.
pub struct FramedReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> FramedReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Next decoded message, or `None` at end of stream. Blank lines are skipped.
    ///
    /// A line that fails to decode yields `Some(Err(ProtocolError::Decode))` and
    /// leaves the reader positioned at the following line.
    pub async fn next<T: DeserializeOwned>(&mut self) -> Option<Result<T, ProtocolError>> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(decode_line(&line)),
                Ok(None) => return None,
                Err(e) => return Some(Err(ProtocolError::Io(e))),
            }
        }
    }
}

/// Writes framed messages onto an async byte stream, flushing after each one.
pub struct FramedWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FramedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn send<T: Serialize>(&mut self, value: &T) -> Result<(), ProtocolError> {
        let line = encode_line(value)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
