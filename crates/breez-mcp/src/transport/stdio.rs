//! Newline-delimited JSON transport
//!
//! One JSON-RPC message per line. Blank lines are skipped; EOF ends the
//! stream. The transport is generic over the reader and writer so tests can
//! drive the server through an in-memory pipe.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::trace;

use crate::protocol::JsonRpcResponse;

/// Line-framed JSON-RPC transport
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

/// Transport over the process's stdin and stdout
pub type AsyncStdioTransport = LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl AsyncStdioTransport {
    pub fn stdio() -> Self {
        LineTransport::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Read the next non-blank line; `None` on EOF
    pub async fn read_message(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            trace!("Received: {}", trimmed);
            return Ok(Some(trimmed.to_string()));
        }
    }

    pub async fn write_message(&mut self, message: &str) -> io::Result<()> {
        trace!("Sending: {}", message);
        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.write_message(&json).await
    }
}
