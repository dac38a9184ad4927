use super::types::JsonRpcResponse;
use anyhow::Result;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// One line read from the client
#[derive(Debug)]
pub enum Incoming {
    Message(Value),
    Invalid(serde_json::Error),
}

/// Newline-delimited JSON-RPC transport
pub struct Protocol<R, W> {
    reader: R,
    writer: W,
}

impl Protocol<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> Protocol<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Separate halves so requests keep being read while responses are written
    pub fn split(self) -> (MessageReader<R>, ResponseWriter<W>) {
        (
            MessageReader {
                reader: self.reader,
            },
            ResponseWriter {
                writer: self.writer,
            },
        )
    }
}

pub struct MessageReader<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin> MessageReader<R> {
    /// Read the next non-empty line. `None` on EOF.
    pub async fn read_message(&mut self) -> Result<Option<Incoming>> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return Ok(Some(match serde_json::from_str(trimmed) {
                Ok(value) => Incoming::Message(value),
                Err(e) => Incoming::Invalid(e),
            }));
        }
    }
}

pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    pub async fn send_response(&mut self, response: &JsonRpcResponse) -> Result<()> {
        let json = serde_json::to_string(response)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
