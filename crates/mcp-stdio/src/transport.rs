//! Newline-delimited JSON over stdin/stdout.
//!
//! One envelope per line in both directions, matching the MCP stdio
//! transport convention: messages MUST NOT contain embedded newlines, and
//! stderr (via `tracing`) is left free for logging since stdout carries the
//! wire protocol exclusively.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use mcp_protocol::{Envelope, ErrorKind, JsonRpcError, McpError, McpResult};
use mcp_transport::{Transport, TransportHandler};
use mcp_wire::{Codec, JsonCodec};

/// Construction-time knobs for [`StdioTransport`].
#[derive(Debug, Clone)]
pub struct StdioTransportConfig {
    /// Lines longer than this are rejected rather than buffered without
    /// bound; guards against a misbehaving peer exhausting memory.
    pub max_line_bytes: usize,
}

impl Default for StdioTransportConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: 16 * 1024 * 1024,
        }
    }
}

/// stdio transport: reads newline-delimited JSON from stdin, writes
/// newline-delimited JSON to stdout.
///
/// One instance is meant to live for the lifetime of the process; `connect`
/// may only be called once.
pub struct StdioTransport {
    config: StdioTransportConfig,
    codec: JsonCodec,
    stdout: Arc<Mutex<io::Stdout>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl StdioTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StdioTransportConfig::default())
    }

    #[must_use]
    pub fn with_config(config: StdioTransportConfig) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
            stdout: Arc::new(Mutex::new(io::stdout())),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> McpResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(McpError::new(ErrorKind::Transport, "transport closed"));
        }
        Ok(())
    }
}

/// Builds the error Response owed to a malformed inbound line, if it carried
/// an id we could recover (§4.1/§7: "refused with a response if correlation
/// is possible, otherwise logged and dropped").
fn error_reply_for(err: &mcp_wire::CodecError) -> Option<Envelope> {
    let id = err.recovered_id()?.clone();
    let code = err.kind().jsonrpc_code().unwrap_or(-32600);
    Some(Envelope::error(id, JsonRpcError::new(code, err.to_string())))
}

/// Encode and write one envelope, sharing the write side between `send` and
/// the read loop's own malformed-input replies.
async fn write_line(stdout: &Mutex<io::Stdout>, codec: &JsonCodec, envelope: &Envelope) -> McpResult<()> {
    let mut bytes = codec
        .encode(envelope)
        .map_err(|e| McpError::new(ErrorKind::Internal, e.to_string()))?;
    bytes.push(b'\n');

    let mut stdout = stdout.lock().await;
    stdout.write_all(&bytes).await?;
    stdout.flush().await?;
    Ok(())
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self, handler: Arc<dyn TransportHandler>) -> McpResult<()> {
        let codec = self.codec;
        let max_line_bytes = self.config.max_line_bytes;
        let stdout = Arc::clone(&self.stdout);

        tokio::spawn(async move {
            let stdin = io::stdin();
            let mut lines = BufReader::new(stdin).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if line.len() > max_line_bytes {
                            tracing::warn!(len = line.len(), "dropping oversized stdio line");
                            continue;
                        }
                        match codec.decode(line.as_bytes()) {
                            Ok(envelope) => {
                                let handler = Arc::clone(&handler);
                                // Dispatch on its own task: the read loop must
                                // never block on handler execution, only on
                                // the next line of input.
                                tokio::spawn(async move {
                                    handler.on_envelope(envelope).await;
                                });
                            }
                            Err(err) => {
                                tracing::warn!(%err, "dropping unparseable stdio line");
                                // §4.1/§7: reply if correlation is possible,
                                // otherwise just the log above.
                                if let Some(reply) = error_reply_for(&err) {
                                    let stdout = Arc::clone(&stdout);
                                    tokio::spawn(async move {
                                        if let Err(write_err) = write_line(&stdout, &codec, &reply).await {
                                            tracing::error!(%write_err, "failed to report malformed stdio line");
                                        }
                                    });
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("stdin closed");
                        break;
                    }
                    Err(err) => {
                        tracing::error!(%err, "stdin read error");
                        break;
                    }
                }
            }

            handler.on_closed().await;
        });

        Ok(())
    }

    async fn send(&self, envelope: Envelope) -> McpResult<()> {
        self.ensure_open()?;
        write_line(&self.stdout, &self.codec, &envelope).await
    }

    async fn close(&self) -> McpResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_protocol::RequestId;

    #[tokio::test]
    async fn send_after_close_fails() {
        let transport = StdioTransport::new();
        transport.close().await.unwrap();
        let result = transport
            .send(Envelope::request(RequestId::Number(1), "ping", None))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn malformed_line_with_a_recoverable_id_gets_a_reply() {
        let codec = JsonCodec::new();
        let err = codec
            .decode(br#"{"jsonrpc":"2.0","id":7,"foo":"bar"}"#)
            .unwrap_err();
        let reply = error_reply_for(&err).expect("id 7 should be recoverable");
        match reply {
            Envelope::Response { id, payload: mcp_protocol::ResponsePayload::Error(e) } => {
                assert_eq!(id, RequestId::Number(7));
                assert_eq!(e.code, -32600);
            }
            other => panic!("expected an error response, got {other:?}"),
        }
    }

    #[test]
    fn malformed_line_with_no_id_has_nothing_to_reply_with() {
        let codec = JsonCodec::new();
        let err = codec.decode(b"not json").unwrap_err();
        assert!(error_reply_for(&err).is_none());
    }

    #[test]
    fn default_max_line_bytes_is_sixteen_mebibytes() {
        assert_eq!(StdioTransportConfig::default().max_line_bytes, 16 * 1024 * 1024);
    }
}
