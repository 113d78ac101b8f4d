//! SSE + HTTP-POST transport.
//!
//! Two channels joined by a runtime-discovered POST endpoint: a long-lived
//! `GET .../sse` event stream carries server-to-client traffic, and every
//! client-to-server envelope is POSTed individually once the first
//! `endpoint` event has told us where to send it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use url::Url;

use mcp_protocol::{Envelope, ErrorKind, JsonRpcError, McpError, McpResult};
use mcp_transport::{Transport, TransportHandler};
use mcp_wire::{Codec, CodecError, JsonCodec};

/// Construction-time knobs for [`SseTransport`].
#[derive(Debug, Clone)]
pub struct SseTransportConfig {
    /// Scheme + host (+ optional base path) the SSE endpoint and the
    /// discovered POST endpoint are both resolved against.
    pub base_uri: Url,
    /// Path the SSE stream is opened on. Defaults to `/sse`.
    pub sse_path: String,
    /// How long `send` waits for the `endpoint` event before failing.
    /// Defaults to 10 seconds per the wire contract.
    pub endpoint_timeout: Duration,
}

impl SseTransportConfig {
    #[must_use]
    pub fn new(base_uri: Url) -> Self {
        Self {
            base_uri,
            sse_path: "/sse".to_string(),
            endpoint_timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_sse_path(mut self, path: impl Into<String>) -> Self {
        self.sse_path = path.into();
        self
    }

    #[must_use]
    pub fn with_endpoint_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint_timeout = timeout;
        self
    }
}

/// A single parsed `text/event-stream` event.
#[derive(Debug, Default, PartialEq, Eq)]
struct SseEvent {
    #[allow(dead_code)]
    id: Option<String>,
    event: String,
    data: String,
}

/// Accumulates raw bytes from the stream and yields complete events,
/// buffering any partial trailing event across reads.
#[derive(Default)]
struct SseEventDecoder {
    buffer: String,
}

impl SseEventDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        // Normalize CRLF so the blank-line terminator check is simple.
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos).collect();
            self.buffer.drain(..2); // remove the blank-line separator itself
            if let Some(event) = Self::parse_block(&block) {
                events.push(event);
            }
        }
        events
    }

    fn parse_block(block: &str) -> Option<SseEvent> {
        if block.trim().is_empty() {
            return None;
        }
        let mut id = None;
        let mut event = String::from("message");
        let mut data_lines = Vec::new();

        for line in block.lines() {
            if let Some(rest) = line.strip_prefix("id:") {
                id = Some(rest.trim_start().to_string());
            } else if let Some(rest) = line.strip_prefix("event:") {
                event = rest.trim_start().to_string();
            } else if let Some(rest) = line.strip_prefix("data:") {
                data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }

        Some(SseEvent {
            id,
            event,
            data: data_lines.join("\n"),
        })
    }
}

/// SSE-consuming client transport.
pub struct SseTransport {
    client: reqwest::Client,
    config: SseTransportConfig,
    codec: JsonCodec,
    endpoint_tx: watch::Sender<Option<Url>>,
    endpoint_rx: watch::Receiver<Option<Url>>,
    closed: AtomicBool,
    closed_notify: Arc<Notify>,
    read_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("base_uri", &self.config.base_uri)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl SseTransport {
    #[must_use]
    pub fn new(config: SseTransportConfig) -> Self {
        let (endpoint_tx, endpoint_rx) = watch::channel(None);
        Self {
            client: reqwest::Client::new(),
            config,
            codec: JsonCodec::new(),
            endpoint_tx,
            endpoint_rx,
            closed: AtomicBool::new(false),
            closed_notify: Arc::new(Notify::new()),
            read_task: tokio::sync::Mutex::new(None),
        }
    }

    fn ensure_open(&self) -> McpResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(McpError::new(ErrorKind::Transport, "transport closed"));
        }
        Ok(())
    }

    fn resolve(base: &Url, endpoint: &str) -> Option<Url> {
        base.join(endpoint).ok()
    }
}

/// Builds the error Response owed to a malformed inbound `message` event, if
/// it carried an id we could recover (§4.1/§7: "refused with a response if
/// correlation is possible, otherwise logged and dropped").
fn error_reply_for(err: &CodecError) -> Option<Envelope> {
    let id = err.recovered_id()?.clone();
    let code = err.kind().jsonrpc_code().unwrap_or(-32600);
    Some(Envelope::error(id, JsonRpcError::new(code, err.to_string())))
}

#[async_trait]
impl Transport for SseTransport {
    async fn connect(&self, handler: Arc<dyn TransportHandler>) -> McpResult<()> {
        let sse_url = self
            .config
            .base_uri
            .join(&self.config.sse_path)
            .map_err(|e| McpError::new(ErrorKind::Transport, e.to_string()))?;

        let response = self
            .client
            .get(sse_url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| McpError::new(ErrorKind::Transport, e.to_string()))?;

        if !response.status().is_success() {
            return Err(McpError::new(
                ErrorKind::Transport,
                format!("SSE endpoint returned status {}", response.status()),
            ));
        }

        let base_uri = self.config.base_uri.clone();
        let endpoint_tx = self.endpoint_tx.clone();
        let endpoint_rx = self.endpoint_rx.clone();
        let codec = self.codec;
        let client = self.client.clone();

        let join = tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut decoder = SseEventDecoder::default();

            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(err) => {
                        tracing::error!(%err, "SSE stream read error");
                        break;
                    }
                };

                for event in decoder.feed(&chunk) {
                    match event.event.as_str() {
                        "endpoint" => {
                            match Self::resolve(&base_uri, event.data.trim()) {
                                Some(url) => {
                                    let _ = endpoint_tx.send(Some(url));
                                }
                                None => {
                                    tracing::warn!(
                                        data = %event.data,
                                        "could not resolve endpoint event against base URI"
                                    );
                                }
                            }
                        }
                        "message" => match codec.decode(event.data.as_bytes()) {
                            Ok(envelope) => {
                                let handler = Arc::clone(&handler);
                                tokio::spawn(async move {
                                    handler.on_envelope(envelope).await;
                                });
                            }
                            Err(err) => {
                                tracing::warn!(%err, "dropping unparseable SSE message event");
                                // §4.1/§7: reply if correlation is possible,
                                // otherwise just the log above. Best-effort:
                                // if no endpoint has been discovered yet
                                // there's nowhere to POST the reply.
                                if let Some(reply) = error_reply_for(&err) {
                                    if let Some(endpoint) = endpoint_rx.borrow().clone() {
                                        if let Ok(bytes) = codec.encode(&reply) {
                                            let client = client.clone();
                                            tokio::spawn(async move {
                                                if let Err(post_err) = client
                                                    .post(endpoint)
                                                    .header(CONTENT_TYPE, "application/json")
                                                    .body(bytes)
                                                    .send()
                                                    .await
                                                {
                                                    tracing::error!(%post_err, "failed to report malformed SSE message event");
                                                }
                                            });
                                        }
                                    }
                                }
                            }
                        },
                        other => {
                            tracing::debug!(event_type = other, "discarding unknown SSE event type");
                        }
                    }
                }
            }

            handler.on_closed().await;
        });

        *self.read_task.lock().await = Some(join);
        Ok(())
    }

    async fn send(&self, envelope: Envelope) -> McpResult<()> {
        self.ensure_open()?;

        let mut rx = self.endpoint_rx.clone();
        let endpoint = tokio::select! {
            result = tokio::time::timeout(self.config.endpoint_timeout, rx.wait_for(|v| v.is_some())) => {
                match result {
                    Ok(Ok(guard)) => guard.clone().expect("checked Some by wait_for predicate"),
                    Ok(Err(_)) => {
                        tracing::debug!("endpoint watch channel closed");
                        return Err(McpError::new(ErrorKind::Transport, "endpoint unavailable"));
                    }
                    Err(_) => {
                        tracing::warn!("endpoint discovery timed out");
                        return Err(McpError::new(ErrorKind::Transport, "endpoint unavailable"));
                    }
                }
            }
            () = self.closed_notify.notified() => {
                tracing::debug!("endpoint wait interrupted by shutdown");
                return Err(McpError::new(ErrorKind::Transport, "endpoint unavailable"));
            }
        };

        let bytes = self
            .codec
            .encode(&envelope)
            .map_err(|e| McpError::new(ErrorKind::Internal, e.to_string()))?;

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(bytes)
            .send()
            .await
            .map_err(|e| McpError::new(ErrorKind::Transport, e.to_string()))?;

        if !response.status().is_success() {
            return Err(McpError::new(
                ErrorKind::Transport,
                format!("POST to discovered endpoint returned status {}", response.status()),
            ));
        }

        Ok(())
    }

    async fn close(&self) -> McpResult<()> {
        self.closed.store(true, Ordering::Release);
        self.closed_notify.notify_waiters();
        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_message_with_a_recoverable_id_gets_a_reply() {
        let codec = JsonCodec::new();
        let err = codec
            .decode(br#"{"jsonrpc":"2.0","id":"abc","foo":"bar"}"#)
            .unwrap_err();
        let reply = error_reply_for(&err).expect("id \"abc\" should be recoverable");
        match reply {
            Envelope::Response { id, payload: mcp_protocol::ResponsePayload::Error(e) } => {
                assert_eq!(id, mcp_protocol::RequestId::String("abc".to_string()));
                assert_eq!(e.code, -32600);
            }
            other => panic!("expected an error response, got {other:?}"),
        }
    }

    #[test]
    fn malformed_message_with_no_id_has_nothing_to_reply_with() {
        let codec = JsonCodec::new();
        let err = codec.decode(b"not json").unwrap_err();
        assert!(error_reply_for(&err).is_none());
    }

    #[test]
    fn event_decoder_splits_on_blank_line() {
        let mut decoder = SseEventDecoder::default();
        let events = decoder.feed(b"event: endpoint\ndata: /messages?token=abc\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "endpoint");
        assert_eq!(events[0].data, "/messages?token=abc");
    }

    #[test]
    fn event_decoder_joins_multiline_data_with_newline() {
        let mut decoder = SseEventDecoder::default();
        let events = decoder.feed(b"data: line one\ndata: line two\n\n");
        assert_eq!(events[0].data, "line one\nline two");
    }

    #[test]
    fn event_decoder_defaults_type_to_message() {
        let mut decoder = SseEventDecoder::default();
        let events = decoder.feed(b"data: {}\n\n");
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn event_decoder_buffers_partial_events_across_feeds() {
        let mut decoder = SseEventDecoder::default();
        assert!(decoder.feed(b"event: message\ndata: {\"a").is_empty());
        let events = decoder.feed(b"\":1}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"a\":1}");
    }

    #[test]
    fn event_decoder_handles_crlf() {
        let mut decoder = SseEventDecoder::default();
        let events = decoder.feed(b"event: endpoint\r\ndata: /msg\r\n\r\n");
        assert_eq!(events[0].data, "/msg");
    }

    #[test]
    fn resolve_joins_relative_path_against_base() {
        let base = Url::parse("http://localhost:8080/").unwrap();
        let resolved = SseTransport::resolve(&base, "/messages?token=abc").unwrap();
        assert_eq!(resolved.as_str(), "http://localhost:8080/messages?token=abc");
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let transport = SseTransport::new(SseTransportConfig::new(
            Url::parse("http://localhost:8080").unwrap(),
        ));
        transport.close().await.unwrap();
        let result = transport
            .send(Envelope::notification("ping", None))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn send_times_out_without_endpoint_event() {
        let config = SseTransportConfig::new(Url::parse("http://localhost:8080").unwrap())
            .with_endpoint_timeout(Duration::from_millis(50));
        let transport = SseTransport::new(config);
        let result = transport
            .send(Envelope::notification("ping", None))
            .await;
        assert!(result.is_err());
    }
}
