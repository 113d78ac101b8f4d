//! Wire codec: turns an [`Envelope`] into bytes suitable for a given
//! transport, and back.
//!
//! stdio frames one envelope per line (newline-delimited JSON); SSE frames
//! one envelope per `data:` field. Both shapes reduce to the same thing —
//! a single JSON object per envelope — so one [`JsonCodec`] covers both,
//! and [`StreamingJsonDecoder`] handles the common "bytes may arrive
//! split across reads" problem once for every transport.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::fmt;

use mcp_protocol::{Envelope, ErrorKind, McpError, RequestId};

/// Failure encoding or decoding a single envelope.
///
/// Carries enough to answer §4.1/§7's "refused with a response if
/// correlation is possible": `kind` distinguishes bytes that weren't even
/// JSON ([`ErrorKind::ParseError`]) from JSON that matched none of the
/// three envelope shapes ([`ErrorKind::InvalidRequest`]), and `recovered_id`
/// carries whatever `id` field the malformed payload had, if any, so a
/// transport can still correlate a reply.
#[derive(Debug, Clone)]
pub struct CodecError {
    message: String,
    kind: ErrorKind,
    recovered_id: Option<RequestId>,
}

impl CodecError {
    /// A failure with no wire classification or recoverable id — used by
    /// call sites that only ever decode already-validated JSON (see
    /// `StreamingJsonDecoder`'s `all(u8::is_ascii_whitespace)` guard, which
    /// never reaches this).
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::ParseError,
            recovered_id: None,
        }
    }

    /// The bytes were not well-formed JSON at all (§4.1: `ParseError(-32700)`).
    /// No id can ever be recovered here — nothing parsed.
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::ParseError,
            recovered_id: None,
        }
    }

    /// The bytes were valid JSON but matched none of the three envelope
    /// shapes (§4.1: `InvalidRequest(-32600)`), with whatever `id` could be
    /// picked out of the raw object regardless.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>, recovered_id: Option<RequestId>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::InvalidRequest,
            recovered_id,
        }
    }

    /// `ParseError` or `InvalidRequest`, matching the JSON-RPC code this
    /// failure should be reported under.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The request id recovered from the malformed payload, if the payload
    /// was at least a JSON object carrying one. `None` means the failure
    /// can't be correlated to any peer-visible id, so §7's propagation
    /// policy calls for logging and dropping rather than replying.
    #[must_use]
    pub fn recovered_id(&self) -> Option<&RequestId> {
        self.recovered_id.as_ref()
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "codec error: {}", self.message)
    }
}

impl std::error::Error for CodecError {}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse_error(err.to_string())
    }
}

impl From<CodecError> for McpError {
    fn from(err: CodecError) -> Self {
        McpError::new(err.kind, err.message)
    }
}

/// Encodes and decodes a single [`Envelope`] to and from a contiguous byte
/// buffer. Framing (where one envelope ends and the next begins) is the
/// caller's concern — see [`StreamingJsonDecoder`] for the common case of
/// splitting a byte stream on newlines.
pub trait Codec: Send + Sync {
    /// Serialize one envelope.
    ///
    /// # Errors
    /// Returns [`CodecError`] if the envelope cannot be serialized.
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, CodecError>;

    /// Deserialize one envelope from a complete buffer.
    ///
    /// # Errors
    /// Returns [`CodecError`] if `bytes` is not a single well-formed
    /// envelope.
    fn decode(&self, bytes: &[u8]) -> Result<Envelope, CodecError>;
}

/// The JSON-RPC wire format: one [`Envelope`] serialized as one JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(envelope)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Envelope, CodecError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|err| CodecError::parse_error(err.to_string()))?;

        // The bytes parsed as JSON; if they don't also parse as one of the
        // three envelope shapes, pull `id` straight off the raw object (not
        // through `Envelope`'s own discrimination, which is exactly what
        // just failed) so a caller can still correlate a reply.
        let recovered_id = value
            .as_object()
            .and_then(|obj| obj.get("id"))
            .cloned()
            .and_then(|id| serde_json::from_value::<RequestId>(id).ok());

        serde_json::from_value(value)
            .map_err(|err| CodecError::invalid_request(err.to_string(), recovered_id))
    }
}

/// Splits an incoming byte stream into newline-delimited JSON frames,
/// buffering partial lines across reads.
///
/// stdio delivers bytes in arbitrary chunks that don't respect message
/// boundaries; this accumulates them until a full line is available, then
/// hands each line to a [`JsonCodec`] in turn. One instance per connection.
#[derive(Debug, Default)]
pub struct StreamingJsonDecoder {
    buffer: Vec<u8>,
    codec: JsonCodec,
}

impl StreamingJsonDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed newly-read bytes in. Returns every envelope whose terminating
    /// newline has now been seen; incomplete trailing data is retained for
    /// the next call.
    ///
    /// # Errors
    /// Returns the first line that fails to decode; lines after it are
    /// dropped for this call (the caller should treat this as fatal for
    /// the connection, since the peer and decoder have lost sync).
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Envelope>, CodecError> {
        self.buffer.extend_from_slice(bytes);
        let mut envelopes = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            envelopes.push(self.codec.decode(line)?);
        }

        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_protocol::RequestId;

    fn sample_envelope() -> Envelope {
        Envelope::request(RequestId::Number(1), "ping", None)
    }

    #[test]
    fn json_codec_round_trips() {
        let codec = JsonCodec::new();
        let encoded = codec.encode(&sample_envelope()).unwrap();
        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded, sample_envelope());
    }

    #[test]
    fn decode_rejects_garbage() {
        let codec = JsonCodec::new();
        assert!(codec.decode(b"not json").is_err());
    }

    #[test]
    fn malformed_json_is_a_parse_error_with_no_recoverable_id() {
        let codec = JsonCodec::new();
        let err = codec.decode(b"not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);
        assert!(err.recovered_id().is_none());
    }

    #[test]
    fn well_formed_json_matching_no_shape_recovers_its_id() {
        let codec = JsonCodec::new();
        let err = codec
            .decode(br#"{"jsonrpc":"2.0","id":5,"foo":"bar"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(err.recovered_id(), Some(&RequestId::Number(5)));
    }

    #[test]
    fn well_formed_json_with_no_id_has_nothing_to_recover() {
        let codec = JsonCodec::new();
        let err = codec
            .decode(br#"{"jsonrpc":"2.0","foo":"bar"}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.recovered_id().is_none());
    }

    #[test]
    fn streaming_decoder_buffers_partial_lines() {
        let mut decoder = StreamingJsonDecoder::new();
        let full = serde_json::to_vec(&sample_envelope()).unwrap();
        let (first_half, second_half) = full.split_at(full.len() / 2);

        assert!(decoder.feed(first_half).unwrap().is_empty());

        let mut rest = second_half.to_vec();
        rest.push(b'\n');
        let envelopes = decoder.feed(&rest).unwrap();
        assert_eq!(envelopes, vec![sample_envelope()]);
    }

    #[test]
    fn streaming_decoder_handles_multiple_frames_in_one_read() {
        let mut decoder = StreamingJsonDecoder::new();
        let mut bytes = serde_json::to_vec(&sample_envelope()).unwrap();
        bytes.push(b'\n');
        bytes.extend(serde_json::to_vec(&sample_envelope()).unwrap());
        bytes.push(b'\n');

        let envelopes = decoder.feed(&bytes).unwrap();
        assert_eq!(envelopes.len(), 2);
    }

    #[test]
    fn streaming_decoder_skips_blank_lines() {
        let mut decoder = StreamingJsonDecoder::new();
        let mut bytes = b"\n".to_vec();
        bytes.extend(serde_json::to_vec(&sample_envelope()).unwrap());
        bytes.push(b'\n');

        let envelopes = decoder.feed(&bytes).unwrap();
        assert_eq!(envelopes, vec![sample_envelope()]);
    }
}
