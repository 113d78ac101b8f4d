use mcp_protocol::{Envelope, RequestId};
use mcp_wire::{Codec, JsonCodec, StreamingJsonDecoder};

#[test]
fn json_codec_round_trips_a_request() {
    let codec = JsonCodec::new();
    let envelope = Envelope::request(RequestId::Number(1), "ping", None);

    let encoded = codec.encode(&envelope).expect("encode failed");
    let decoded = codec.decode(&encoded).expect("decode failed");

    assert_eq!(envelope, decoded);
}

#[test]
fn json_codec_rejects_malformed_bytes() {
    let codec = JsonCodec::new();
    assert!(codec.decode(b"not json").is_err());
}

#[test]
fn streaming_decoder_splits_newline_delimited_frames() {
    let mut decoder = StreamingJsonDecoder::new();
    let mut bytes = serde_json::to_vec(&Envelope::notification("notifications/initialized", None)).unwrap();
    bytes.push(b'\n');
    bytes.extend(serde_json::to_vec(&Envelope::request(RequestId::Number(2), "ping", None)).unwrap());
    bytes.push(b'\n');

    let envelopes = decoder.feed(&bytes).unwrap();
    assert_eq!(envelopes.len(), 2);
    assert!(envelopes[0].is_notification());
    assert!(envelopes[1].is_request());
}
