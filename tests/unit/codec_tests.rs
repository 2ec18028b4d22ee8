//! Unit tests for the NDJSON line codec.
//!
//! Covers:
//! - single and batched lines
//! - partial delivery buffered until the newline
//! - over-long lines rejected with `AppError::Acp("line too long")`, after
//!   which decoding resumes at the next line
//! - EOF with a trailing unterminated line

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use agent_link::acp::codec::{AcpCodec, MAX_LINE_BYTES};
use agent_link::AppError;

// ── Framing ─────────────────────────────────────────────────────────────────

#[test]
fn single_line_is_returned_without_newline() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"jsonrpc\":\"2.0\",\"method\":\"x\"}\n");

    let line = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(line.as_deref(), Some("{\"jsonrpc\":\"2.0\",\"method\":\"x\"}"));
    assert!(buf.is_empty(), "the whole line must be consumed");
}

#[test]
fn batched_lines_decode_one_at_a_time() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"id\":1}\n{\"id\":2}\n");

    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"id\":1}"));
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"id\":2}"));
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
}

/// A line split across two reads is held until its newline arrives.
#[test]
fn partial_line_waits_for_newline() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"id\":");

    assert_eq!(codec.decode(&mut buf).unwrap(), None);

    buf.extend_from_slice(b"7}\n");
    assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"id\":7}"));
}

#[test]
fn eof_flushes_unterminated_line() {
    let mut codec = AcpCodec::new();
    let mut buf = BytesMut::from("{\"id\":3}");

    assert_eq!(codec.decode(&mut buf).unwrap(), None);
    assert_eq!(
        codec.decode_eof(&mut buf).unwrap().as_deref(),
        Some("{\"id\":3}")
    );
}

// ── Limits ──────────────────────────────────────────────────────────────────

#[test]
fn default_cap_is_one_mebibyte() {
    assert_eq!(AcpCodec::new().max_length(), MAX_LINE_BYTES);
    assert_eq!(MAX_LINE_BYTES, 1024 * 1024);
}

/// An over-long line produces an `Acp` error and the next line still decodes.
#[test]
fn over_long_line_is_rejected_and_skipped() {
    let mut codec = AcpCodec::with_max_length(8);
    let mut buf = BytesMut::from("0123456789abcdef\n{\"a\":1}\n");

    let err = codec.decode(&mut buf).expect_err("line exceeds the cap");
    match err {
        AppError::Acp(msg) => assert!(msg.contains("line too long"), "got: {msg}"),
        other => panic!("expected AppError::Acp, got {other:?}"),
    }

    let next = loop {
        match codec.decode(&mut buf) {
            Ok(Some(line)) => break line,
            Ok(None) => panic!("next line must be available"),
            Err(_) => {}
        }
    };
    assert_eq!(next, "{\"a\":1}");
}
