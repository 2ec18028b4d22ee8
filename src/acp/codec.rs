//! NDJSON framing for agent stdio.
//!
//! One `\n`-terminated UTF-8 line carries one JSON-RPC message. Framing is
//! delegated to [`LinesCodec`] with a hard per-line cap so a runaway agent
//! cannot make the reader buffer without bound.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Largest inbound line accepted: 1 MiB.
///
/// Longer lines are discarded by the decoder and reported as
/// [`AppError::Acp`]; the stream itself stays usable.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Line decoder used by the RPC reader.
///
/// Yields one `String` per line without the trailing newline. A line over
/// [`MAX_LINE_BYTES`] yields `Err(AppError::Acp("line too long: …"))`; the
/// next call resumes after the offending line. Underlying read errors map
/// to [`AppError::Io`].
#[derive(Debug)]
pub struct AcpCodec(LinesCodec);

impl AcpCodec {
    /// Codec with the default [`MAX_LINE_BYTES`] cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Codec with a custom cap, mostly useful for tests.
    #[must_use]
    pub fn with_max_length(max: usize) -> Self {
        Self(LinesCodec::new_with_max_length(max))
    }

    /// The configured cap in bytes.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.0.max_length()
    }
}

impl Default for AcpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AcpCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let max = self.max_length();
        self.0.decode(src).map_err(|e| map_codec_error(e, max))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let max = self.max_length();
        self.0.decode_eof(src).map_err(|e| map_codec_error(e, max))
    }
}

// ── Private helper ───────────────────────────────────────────────────────────

fn map_codec_error(e: LinesCodecError, max: usize) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Acp(format!("line too long: exceeded {max} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
