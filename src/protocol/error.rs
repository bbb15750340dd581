use thiserror::Error;

/// Errors produced while encoding, framing, or decoding wire messages.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CodecError {
    /// Underlying stream failed or ended mid-frame.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Bytes did not deserialize into the expected structure.
    #[error("malformed message: {0}")]
    Malformed(#[from] postcard::Error),

    /// Envelope carried a payload-type tag this crate does not know.
    #[error("unknown payload type {0:?}")]
    UnknownPayloadType(String),

    /// Envelope carried a known payload type other than the one expected here.
    #[error("expected payload type {expected}, found {found}")]
    UnexpectedPayloadType {
        expected: &'static str,
        found: &'static str,
    },

    /// A message decoded cleanly but was followed by extra bytes.
    #[error("{count} trailing bytes after message")]
    TrailingBytes { count: usize },

    /// Length prefix exceeded the configured maximum.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },
}

impl CodecError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CodecError::Io(_) => "codec_io",
            CodecError::Malformed(_) => "codec_malformed",
            CodecError::UnknownPayloadType(_) => "codec_unknown_payload_type",
            CodecError::UnexpectedPayloadType { .. } => "codec_unexpected_payload_type",
            CodecError::TrailingBytes { .. } => "codec_trailing_bytes",
            CodecError::FrameTooLarge { .. } => "codec_frame_too_large",
        }
    }

    /// Returns `true` if the stream itself failed (as opposed to its contents).
    pub fn is_io(&self) -> bool {
        matches!(self, CodecError::Io(_))
    }
}
