//! Wire protocol spoken over the worker's stdin/stdout.
//!
//! ```text
//! engine ── Envelope{AnalysisRequest} ──► worker stdin     (one frame per dispatch)
//! engine ◄── Envelope{AnalysisResponse} ── worker stdout   (0..n InProgress, then Complete|Error)
//! ```
//!
//! ## Contents
//! - [`Envelope`], [`PayloadType`], [`MessageStatus`] the wire record
//! - [`encode`]/[`decode`] envelope serialization
//! - [`frame`], [`read_frame`], [`write_frame`], [`FrameCodec`] length-prefixed framing
//! - [`CodecError`] everything that can go wrong on the wire

mod codec;
mod envelope;
mod error;

pub use codec::{
    DEFAULT_MAX_FRAME_LEN, FrameCodec, LENGTH_PREFIX, frame, read_frame, write_frame,
};
pub use envelope::{Envelope, MessageStatus, PayloadType, decode, encode};
pub use error::CodecError;
