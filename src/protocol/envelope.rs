//! # Wire envelope.
//!
//! Every message on the worker pipes is one [`Envelope`]: a message id, an opaque
//! payload, a payload-type tag naming how to read the payload, and a status.
//!
//! ## Encoding
//! Envelopes and payloads are serialized with `postcard`. The payload type travels
//! as its string tag (`"AnalysisRequest"` / `"AnalysisResponse"`) and is validated
//! on decode: unknown tags and trailing bytes are decode errors.
//!
//! ## Status
//! - Outbound requests: status is unused (sent as the default).
//! - Inbound responses: `InProgress` marks a progress update; `Complete` and
//!   `Error` mark the terminal response of an analysis.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisRequest, AnalysisResponse};
use crate::protocol::CodecError;

/// How the payload bytes of an [`Envelope`] are to be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadType {
    AnalysisRequest,
    AnalysisResponse,
}

impl PayloadType {
    /// Returns the wire tag.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PayloadType::AnalysisRequest => "AnalysisRequest",
            PayloadType::AnalysisResponse => "AnalysisResponse",
        }
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AnalysisRequest" => Ok(PayloadType::AnalysisRequest),
            "AnalysisResponse" => Ok(PayloadType::AnalysisResponse),
            other => Err(CodecError::UnknownPayloadType(other.to_string())),
        }
    }
}

/// Message status carried by an [`Envelope`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    #[default]
    Complete,
    InProgress,
    Error,
}

/// One wire message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub id: u32,
    pub payload: Vec<u8>,
    pub payload_type: PayloadType,
    pub status: MessageStatus,
}

#[derive(Serialize)]
struct WireRef<'a> {
    id: u32,
    payload: &'a [u8],
    payload_type: &'a str,
    status: MessageStatus,
}

#[derive(Deserialize)]
struct Wire {
    id: u32,
    payload: Vec<u8>,
    payload_type: String,
    status: MessageStatus,
}

impl Envelope {
    /// Wraps `request` in an outbound envelope.
    pub fn request(id: u32, request: &AnalysisRequest) -> Result<Self, CodecError> {
        Ok(Self {
            id,
            payload: postcard::to_allocvec(request)?,
            payload_type: PayloadType::AnalysisRequest,
            status: MessageStatus::default(),
        })
    }

    /// Wraps `response` in an inbound envelope with the given status.
    pub fn response(
        id: u32,
        response: &AnalysisResponse,
        status: MessageStatus,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            id,
            payload: postcard::to_allocvec(response)?,
            payload_type: PayloadType::AnalysisResponse,
            status,
        })
    }

    /// Decodes the payload as a request; fails if the payload type says otherwise.
    pub fn decode_request(&self) -> Result<AnalysisRequest, CodecError> {
        self.expect(PayloadType::AnalysisRequest)?;
        from_exact_bytes(&self.payload)
    }

    /// Decodes the payload as a response; fails if the payload type says otherwise.
    pub fn decode_response(&self) -> Result<AnalysisResponse, CodecError> {
        self.expect(PayloadType::AnalysisResponse)?;
        from_exact_bytes(&self.payload)
    }

    /// Returns `true` for the last message of an analysis (`Complete` or `Error`).
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status != MessageStatus::InProgress
    }

    fn expect(&self, expected: PayloadType) -> Result<(), CodecError> {
        if self.payload_type == expected {
            Ok(())
        } else {
            Err(CodecError::UnexpectedPayloadType {
                expected: expected.as_str(),
                found: self.payload_type.as_str(),
            })
        }
    }
}

/// Serializes an envelope (without the length prefix).
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    let wire = WireRef {
        id: envelope.id,
        payload: &envelope.payload,
        payload_type: envelope.payload_type.as_str(),
        status: envelope.status,
    };
    Ok(postcard::to_allocvec(&wire)?)
}

/// Deserializes an envelope (without the length prefix).
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let wire: Wire = from_exact_bytes(bytes)?;
    Ok(Envelope {
        id: wire.id,
        payload: wire.payload,
        payload_type: wire.payload_type.parse()?,
        status: wire.status,
    })
}

fn from_exact_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let (value, rest) = postcard::take_from_bytes::<T>(bytes)?;
    if !rest.is_empty() {
        return Err(CodecError::TrailingBytes { count: rest.len() });
    }
    Ok(value)
}
