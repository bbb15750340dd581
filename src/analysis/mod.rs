//! Analysis data model: requests, responses, and the channels results flow through.
//!
//! ## Contents
//! - [`AnalysisRequest`], [`AnalysisResponse`], [`AnalysisKey`] what is sent and how it is matched
//! - [`ResultChannel`] settle-once sink shared by the submitter and the engine
//! - [`Analysis`] one request paired with its channel

#[allow(clippy::module_inception)]
mod analysis;
mod channel;
mod request;

pub use analysis::{Analysis, CANCELLED_MESSAGE, CRASHED_MESSAGE};
pub use channel::{ProgressReceiver, ResultChannel};
pub use request::{AnalysisKey, AnalysisRequest, AnalysisResponse, AnalysisStatus};
