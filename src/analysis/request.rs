//! # Analysis requests and responses.
//!
//! The engine treats request contents as opaque; only the identity triple
//! ([`AnalysisKey`]) matters for routing. Responses coming back from the worker
//! are matched to the in-flight request by that triple, never by arrival order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one analysis revision: `{instance_id, analysis_id, revision}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnalysisKey {
    /// Instance (open document) the analysis belongs to.
    pub instance_id: String,
    /// Analysis id within the instance.
    pub analysis_id: u32,
    /// Revision of the analysis options.
    pub revision: u32,
}

impl fmt::Display for AnalysisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.instance_id, self.analysis_id, self.revision)
    }
}

/// Request to run one analysis on the worker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub instance_id: String,
    pub analysis_id: u32,
    pub revision: u32,
    /// Namespace of the analysis (module name).
    pub ns: String,
    /// Analysis name within the namespace.
    pub name: String,
    /// Serialized analysis options; interpreted by the worker only.
    pub options: Vec<u8>,
}

impl AnalysisRequest {
    /// Creates a request at revision 0 with no options.
    pub fn new(instance_id: impl Into<String>, analysis_id: u32) -> Self {
        Self {
            instance_id: instance_id.into(),
            analysis_id,
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    #[inline]
    pub fn with_name(mut self, ns: impl Into<String>, name: impl Into<String>) -> Self {
        self.ns = ns.into();
        self.name = name.into();
        self
    }

    #[inline]
    pub fn with_options(mut self, options: impl Into<Vec<u8>>) -> Self {
        self.options = options.into();
        self
    }

    /// Returns the identity triple of this request.
    pub fn key(&self) -> AnalysisKey {
        AnalysisKey {
            instance_id: self.instance_id.clone(),
            analysis_id: self.analysis_id,
            revision: self.revision,
        }
    }

    /// Returns `true` if `response` carries exactly this request's identity.
    pub fn matches(&self, response: &AnalysisResponse) -> bool {
        self.instance_id == response.instance_id
            && self.analysis_id == response.analysis_id
            && self.revision == response.revision
    }
}

/// Status reported inside an [`AnalysisResponse`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStatus {
    /// Partial results; more will follow.
    #[default]
    Running,
    /// Final results.
    Complete,
    /// The analysis failed (or was cancelled); see [`AnalysisResponse::error`].
    Error,
}

/// Results produced by the worker for one request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub instance_id: String,
    pub analysis_id: u32,
    pub revision: u32,
    pub ns: String,
    pub name: String,
    pub status: AnalysisStatus,
    /// Serialized results; interpreted by the renderer only.
    pub results: Vec<u8>,
    /// Human-readable error message for `AnalysisStatus::Error`.
    pub error: Option<String>,
}

impl AnalysisResponse {
    /// Creates an empty response carrying `request`'s identity.
    pub fn for_request(request: &AnalysisRequest, status: AnalysisStatus) -> Self {
        Self {
            instance_id: request.instance_id.clone(),
            analysis_id: request.analysis_id,
            revision: request.revision,
            ns: request.ns.clone(),
            name: request.name.clone(),
            status,
            results: Vec::new(),
            error: None,
        }
    }

    /// Creates an error result for `request`.
    ///
    /// Used for results the engine synthesizes itself (cancellation, crash).
    pub fn error_for(request: &AnalysisRequest, message: impl Into<String>) -> Self {
        let mut response = Self::for_request(request, AnalysisStatus::Error);
        response.error = Some(message.into());
        response
    }

    #[inline]
    pub fn with_results(mut self, results: impl Into<Vec<u8>>) -> Self {
        self.results = results.into();
        self
    }

    /// Returns the identity triple of this response.
    pub fn key(&self) -> AnalysisKey {
        AnalysisKey {
            instance_id: self.instance_id.clone(),
            analysis_id: self.analysis_id,
            revision: self.revision,
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self.status, AnalysisStatus::Error)
    }
}
