use std::sync::Arc;

use crate::analysis::{AnalysisRequest, AnalysisResponse, ResultChannel};

/// Message of the error result delivered to superseded or aborted analyses.
pub const CANCELLED_MESSAGE: &str = "This analysis has been cancelled";

/// Message of the error result delivered when the worker dies mid-analysis.
pub const CRASHED_MESSAGE: &str = "The analysis engine stopped unexpectedly";

/// One request paired with the channel its results go to.
#[derive(Clone, Debug)]
pub struct Analysis {
    pub request: Arc<AnalysisRequest>,
    pub results: ResultChannel<AnalysisResponse>,
}

impl Analysis {
    pub fn new(request: AnalysisRequest, results: ResultChannel<AnalysisResponse>) -> Self {
        Self {
            request: Arc::new(request),
            results,
        }
    }

    /// Resolves the channel with an error result, unless it is already resolved.
    ///
    /// Returns `true` if this call settled the channel.
    pub fn cancel(&self, message: &str) -> bool {
        if self.results.is_resolved() {
            return false;
        }
        self.results
            .resolve(AnalysisResponse::error_for(&self.request, message))
    }
}
