//! Error types for key analysis

use thiserror::Error;

/// Errors that can occur during analysis
///
/// `EmptySignal` and `NoConvergence` are recoverable: [`crate::analyze`]
/// reports them as a no-result [`crate::AnalysisResult`] instead of failing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Decode error: {0}")]
    DecodeFailure(String),
    #[error("Signal is empty or silent after conditioning")]
    EmptySignal,
    #[error("No window produced a key vote")]
    NoConvergence,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl AnalysisError {
    /// True for outcomes the caller should treat as "no key", not as failures
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AnalysisError::EmptySignal | AnalysisError::NoConvergence)
    }
}
