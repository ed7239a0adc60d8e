use std::time::Duration;

use thiserror::Error;

/// Errors raised by the wizard controller and its collaborators
#[derive(Error, Debug)]
pub enum WizardError {
    #[error("An analysis request is already in flight")]
    SubmissionInProgress,

    #[error("Invalid answer for {field}: {reason}")]
    InvalidAnswer { field: String, reason: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
}

impl WizardError {
    pub fn invalid_answer(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAnswer {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failures of the remote analysis call
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Analysis service returned HTTP {status}")]
    Status { status: u16 },

    #[error("Malformed analysis response: {0}")]
    Malformed(String),

    #[error("Analysis service rejected the request: {0}")]
    Rejected(String),

    #[error("Analysis timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, WizardError>;
