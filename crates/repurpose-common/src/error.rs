use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepurposeError {
    #[error("Disease not found: {0}")]
    DiseaseNotFound(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Candidate {drug_id} could not be scored: {reason}")]
    CandidateComputation { drug_id: String, reason: String },

    #[error("Collaborator {source_name} unavailable: {reason}")]
    CollaboratorUnavailable { source_name: String, reason: String },

    #[error("Gate chain failed: {0}")]
    GateApplication(String),

    #[error("Startup failed: {0}")]
    StartupFatal(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network capabilities capped: {0}")]
    Security(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepurposeError {
    /// Recoverable errors degrade a single candidate, source or layer;
    /// everything else ends the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RepurposeError::CandidateComputation { .. }
                | RepurposeError::CollaboratorUnavailable { .. }
                | RepurposeError::GateApplication(_)
        )
    }

    /// Not-found conditions are reported to the caller as a message rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepurposeError::DiseaseNotFound(_) | RepurposeError::ModelNotFound(_)
        )
    }

    pub fn collaborator(source_name: &str, err: impl std::fmt::Display) -> Self {
        RepurposeError::CollaboratorUnavailable {
            source_name: source_name.to_string(),
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RepurposeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_split() {
        assert!(RepurposeError::GateApplication("boom".into()).is_recoverable());
        assert!(RepurposeError::collaborator("opentargets", "timeout").is_recoverable());
        assert!(!RepurposeError::DiseaseNotFound("x".into()).is_recoverable());
        assert!(!RepurposeError::StartupFatal("x".into()).is_recoverable());
    }

    #[test]
    fn test_not_found_message() {
        let e = RepurposeError::DiseaseNotFound("unobtainium fever".into());
        assert!(e.is_not_found());
        assert_eq!(e.to_string(), "Disease not found: unobtainium fever");
    }
}
