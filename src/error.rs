use hyper::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Required field absent or empty; raised before any stage runs.
    #[error("No task provided")]
    Input,
    #[error("{0}")]
    Validation(String),
    #[error("internal failure in {stage}: {reason}")]
    Internal { stage: String, reason: String },
}

impl PipelineError {
    pub fn internal(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Internal {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Re-tags an internal failure with the stage that observed it; other
    /// variants pass through unchanged.
    pub fn in_stage(self, stage: &str) -> Self {
        match self {
            Self::Internal { reason, .. } => Self::Internal {
                stage: stage.to_string(),
                reason,
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Input | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients.
    pub fn public_message(&self) -> String {
        match self {
            Self::Internal { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(PipelineError::Input.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            PipelineError::Validation("Task too short".into()).status(),
            StatusCode::BAD_REQUEST
        );
        let internal = PipelineError::internal("save-task", "lock poisoned");
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.public_message(), "Internal server error");
        assert!(internal.to_string().contains("lock poisoned"));
    }

    #[test]
    fn in_stage_retags_without_nesting() {
        let err = PipelineError::internal("task-store", "lock poisoned").in_stage("save-task");
        assert_eq!(err.to_string(), "internal failure in save-task: lock poisoned");
        assert_eq!(
            PipelineError::Input.in_stage("save-task"),
            PipelineError::Input
        );
    }
}
