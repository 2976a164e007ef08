/// Convenience result type used across recut.
pub type RecutResult<T> = Result<T, RecutError>;

/// Top-level error taxonomy used by pipeline APIs.
#[derive(thiserror::Error, Debug)]
pub enum RecutError {
    /// Frame signal was empty or shorter than one minimum scene window.
    #[error("segmentation error: {0}")]
    Segmentation(String),

    /// Invalid cut policy or run configuration. Never retried.
    #[error("policy error: {0}")]
    Policy(String),

    /// Invalid caller-provided data outside of the policy surface.
    #[error("validation error: {0}")]
    Validation(String),

    /// An external transform failed, produced no output, or timed out.
    #[error("stage execution error: {0}")]
    StageExecution(String),

    /// Disk, memory or CPU stayed critical after cleanup.
    #[error("resources exhausted: {0}")]
    ResourceExhausted(String),

    /// Every degrade strategy for a stage was exhausted.
    #[error("processing failed in stage '{stage}' after {attempts} attempts: {cause}")]
    ProcessingFailure {
        /// Stage that could not be completed.
        stage: String,
        /// Total attempts made across all strategies.
        attempts: u32,
        /// Last underlying failure.
        #[source]
        cause: Box<RecutError>,
    },

    /// Cooperative cancellation was honoured.
    #[error("cancelled")]
    Cancelled,

    /// An in-flight stage was stopped because resources turned critical.
    ///
    /// Handled inside the recovery supervisor; callers never observe it.
    #[error("stage pre-empted: {0}")]
    Preempted(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RecutError {
    /// Build a [`RecutError::Segmentation`] value.
    pub fn segmentation(msg: impl Into<String>) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Build a [`RecutError::Policy`] value.
    pub fn policy(msg: impl Into<String>) -> Self {
        Self::Policy(msg.into())
    }

    /// Build a [`RecutError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`RecutError::StageExecution`] value.
    pub fn stage(msg: impl Into<String>) -> Self {
        Self::StageExecution(msg.into())
    }

    /// Build a [`RecutError::ResourceExhausted`] value.
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Build a [`RecutError::Preempted`] value.
    pub fn preempted(msg: impl Into<String>) -> Self {
        Self::Preempted(msg.into())
    }

    /// Build a [`RecutError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` when the recovery supervisor may degrade and retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StageExecution(_))
    }

    /// `true` for errors that must end the pipeline run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ResourceExhausted(_) | Self::ProcessingFailure { .. } | Self::Policy(_)
        )
    }
}

impl From<std::io::Error> for RecutError {
    fn from(e: std::io::Error) -> Self {
        Self::Other(anyhow::Error::new(e))
    }
}

impl From<serde_json::Error> for RecutError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
