//! Error types for mentor-core.

use thiserror::Error;

/// Result type alias using mentor-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while tracking learner context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed store/retrieve input
    #[error("Validation error on `{field}`: {message}")]
    Validation { field: String, message: String },

    /// Unknown session, experience or path id
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Phase skip or ungated mastery change
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// A bounded loop ran past its iteration limit
    #[error("Iteration limit {limit} exhausted during {operation}")]
    Exhaustion { operation: String, limit: usize },

    /// Component error annotated by the orchestrator
    #[error("{request_type} request for session {session_id} failed: {source}")]
    Request {
        request_type: String,
        session_id: String,
        #[source]
        source: Box<Error>,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error for a named input field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    /// Create a state conflict error.
    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::StateConflict(message.into())
    }

    /// Create an exhaustion error.
    pub fn exhausted(operation: impl Into<String>, limit: usize) -> Self {
        Self::Exhaustion {
            operation: operation.into(),
            limit,
        }
    }

    /// Wrap this error with the request that produced it.
    pub fn in_request(self, request_type: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::Request {
            request_type: request_type.into(),
            session_id: session_id.into(),
            source: Box::new(self),
        }
    }

    /// The innermost component error, skipping request wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Self::Request { source, .. } => source.root(),
            other => other,
        }
    }

    /// Short machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self.root() {
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::StateConflict(_) => "state_conflict",
            Self::Exhaustion { .. } => "exhaustion",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
            Self::Internal(_) | Self::Request { .. } => "internal",
        }
    }

    /// Guidance for a caller that wants to retry the failed request.
    pub fn recommendations(&self) -> Vec<String> {
        match self.root() {
            Self::Validation { field, message } => vec![
                format!("Fix field `{}`: {}", field, message),
                "Resubmit the request with corrected input".to_string(),
            ],
            Self::NotFound { kind, id } => vec![
                format!("No {} with id `{}` exists", kind, id),
                "Send an initialize request before other request types".to_string(),
            ],
            Self::StateConflict(message) => vec![
                message.clone(),
                "Fetch a snapshot to inspect current phase and mastery".to_string(),
            ],
            Self::Exhaustion { operation, .. } => vec![format!(
                "{} stopped early; prior state is unchanged and the request can be retried",
                operation
            )],
            Self::Serialization(_) | Self::Config(_) | Self::Internal(_) | Self::Request { .. } => {
                vec!["Retry the request; report the error if it persists".to_string()]
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wrapping_keeps_root_kind() {
        let err = Error::validation("content", "must not be empty").in_request("store", "s-1");

        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("store request for session s-1"));
        assert!(matches!(err.root(), Error::Validation { .. }));
    }

    #[test]
    fn test_recommendations_name_the_field() {
        let err = Error::validation("concepts", "at least one concept is required");
        let recs = err.recommendations();

        assert!(recs[0].contains("concepts"));
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found("experience", "abc");
        assert_eq!(err.to_string(), "experience not found: abc");
    }
}
