use thiserror::Error;

/// Failure taxonomy shared by every engine.
///
/// Messages coming from a server are carried verbatim so the caller sees the
/// same diagnostic the engine produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("local engine unreachable at {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    #[error("local engine at {endpoint} reports no installed checkpoints")]
    NoModels { endpoint: String },

    #[error("job graph rejected: {0}")]
    Queue(String),

    #[error("generation timed out after {attempts} polls")]
    Timeout { attempts: u32 },

    #[error("cloud credentials rejected: {0}")]
    InvalidCredentials(String),

    #[error("cloud quota exhausted: {0}")]
    Quota(String),

    #[error("generation finished without an artifact: {0}")]
    EmptyResult(String),

    #[error("failed to fetch generated artifact: {0}")]
    ArtifactFetch(String),

    #[error("cloud operation failed: {0}")]
    Operation(String),

    #[error("{service} request failed ({status}): {message}")]
    Service {
        service: String,
        status: u16,
        message: String,
    },

    #[error("{0}")]
    Protocol(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    NoModels,
    Queue,
    Timeout,
    InvalidCredentials,
    Quota,
    EmptyResult,
    ArtifactFetch,
    Operation,
    Service,
    Protocol,
}

impl GenerationError {
    pub fn connection(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::NoModels { .. } => ErrorKind::NoModels,
            Self::Queue(_) => ErrorKind::Queue,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
            Self::Quota(_) => ErrorKind::Quota,
            Self::EmptyResult(_) => ErrorKind::EmptyResult,
            Self::ArtifactFetch(_) => ErrorKind::ArtifactFetch,
            Self::Operation(_) => ErrorKind::Operation,
            Self::Service { .. } => ErrorKind::Service,
            Self::Protocol(_) => ErrorKind::Protocol,
        }
    }

    /// Failures the local fallback chain absorbs instead of surfacing.
    pub fn is_recoverable_locally(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::NoModels
        )
    }

    pub fn is_connectivity(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, GenerationError};

    #[test]
    fn local_chain_absorbs_only_infrastructure_failures() {
        assert!(GenerationError::connection("http://x", "refused").is_recoverable_locally());
        assert!(GenerationError::Timeout { attempts: 60 }.is_recoverable_locally());
        assert!(GenerationError::NoModels {
            endpoint: "http://x".to_string()
        }
        .is_recoverable_locally());
        assert!(!GenerationError::Queue("bad ckpt".to_string()).is_recoverable_locally());
        assert!(!GenerationError::Quota("limit".to_string()).is_recoverable_locally());
    }

    #[test]
    fn queue_error_keeps_server_message() {
        let err = GenerationError::Queue("Value not in list: ckpt_name".to_string());
        assert_eq!(err.kind(), ErrorKind::Queue);
        assert_eq!(
            err.to_string(),
            "job graph rejected: Value not in list: ckpt_name"
        );
    }
}
