//! Coordination Client Error Hierarchy
//!
//! Service-level failures reported by the coordination service are kept
//! distinct from local conditions (interruption, configuration, strategy
//! selection) so callers can decide what is worth retrying.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failures raised by the coordination service or its client layer
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A blocking call was cancelled by the caller's execution context
    #[error("Operation interrupted")]
    Interrupted,

    /// Settings loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A call was issued before any strategy was selected, or after close
    #[error("No execution strategy has been selected")]
    NoActiveStrategy,

    /// Node payload could not be decoded as UTF-8
    #[error("Node {0} does not hold UTF-8 data")]
    InvalidData(String),

    /// Retry policy exhaustion
    #[error("Retry exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: usize, last: Box<Error> },

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Node does not exist: {0}")]
    NoNode(String),

    #[error("Node already exists: {0}")]
    NodeExists(String),

    #[error("Node has children: {0}")]
    NotEmpty(String),

    #[error("Version mismatch on {0}")]
    BadVersion(String),

    #[error("Not authorized for {0}")]
    NoAuth(String),

    #[error("Ephemeral node {0} cannot have children")]
    NoChildrenForEphemerals(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Connection to the coordination service lost")]
    ConnectionLoss,

    #[error("Operation timed out")]
    OperationTimeout,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session moved to another server")]
    SessionMoved,
}

impl ServiceError {
    /// Transient conditions where re-issuing the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::ConnectionLoss | ServiceError::OperationTimeout | ServiceError::SessionMoved
        )
    }
}

impl Error {
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Service(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// `true` when this is `Service(NoNode)`
    pub fn is_no_node(&self) -> bool {
        matches!(self, Error::Service(ServiceError::NoNode(_)))
    }

    /// `true` when this is `Service(NodeExists)`
    pub fn is_node_exists(&self) -> bool {
        matches!(self, Error::Service(ServiceError::NodeExists(_)))
    }

    /// Returns the service error carried by this error, if any
    pub fn service(&self) -> Option<&ServiceError> {
        match self {
            Error::Service(e) => Some(e),
            Error::RetryExhausted { last, .. } => last.service(),
            _ => None,
        }
    }
}
