//! Error handler for connectors.

use std::time::Duration;

use thiserror::Error;
use validator::ValidationErrors;

use crate::directory::DirectoryError;

pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Enum representing connector-side errors.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("invalid credential input: {0}")]
    InvalidInput(#[from] ValidationErrors),

    #[error("directory rejected the supplied credentials")]
    InvalidCredentials,

    #[error("directory backend unavailable: {0}")]
    Unavailable(#[source] DirectoryError),

    #[error("directory {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("no group lists principal {principal}")]
    RoleNotFound { principal: String },
}

/// Coarse error categories a caller can act on.
///
/// `InvalidCredentialInput` and `RoleNotFound` are caller-side problems,
/// `BackendUnavailable` covers everything that went wrong on the directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidCredentialInput,
    BackendUnavailable,
    RoleNotFound,
}

impl ConnectorError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectorError::InvalidInput(_) => ErrorKind::InvalidCredentialInput,
            ConnectorError::InvalidCredentials
            | ConnectorError::Unavailable(_)
            | ConnectorError::Timeout { .. } => ErrorKind::BackendUnavailable,
            ConnectorError::RoleNotFound { .. } => ErrorKind::RoleNotFound,
        }
    }

    /// Whether retrying later, with backoff, may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectorError::Unavailable(_) | ConnectorError::Timeout { .. }
        )
    }

    /// Short label used for metrics and logs.
    pub(crate) fn outcome(&self) -> &'static str {
        match self {
            ConnectorError::InvalidInput(_) => "invalid_input",
            ConnectorError::InvalidCredentials => "invalid_credentials",
            ConnectorError::Unavailable(_) => "unavailable",
            ConnectorError::Timeout { .. } => "timeout",
            ConnectorError::RoleNotFound { .. } => "role_not_found",
        }
    }
}

impl From<DirectoryError> for ConnectorError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::InvalidCredentials => ConnectorError::InvalidCredentials,
            err => ConnectorError::Unavailable(err),
        }
    }
}
