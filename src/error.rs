use thiserror::Error;

use crate::portfolio_tools::types::ValidationError;
use crate::portfolio_tools::wizard::WizardError;
use crate::storage::StorageError;

pub type ServiceResult<T> = core::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Wizard(#[from] WizardError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("{0}")]
    GateClosed(String),
    #[error("Entry no longer matches the portfolio: {0}")]
    StaleEntry(String),
    #[error("{0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    IoError(#[from] std::io::Error),
    #[error("{0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Failures that leave the remote document untouched and can be retried by
    /// re-running the same command.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Network(_) | ServiceError::Rejected { status: 500..=599, .. })
    }
}

impl From<dialoguer::Error> for ServiceError {
    fn from(err: dialoguer::Error) -> Self {
        ServiceError::Other(format!("Prompt failed: {err}"))
    }
}
