use thiserror::Error;

use crate::types::InstallmentId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MoraError {
    #[error("configuration unavailable: {message}")]
    ConfigurationUnavailable {
        message: String,
    },

    #[error("invalid configuration: {field} {message}")]
    InvalidConfiguration {
        field: String,
        message: String,
    },

    #[error("repository fetch failed: {message}")]
    RepositoryFetchFailed {
        message: String,
    },

    #[error("installment update failed: {installment_id}: {message}")]
    InstallmentUpdateFailed {
        installment_id: InstallmentId,
        message: String,
    },

    #[error("installment not found: {installment_id}")]
    InstallmentNotFound {
        installment_id: InstallmentId,
    },

    #[error("serialization error: {message}")]
    Serialization {
        message: String,
    },
}

impl MoraError {
    /// whether this error aborts a whole accrual run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MoraError::InstallmentUpdateFailed { .. })
    }
}

impl From<serde_json::Error> for MoraError {
    fn from(e: serde_json::Error) -> Self {
        MoraError::Serialization {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MoraError>;
