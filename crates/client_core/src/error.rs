use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("request failed: {operation}: HTTP status {status}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("request failed: {operation}: malformed response envelope: {detail}")]
    EnvelopeMalformed {
        operation: &'static str,
        detail: String,
    },
    #[error("{list} item {id} not found")]
    NotFound { list: String, id: i64 },
    #[error("invalid input: {0}")]
    Validation(String),
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Transport { .. } | StoreError::Status { .. } => {
                ErrorCode::TransportFailure
            }
            StoreError::EnvelopeMalformed { .. } => ErrorCode::EnvelopeMalformed,
            StoreError::NotFound { .. } => ErrorCode::NotFound,
            StoreError::Validation(_) => ErrorCode::ValidationFailure,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    pub(crate) fn transport(operation: &'static str, source: reqwest::Error) -> Self {
        StoreError::Transport { operation, source }
    }

    pub(crate) fn malformed(operation: &'static str, detail: impl ToString) -> Self {
        StoreError::EnvelopeMalformed {
            operation,
            detail: detail.to_string(),
        }
    }
}

impl From<&StoreError> for ApiError {
    fn from(value: &StoreError) -> Self {
        ApiError::new(value.code(), value.to_string())
    }
}
