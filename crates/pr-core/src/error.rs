use crate::types::enums::ReviewStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("review not found")]
    ReviewNotFound,
    #[error("comment not found")]
    CommentNotFound,
    #[error("version not found")]
    VersionNotFound,
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ReviewStatus,
        to: ReviewStatus,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("store error: {message}")]
    Store { message: String },
}

impl ReviewError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}

impl From<crate::types::ids::IdError> for ReviewError {
    fn from(value: crate::types::ids::IdError) -> Self {
        Self::InvalidInput {
            message: value.to_string(),
        }
    }
}
