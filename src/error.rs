//! Error taxonomy, matching `common.hpp::Error` 1:1, following the
//! teacher's `thiserror`-derived `ConnectionError` shape.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RaptorqError {
    #[error("symbol not needed: already received or block already decoded")]
    NotNeeded,
    #[error("wrong input: {detail}")]
    WrongInput { detail: String },
    #[error("need more data to attempt a solve")]
    NeedData,
    #[error("a solve is already in progress")]
    Working,
    #[error("initialization error: {detail}")]
    Initialization { detail: String },
    #[error("cooperative shutdown in progress")]
    Exiting,
}

pub type Result<T> = std::result::Result<T, RaptorqError>;

impl RaptorqError {
    pub fn wrong_input(detail: impl Into<String>) -> Self {
        RaptorqError::WrongInput {
            detail: detail.into(),
        }
    }

    pub fn initialization(detail: impl Into<String>) -> Self {
        RaptorqError::Initialization {
            detail: detail.into(),
        }
    }
}
