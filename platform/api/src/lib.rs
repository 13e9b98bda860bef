//! GraphQL error shaping for the school API.
//!
//! Every error leaving a resolver carries a stable `code` extension. Store
//! and directory failures are logged and replaced by a generic message.

use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use platform_authz::AuthzError;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("login required")]
    Unauthenticated,
    #[error("role not permitted")]
    Unauthorized,
    #[error("insufficient permissions")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

/// Role denials and ownership denials keep distinct codes; the detail
/// (who, which entity) stays in the logs.
impl From<&AuthzError> for ApiError {
    fn from(value: &AuthzError) -> Self {
        match value {
            AuthzError::Unauthorized { .. } => ApiError::Unauthorized,
            AuthzError::Forbidden { .. } => ApiError::Forbidden,
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        if let ApiError::Internal(inner) = self {
            tracing::error!(error = %inner, "internal error hidden from client");
        }
        let code = self.code();
        Error::new(self.to_string()).extend_with(|_err, e| {
            e.set("code", code);
        })
    }
}

pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}
