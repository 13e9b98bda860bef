use platform_authn::DirectoryError;
use platform_authz::{AuthzError, EntityKind};
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Authz(#[from] AuthzError),
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("class {class_id} is full ({capacity} students)")]
    ClassFull { class_id: i32, capacity: i32 },
    #[error("identity directory failed: {0}")]
    Directory(#[from] DirectoryError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] DbErr),
}

pub type ActionResult<T> = Result<T, ActionError>;

impl ActionError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        ActionError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ActionError::InvalidInput(message.into())
    }

    /// Failures caused by the caller or the data they sent, as opposed to
    /// failures of a backing service.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            ActionError::Directory(_) | ActionError::Persistence(_)
        )
    }

    /// Short machine-readable class, used in log fields.
    pub fn class(&self) -> &'static str {
        match self {
            ActionError::Authz(AuthzError::Unauthorized { .. }) => "unauthorized",
            ActionError::Authz(AuthzError::Forbidden { .. }) => "forbidden",
            ActionError::NotFound { .. } => "not_found",
            ActionError::InvalidInput(_) => "invalid_input",
            ActionError::ClassFull { .. } => "class_full",
            ActionError::Directory(_) => "directory",
            ActionError::Persistence(_) => "persistence",
        }
    }
}
