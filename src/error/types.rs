use thiserror::Error;

use crate::logging::LoggingError;

/// Unified result type for the navigation crate.
pub type Result<T> = std::result::Result<T, NavigationError>;

/// Structural errors surfaced by stack operations.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("stack `{0}` is empty")]
    EmptyStack(String),
    #[error("controller `{id}` is already in stack `{stack}`")]
    AlreadyInStack { id: String, stack: String },
    #[error("controller `{id}` is attached to stack `{other}`, cannot push into `{stack}`")]
    AttachedToOtherStack {
        id: String,
        stack: String,
        other: String,
    },
    #[error("stack `{stack}` already holds a controller with id `{id}`")]
    DuplicateId { id: String, stack: String },
    #[error("stack `{0}` cannot contain itself")]
    SelfPush(String),
    #[error("controller `{id}` is not in stack `{stack}`")]
    NotInStack { id: String, stack: String },
    #[error(transparent)]
    Logging(#[from] LoggingError),
}
