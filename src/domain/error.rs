//! Error taxonomy of the command executor

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Type-erased error used for context and commit/rollback failures
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Outcome of a failed bound-command invocation.
///
/// `E` is whatever the command body returns on failure.
#[derive(Debug, Error)]
pub enum CommandError<E> {
    /// The command body failed and the rollback succeeded.
    #[error(transparent)]
    Execution(E),

    /// The context factory could not open a context; nothing ran.
    #[error("Error while opening a command context")]
    Context(#[source] BoxError),

    /// The body succeeded, commit failed, the rollback succeeded.
    #[error("Error during the commit of a command")]
    Commit(#[source] BoxError),

    /// A rollback failed. The underlying resource may be inconsistent.
    #[error("Error during the rollback of a command")]
    Rollback(#[source] ChainedError),
}

impl<E> CommandError<E> {
    /// The business error, if that is what this is.
    pub fn into_execution(self) -> Option<E> {
        match self {
            CommandError::Execution(e) => Some(e),
            _ => None,
        }
    }

    /// Rollback failures need an operator, not a retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandError::Rollback(_))
    }
}

/// An error together with the error that led to it.
///
/// Displays as `error`; `source()` yields `trigger`. A rollback failure
/// carries the rollback error here, triggered by the body or commit error.
#[derive(Debug)]
pub struct ChainedError {
    error: BoxError,
    trigger: BoxError,
}

impl ChainedError {
    pub fn new(error: impl Into<BoxError>, trigger: impl Into<BoxError>) -> Self {
        Self {
            error: error.into(),
            trigger: trigger.into(),
        }
    }

    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.error.as_ref()
    }

    pub fn trigger(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.trigger.as_ref()
    }
}

impl fmt::Display for ChainedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl StdError for ChainedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.trigger.as_ref())
    }
}
