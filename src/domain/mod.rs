//! Transactional command execution
//!
//! A [`Domain`] binds business commands to a context factory. Every call of a
//! [`BoundCommand`] opens a fresh context, runs the command against it and then
//! commits (body succeeded) or rolls back (body or commit failed). Failures of
//! the commit/rollback phase surface as distinct [`CommandError`] kinds with
//! the original errors kept in the `source()` chain.
//!
//! ```ignore
//! let domain = Domain::new(|| PlainContext::default());
//! let divide = domain.bind_command(|_ctx: &mut PlainContext, (a, b): (i64, i64)| {
//!     a.checked_div(b).ok_or(DivisionByZero)
//! });
//! assert_eq!(divide.call((10, 2)).unwrap(), 5);
//! ```

mod asynchronous;
mod error;

pub use asynchronous::{
    AsyncBoundCommand, AsyncCommandContext, AsyncContextFactory, AsyncDomain, CommandFuture,
};
pub use error::{BoxError, ChainedError, CommandError};

use std::error::Error as StdError;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use crate::telemetry::log_error;

/// Resource handle a command runs against, created once per invocation.
pub trait CommandContext {
    type Error: StdError + Send + Sync + 'static;

    fn commit(&mut self) -> Result<(), Self::Error>;
    fn rollback(&mut self) -> Result<(), Self::Error>;
}

/// Binds commands to a context factory.
pub struct Domain<F> {
    context_factory: Arc<F>,
}

impl<F> Clone for Domain<F> {
    fn clone(&self) -> Self {
        Self {
            context_factory: Arc::clone(&self.context_factory),
        }
    }
}

impl<F, C> Domain<F>
where
    F: Fn() -> C,
    C: CommandContext,
{
    pub fn new(context_factory: F) -> Self {
        Self {
            context_factory: Arc::new(context_factory),
        }
    }

    /// Wrap `command` so callers only supply its arguments.
    pub fn bind_command<A, R, E, Cmd>(&self, command: Cmd) -> BoundCommand<F, Cmd, A, R, E>
    where
        Cmd: Fn(&mut C, A) -> Result<R, E>,
    {
        BoundCommand {
            name: std::any::type_name::<Cmd>(),
            command,
            context_factory: Arc::clone(&self.context_factory),
            _signature: PhantomData,
        }
    }
}

/// A command with its context lifecycle hidden from the caller.
pub struct BoundCommand<F, Cmd, A, R, E> {
    name: &'static str,
    command: Cmd,
    context_factory: Arc<F>,
    _signature: PhantomData<fn(A) -> Result<R, E>>,
}

impl<F, Cmd, A, R, E> BoundCommand<F, Cmd, A, R, E> {
    /// Name used in diagnostics; defaults to the command's type path.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<F, C, Cmd, A, R, E> BoundCommand<F, Cmd, A, R, E>
where
    F: Fn() -> C,
    C: CommandContext,
    Cmd: Fn(&mut C, A) -> Result<R, E>,
    A: Debug,
    R: Debug,
    E: StdError + Send + Sync + 'static,
{
    /// Run the command in a fresh context, then commit or roll back.
    pub fn call(&self, args: A) -> Result<R, CommandError<E>> {
        tracing::debug!(
            command_name = self.name,
            command_args = ?args,
            "Command about to be called"
        );

        let start_time = Instant::now();
        let mut context = (self.context_factory)();

        let result = match (self.command)(&mut context, args) {
            Ok(result) => result,
            Err(execution_error) => {
                log_error(
                    "An unexpected error occurred during command execution, rollback will be applied.",
                    &execution_error,
                );
                if let Err(rollback_error) = context.rollback() {
                    log_error(
                        "An unexpected error occurred during command rollback",
                        &rollback_error,
                    );
                    return Err(CommandError::Rollback(ChainedError::new(
                        rollback_error,
                        execution_error,
                    )));
                }
                return Err(CommandError::Execution(execution_error));
            }
        };

        if let Err(commit_error) = context.commit() {
            log_error(
                "An unexpected error occurred during command commit",
                &commit_error,
            );
            if let Err(rollback_error) = context.rollback() {
                log_error(
                    "An unexpected error occurred during command rollback after a commit failed",
                    &rollback_error,
                );
                return Err(CommandError::Rollback(ChainedError::new(
                    rollback_error,
                    commit_error,
                )));
            }
            return Err(CommandError::Commit(Box::new(commit_error)));
        }

        tracing::debug!(
            command_name = self.name,
            result = ?result,
            duration = start_time.elapsed().as_secs_f64(),
            "Command returned"
        );
        Ok(result)
    }
}
