//! Async command execution for contexts backed by async resources (database
//! transactions). Same commit/rollback protocol as the sync executor, plus a
//! fallible context factory.

use std::error::Error as StdError;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::error::{BoxError, ChainedError, CommandError};
use crate::telemetry::log_error;

/// Boxed future returned by async commands; borrows the context for `'c`.
pub type CommandFuture<'c, R, E> = Pin<Box<dyn Future<Output = Result<R, E>> + Send + 'c>>;

#[async_trait]
pub trait AsyncCommandContext: Send {
    type Error: StdError + Send + Sync + 'static;

    async fn commit(&mut self) -> Result<(), Self::Error>;
    async fn rollback(&mut self) -> Result<(), Self::Error>;
}

/// Opens a new context for every command invocation.
#[async_trait]
pub trait AsyncContextFactory: Send + Sync {
    type Context: AsyncCommandContext;

    async fn create_context(&self) -> Result<Self::Context, BoxError>;
}

pub struct AsyncDomain<F> {
    context_factory: Arc<F>,
}

impl<F> Clone for AsyncDomain<F> {
    fn clone(&self) -> Self {
        Self {
            context_factory: Arc::clone(&self.context_factory),
        }
    }
}

impl<F: AsyncContextFactory> AsyncDomain<F> {
    pub fn new(context_factory: F) -> Self {
        Self::from_shared(Arc::new(context_factory))
    }

    /// Share a factory that is also used elsewhere (e.g. a connection pool).
    pub fn from_shared(context_factory: Arc<F>) -> Self {
        Self { context_factory }
    }

    pub fn bind_command<A, R, E, Cmd>(&self, command: Cmd) -> AsyncBoundCommand<F, Cmd, A, R, E>
    where
        Cmd: for<'c> Fn(&'c mut F::Context, A) -> CommandFuture<'c, R, E> + Send + Sync,
    {
        AsyncBoundCommand {
            name: std::any::type_name::<Cmd>(),
            command,
            context_factory: Arc::clone(&self.context_factory),
            _signature: PhantomData,
        }
    }
}

pub struct AsyncBoundCommand<F, Cmd, A, R, E> {
    name: &'static str,
    command: Cmd,
    context_factory: Arc<F>,
    _signature: PhantomData<fn(A) -> Result<R, E>>,
}

impl<F, Cmd, A, R, E> AsyncBoundCommand<F, Cmd, A, R, E> {
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<F, Cmd, A, R, E> AsyncBoundCommand<F, Cmd, A, R, E>
where
    F: AsyncContextFactory,
    Cmd: for<'c> Fn(&'c mut F::Context, A) -> CommandFuture<'c, R, E> + Send + Sync,
    A: Debug,
    R: Debug,
    E: StdError + Send + Sync + 'static,
{
    pub async fn call(&self, args: A) -> Result<R, CommandError<E>> {
        tracing::debug!(
            command_name = self.name,
            command_args = ?args,
            "Command about to be called"
        );

        let start_time = Instant::now();
        let mut context = match self.context_factory.create_context().await {
            Ok(context) => context,
            Err(context_error) => {
                log_error(
                    "An unexpected error occurred while opening the command context",
                    &context_error,
                );
                return Err(CommandError::Context(context_error));
            }
        };

        let result = match (self.command)(&mut context, args).await {
            Ok(result) => result,
            Err(execution_error) => {
                log_error(
                    "An unexpected error occurred during command execution, rollback will be applied.",
                    &execution_error,
                );
                if let Err(rollback_error) = context.rollback().await {
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

        if let Err(commit_error) = context.commit().await {
            log_error(
                "An unexpected error occurred during command commit",
                &commit_error,
            );
            if let Err(rollback_error) = context.rollback().await {
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
