//! Backend Utils
//!
//! Building blocks shared by web-service backends: a transactional command
//! executor, JWT helpers, a generic CRUD repository, request logging
//! middleware and the configuration and telemetry plumbing around them.

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod middleware;
pub mod paths;
pub mod repository;
pub mod server;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
