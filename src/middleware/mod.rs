//! HTTP middleware
//!
//! - request logging with `X-Process-Time` and panic-to-500 handling
//! - `CurrentUser` bearer-token extractor
//! - redaction helpers for logged request data

pub mod auth;
pub mod redact;
pub mod request_log;

pub use auth::CurrentUser;
pub use request_log::{add_request_logging, request_logging_middleware, PROCESS_TIME_HEADER};
