//! REST API handlers

pub mod generic;

pub use generic::generic_routes;
