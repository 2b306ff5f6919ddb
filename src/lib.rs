pub mod api;
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod global;
pub mod media;
pub mod visit;

pub use error::{GatewayError, VisitError};
