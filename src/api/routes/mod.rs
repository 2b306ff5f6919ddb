//! API route modules.

pub mod visit;
