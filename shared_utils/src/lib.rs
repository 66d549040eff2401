//! Small helpers shared across the workspace.

pub mod config;
pub mod env;
