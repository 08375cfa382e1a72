//! Workflow engine port and the adapter that starts executions.

pub mod engine;
pub mod trigger;
