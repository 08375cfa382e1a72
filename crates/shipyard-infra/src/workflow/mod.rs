//! Workflow engine clients.

pub mod http;
