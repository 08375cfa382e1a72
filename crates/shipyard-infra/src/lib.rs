//! Infrastructure layer for Shipyard.
//!
//! Contains implementations of the ports defined in `shipyard-core`:
//! SQLite deployment storage, HTTP clients for the workflow engine and the
//! container-orchestration API, and config file loading.

pub mod config;
pub mod orchestration;
pub mod sqlite;
pub mod workflow;
