//! Shared domain types for Shipyard.
//!
//! This crate contains the domain types used across the Shipyard workspace:
//! Deployment, EnvironmentRevision, task state snapshots, workflow requests,
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod deployment;
pub mod environment;
pub mod error;
pub mod signal;
pub mod task;
pub mod workflow;
