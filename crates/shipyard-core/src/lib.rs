//! Deployment lifecycle logic and port definitions for Shipyard.
//!
//! This crate defines the "ports" (repository, workflow engine, task state
//! source) that the infrastructure layer implements, plus the pure state
//! machine and the lifecycle manager that drives it. It depends only on
//! `shipyard-types` -- never on `shipyard-infra` or any database/IO crate.

pub mod lifecycle;
pub mod orchestration;
pub mod repository;
pub mod workflow;
