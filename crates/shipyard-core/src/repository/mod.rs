//! Repository trait definitions (ports).
//!
//! The deployment repository trait is implemented by the infrastructure
//! layer (shipyard-infra) for SQLite and here by an in-memory store used in
//! tests and local runs. Both persist the explicit record shape from
//! [`record`].

pub mod deployment;
pub mod memory;
pub mod record;
