//! The deployment lifecycle: state machine, storage retries, the manager
//! that ties the record store to the workflow collaborators, and the
//! reconciliation sweeps.

pub mod manager;
pub mod retry;
pub mod state_machine;
pub mod sweep;

#[cfg(test)]
pub(crate) mod fakes;
