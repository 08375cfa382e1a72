//! Container-orchestration port and the task state poller.

pub mod poller;
pub mod task_source;
