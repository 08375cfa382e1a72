//! Container-orchestration API clients.

pub mod http;
