//! Transition signals fed into the deployment state machine.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Classified outcome of a workflow step, used as state machine input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskSignal {
    /// The workflow execution has been started.
    Start,
    /// Tasks are healthy so far but the rollout has not finished.
    TaskHealthyButIncomplete,
    /// Every desired task is running and healthy.
    TaskAllHealthyAndComplete,
    /// A task failed, stopped, reported unhealthy, or the deployment ran
    /// past its deadline.
    TaskUnhealthyOrTimedOut,
}

impl TaskSignal {
    pub const ALL: [TaskSignal; 4] = [
        TaskSignal::Start,
        TaskSignal::TaskHealthyButIncomplete,
        TaskSignal::TaskAllHealthyAndComplete,
        TaskSignal::TaskUnhealthyOrTimedOut,
    ];
}

impl fmt::Display for TaskSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskSignal::Start => write!(f, "start"),
            TaskSignal::TaskHealthyButIncomplete => write!(f, "taskHealthyButIncomplete"),
            TaskSignal::TaskAllHealthyAndComplete => write!(f, "taskAllHealthyAndComplete"),
            TaskSignal::TaskUnhealthyOrTimedOut => write!(f, "taskUnhealthyOrTimedOut"),
        }
    }
}

impl FromStr for TaskSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskSignal::ALL
            .into_iter()
            .find(|signal| signal.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid task signal: '{s}'"))
    }
}
