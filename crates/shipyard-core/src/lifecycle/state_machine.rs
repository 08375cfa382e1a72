//! Deployment state machine.
//!
//! Pure transition function over `(DeploymentStatus, TaskSignal)`. Storage
//! and side effects live in [`super::manager`]; this module only decides.
//!
//! ```text
//!   Pending ──start──▶ InProgress ──allHealthyAndComplete──▶ Completed
//!                          │  ▲
//!                          │  └─ healthyButIncomplete (stay)
//!                          └──────unhealthyOrTimedOut──────▶ Failed
//! ```

use shipyard_types::deployment::DeploymentStatus;
use shipyard_types::signal::TaskSignal;
use shipyard_types::workflow::Rejection;

/// Decision for one signal applied to one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to a new status.
    Advance(DeploymentStatus),
    /// Valid signal, but the status does not change.
    Stay(DeploymentStatus),
    /// The signal cannot be applied from this status.
    Reject(Rejection),
}

impl Transition {
    /// Status the deployment should end up in, if the signal was accepted.
    pub fn target(self) -> Option<DeploymentStatus> {
        match self {
            Transition::Advance(status) | Transition::Stay(status) => Some(status),
            Transition::Reject(_) => None,
        }
    }

    pub fn is_advance(self) -> bool {
        matches!(self, Transition::Advance(_))
    }
}

/// Decide what `signal` does to a deployment in `current`.
///
/// Re-applying the signal that produced the current status is a `Stay`, so
/// duplicate workflow deliveries are harmless. Terminal states reject
/// everything.
pub fn transition(current: DeploymentStatus, signal: TaskSignal) -> Transition {
    use DeploymentStatus::*;
    use TaskSignal::*;

    match (current, signal) {
        (Completed | Failed, _) => Transition::Reject(Rejection::Terminal { status: current }),

        (Pending, Start) => Transition::Advance(InProgress),
        (Pending, TaskHealthyButIncomplete) => Transition::Reject(Rejection::NotYet),
        (Pending, TaskAllHealthyAndComplete | TaskUnhealthyOrTimedOut) => {
            Transition::Reject(Rejection::Illegal)
        }

        (InProgress, Start | TaskHealthyButIncomplete) => Transition::Stay(InProgress),
        (InProgress, TaskAllHealthyAndComplete) => Transition::Advance(Completed),
        (InProgress, TaskUnhealthyOrTimedOut) => Transition::Advance(Failed),
    }
}
