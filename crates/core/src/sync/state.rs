//! Per-key sync state machine
//!
//! Phases move only in response to attempt outcomes. The engine keeps one
//! phase per sync key so the current state of any key can be inspected.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Syncing,
    /// Waiting to run retry number `attempt` (1-based).
    Retrying { attempt: u32 },
    Failed,
    Succeeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// A sync request acquired the key.
    Started,
    /// The stored hash already matches; nothing to push.
    Unchanged,
    Succeeded,
    /// A transient failure; `will_retry` is false once attempts run out.
    TransientFailure { will_retry: bool },
    TerminalFailure,
    /// A newer request took over the key.
    Superseded,
    /// The request was stopped between steps.
    Cancelled,
}

impl SyncPhase {
    /// Next phase, or `None` if `event` is not valid in this phase.
    pub fn next(self, event: SyncEvent) -> Option<Self> {
        use SyncEvent as E;

        match (self, event) {
            (Self::Idle | Self::Succeeded | Self::Failed, E::Started) => Some(Self::Syncing),
            (Self::Syncing, E::Unchanged) => Some(Self::Succeeded),
            (Self::Syncing | Self::Retrying { .. }, E::Succeeded) => Some(Self::Succeeded),
            (Self::Syncing, E::TransientFailure { will_retry: true }) => {
                Some(Self::Retrying { attempt: 1 })
            }
            (Self::Retrying { attempt }, E::TransientFailure { will_retry: true }) => {
                Some(Self::Retrying { attempt: attempt + 1 })
            }
            (
                Self::Syncing | Self::Retrying { .. },
                E::TransientFailure { will_retry: false } | E::TerminalFailure,
            ) => Some(Self::Failed),
            (Self::Syncing | Self::Retrying { .. }, E::Superseded | E::Cancelled) => {
                Some(Self::Idle)
            }
            _ => None,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Syncing | Self::Retrying { .. })
    }
}
