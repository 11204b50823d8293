//! Per-action runtime state and the cross-tick activation message.

use serde::{Deserialize, Serialize};

use crate::id::ActionIndex;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Coarse execution state of one action.
///
/// ```text
/// Idle -> Running -> Listening -> Running ...
///            |           |
///            +-----------+--> Completed | Cancelled   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    /// Not reached yet.
    #[default]
    Idle,
    /// Driven by a system this tick or later.
    Running,
    /// One pulse finished; holds a re-entrant subscription and returns to
    /// `Running` on a later event.
    Listening,
    /// Terminal. Propagates on the default output port.
    Completed,
    /// Terminal. Never propagates.
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled)
    }

    /// Running or Listening.
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Running | Phase::Listening)
    }
}

// ---------------------------------------------------------------------------
// ActionRuntimeState
// ---------------------------------------------------------------------------

/// Mutable state of one action. Stored in an array aligned with the compiled
/// action list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRuntimeState {
    pub phase: Phase,
    /// Tick boundaries crossed since the last phase change.
    pub ticks_in_phase: u64,
    /// True for the tick of an activation until the consuming system clears it.
    pub is_first_entry: bool,
    /// Set once the node's outgoing events have been emitted, suppressing
    /// the default propagation pass.
    pub transition_propagated: bool,
}

impl ActionRuntimeState {
    /// Move to `phase`, resetting the phase timer when the phase changes.
    /// Returns whether the phase changed.
    pub(crate) fn enter(&mut self, phase: Phase) -> bool {
        if self.phase == phase {
            return false;
        }
        self.phase = phase;
        self.ticks_in_phase = 0;
        true
    }

    /// Apply an activation: Running, first entry, timer reset.
    pub(crate) fn activate(&mut self) {
        self.phase = Phase::Running;
        self.ticks_in_phase = 0;
        self.is_first_entry = true;
        self.transition_propagated = false;
    }

    /// Consume the first-entry flag, returning its previous value.
    pub fn take_first_entry(&mut self) -> bool {
        std::mem::take(&mut self.is_first_entry)
    }
}

// ---------------------------------------------------------------------------
// PortEvent
// ---------------------------------------------------------------------------

/// An activation travelling along one transition. Enqueued during tick N and
/// delivered at the start of tick N+1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortEvent {
    pub from: ActionIndex,
    pub from_port: String,
    pub to: ActionIndex,
    pub to_port: String,
}

impl PortEvent {
    pub fn new(
        from: ActionIndex,
        from_port: impl Into<String>,
        to: ActionIndex,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            from,
            from_port: from_port.into(),
            to,
            to_port: to_port.into(),
        }
    }
}
