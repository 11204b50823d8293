//! Transition system: delivers last tick's events and performs default
//! propagation.
//!
//! Runs first in every tick. In order it:
//! 1. drains the events enqueued during the previous tick and activates their
//!    targets (Running, first entry, timer reset, `_activatedBy` recorded);
//! 2. enqueues deferred conditioned transitions whose condition now holds;
//! 3. for every Completed action not yet propagated, emits on the default
//!    output port and marks it propagated.
//!
//! Everything enqueued here is delivered at the start of the next tick.

use crate::frame::BlueprintFrame;
use crate::id::ActionIndex;
use crate::state::Phase;
use crate::system::{System, SystemContext, TRANSITION_ORDER};

#[derive(Debug, Default)]
pub struct TransitionSystem {
    delivered_total: u64,
    propagated_total: u64,
}

impl TransitionSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events delivered since the last load.
    pub fn delivered_total(&self) -> u64 {
        self.delivered_total
    }

    /// Actions default-propagated since the last load.
    pub fn propagated_total(&self) -> u64 {
        self.propagated_total
    }
}

impl System for TransitionSystem {
    fn name(&self) -> &str {
        "transition"
    }

    fn order(&self) -> i32 {
        TRANSITION_ORDER
    }

    fn on_load(&mut self, _frame: &BlueprintFrame) {
        self.delivered_total = 0;
        self.propagated_total = 0;
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) {
        let frame = &mut *ctx.frame;

        for event in frame.drain_pending() {
            if frame.deliver(event) {
                self.delivered_total += 1;
            }
        }

        frame.release_deferred();

        for i in 0..frame.action_count() {
            let index = ActionIndex::from(i);
            let needs_propagation = frame
                .state(index)
                .is_some_and(|s| s.phase == Phase::Completed && !s.transition_propagated);
            if needs_propagation {
                frame.emit_default(index);
                frame.mark_propagated(index);
                self.propagated_total += 1;
            }
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
