//! Timed waits.
//!
//! A `delay` action completes `ticks` ticks after its activation (property
//! `ticks`, default 1): activated at tick N, it completes during tick
//! `N + ticks - 1` and its successors run from tick `N + ticks`. A delay of 0
//! behaves like a delay of 1.

use blueprint_core::frame::BlueprintFrame;
use blueprint_core::graph::DEFAULT_OUTPUT_PORT;
use blueprint_core::system::{System, SystemContext};

use crate::{order, running, types};

/// Ticks a delay waits when its `ticks` property is absent or malformed.
pub const DEFAULT_DELAY_TICKS: u64 = 1;

#[derive(Debug, Default)]
pub struct DelaySystem {
    completed: u64,
}

impl DelaySystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays completed since the last load.
    pub fn completed(&self) -> u64 {
        self.completed
    }
}

impl System for DelaySystem {
    fn name(&self) -> &str {
        "delay"
    }

    fn order(&self) -> i32 {
        order::DELAY
    }

    fn type_ids(&self) -> &[&'static str] {
        &[types::DELAY]
    }

    fn on_load(&mut self, _frame: &BlueprintFrame) {
        self.completed = 0;
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) {
        let frame = &mut *ctx.frame;
        for index in running(frame, types::DELAY) {
            frame.take_first_entry(index);
            let ticks = frame.property_or(index, "ticks", DEFAULT_DELAY_TICKS);
            let waited = frame.state(index).map_or(0, |s| s.ticks_in_phase) + 1;
            if waited >= ticks {
                frame.complete_and_emit(index, DEFAULT_OUTPUT_PORT);
                self.completed += 1;
            }
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
