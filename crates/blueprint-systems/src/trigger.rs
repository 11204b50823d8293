//! Host-event triggers.
//!
//! A `trigger` action listens for the host event named by its `event`
//! property. On the tick the event is raised it emits on `out` and
//! completes. With `repeat = true` it keeps listening and fires once per
//! raise, up to `max_fires` times (0, the default, means no limit).

use std::collections::HashMap;

use blueprint_core::frame::BlueprintFrame;
use blueprint_core::graph::DEFAULT_OUTPUT_PORT;
use blueprint_core::id::ActionIndex;
use blueprint_core::state::Phase;
use blueprint_core::system::{System, SystemContext};

use crate::{order, types};

#[derive(Debug, Default)]
pub struct TriggerSystem {
    fires: HashMap<ActionIndex, u32>,
}

impl TriggerSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `index` has fired since the last load.
    pub fn fires(&self, index: ActionIndex) -> u32 {
        self.fires.get(&index).copied().unwrap_or(0)
    }

    fn fire(&mut self, frame: &mut BlueprintFrame, index: ActionIndex) {
        let repeat = frame.property_or(index, "repeat", false);
        let max_fires = frame.property_or(index, "max_fires", 0u32);
        let fired = self.fires.entry(index).or_insert(0);
        *fired += 1;

        let exhausted = !repeat || (max_fires > 0 && *fired >= max_fires);
        tracing::debug!(
            tick = frame.tick(),
            action = %frame.action_id(index),
            fired = *fired,
            exhausted,
            "trigger fired"
        );
        if exhausted {
            frame.complete_and_emit(index, DEFAULT_OUTPUT_PORT);
        } else {
            frame.emit_port(index, DEFAULT_OUTPUT_PORT);
            frame.set_phase(index, Phase::Listening);
        }
    }
}

impl System for TriggerSystem {
    fn name(&self) -> &str {
        "trigger"
    }

    fn order(&self) -> i32 {
        order::TRIGGER
    }

    fn type_ids(&self) -> &[&'static str] {
        &[types::TRIGGER]
    }

    fn on_load(&mut self, _frame: &BlueprintFrame) {
        self.fires.clear();
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) {
        let frame = &mut *ctx.frame;
        let indices = frame.action_indices(types::TRIGGER).to_vec();
        for index in indices {
            if !frame.phase(index).is_active() {
                continue;
            }
            let entered = frame.take_first_entry(index);
            let event: String = if entered {
                frame.require_property(index, "event", String::new())
            } else {
                frame.property_or(index, "event", String::new())
            };
            if !event.is_empty() && frame.is_event_raised(&event) {
                self.fire(frame, index);
            } else {
                frame.set_phase(index, Phase::Listening);
            }
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
