//! Flow system: structural action types.
//!
//! - `start` completes on its first entry.
//! - `end` completes on its first entry.
//! - `fanout` completes on entry and emits on every outgoing edge of its
//!   default port.
//! - `join` counts inbound activations and completes on the one that reaches
//!   its `count` property (default: number of inbound transitions). Until
//!   then it waits in Listening.
//!
//! Structural actions complete and emit in the same tick, so they add no
//! latency beyond the one-tick event delivery.

use std::collections::HashMap;

use crate::frame::BlueprintFrame;
use crate::graph::{DEFAULT_OUTPUT_PORT, action_types};
use crate::id::ActionIndex;
use crate::state::Phase;
use crate::system::{FLOW_ORDER, System, SystemContext};

#[derive(Debug, Default)]
pub struct FlowSystem {
    /// Inbound activations seen per join.
    join_arrivals: HashMap<ActionIndex, u32>,
}

impl FlowSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activations a join has received so far.
    pub fn join_arrivals(&self, index: ActionIndex) -> u32 {
        self.join_arrivals.get(&index).copied().unwrap_or(0)
    }

    fn update_pass_through(frame: &mut BlueprintFrame, type_id: &str) {
        let indices = frame.action_indices(type_id).to_vec();
        for index in indices {
            if frame.phase(index) != Phase::Running {
                continue;
            }
            frame.take_first_entry(index);
            frame.complete_and_emit(index, DEFAULT_OUTPUT_PORT);
        }
    }

    fn update_joins(&mut self, frame: &mut BlueprintFrame) {
        let indices = frame.action_indices(action_types::JOIN).to_vec();
        for index in indices {
            if frame.phase(index) != Phase::Running {
                continue;
            }
            let arrived_now = frame.delivered_to(index).count() as u32;
            frame.take_first_entry(index);

            let inbound = frame.incoming_transitions(index).len() as u32;
            let mut required = frame.property_or(index, "count", inbound);
            if required == 0 {
                frame.warn(index, "join count is 0; treating as 1");
                required = 1;
            }

            let arrivals = self.join_arrivals.entry(index).or_insert(0);
            *arrivals += arrived_now;
            if *arrivals >= required {
                frame.complete_and_emit(index, DEFAULT_OUTPUT_PORT);
            } else {
                frame.set_phase(index, Phase::Listening);
            }
        }
    }
}

impl System for FlowSystem {
    fn name(&self) -> &str {
        "flow"
    }

    fn order(&self) -> i32 {
        FLOW_ORDER
    }

    fn type_ids(&self) -> &[&'static str] {
        &[
            action_types::START,
            action_types::FANOUT,
            action_types::JOIN,
            action_types::END,
        ]
    }

    fn on_load(&mut self, _frame: &BlueprintFrame) {
        self.join_arrivals.clear();
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) {
        let frame = &mut *ctx.frame;
        Self::update_pass_through(frame, action_types::START);
        Self::update_pass_through(frame, action_types::FANOUT);
        self.update_joins(frame);
        Self::update_pass_through(frame, action_types::END);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
