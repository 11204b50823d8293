//! Blackboard writes.
//!
//! A `set_value` action writes its `value` property under `key` and
//! completes. The entry is scoped to the writer (`"{id}.{key}"`), so that
//! downstream filters activated by it find the value through their scoped
//! lookup. With `global = true` the plain `key` is written instead.
//!
//! Completion is left to the default propagation pass, so successors are
//! activated one tick later than with structural actions.

use blueprint_core::blackboard::scoped_key;
use blueprint_core::frame::BlueprintFrame;
use blueprint_core::system::{System, SystemContext};

use crate::{order, running, types};

#[derive(Debug, Default)]
pub struct SetValueSystem {
    writes: u64,
}

impl SetValueSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blackboard writes since the last load.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl System for SetValueSystem {
    fn name(&self) -> &str {
        "set_value"
    }

    fn order(&self) -> i32 {
        order::SET_VALUE
    }

    fn type_ids(&self) -> &[&'static str] {
        &[types::SET_VALUE]
    }

    fn on_load(&mut self, _frame: &BlueprintFrame) {
        self.writes = 0;
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) {
        let frame = &mut *ctx.frame;
        for index in running(frame, types::SET_VALUE) {
            frame.take_first_entry(index);
            let key: String = frame.require_property(index, "key", String::new());
            let global = frame.property_or(index, "global", false);
            let value = frame.property(index, "value").cloned();

            match (key.is_empty(), value) {
                (false, Some(value)) => {
                    let key = if global {
                        key
                    } else {
                        scoped_key(frame.action_id(index), &key)
                    };
                    tracing::debug!(tick = frame.tick(), key = %key, %value, "blackboard write");
                    frame.blackboard_mut().set(key, value);
                    self.writes += 1;
                }
                (false, None) => frame.warn(index, "missing property 'value'; nothing written"),
                (true, _) => {}
            }
            frame.complete(index);
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
