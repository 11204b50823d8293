//! Branching on blackboard values.
//!
//! A `filter` action compares a blackboard value against its `target`
//! property and completes on either the `pass` or the `reject` port.
//!
//! Properties:
//! - `key` (required): field to read. The scoped key
//!   `"{activating action}.{key}"` is tried first, then the plain `key`.
//! - `op` (default `"=="`): a [`CompareOp`] in symbol or short-name form.
//! - `target` (required): the right-hand side of the comparison.
//!
//! A missing value or target routes to `reject` and records a diagnostic.

use std::collections::HashMap;

use blueprint_core::blackboard::scoped_key;
use blueprint_core::condition::CompareOp;
use blueprint_core::frame::BlueprintFrame;
use blueprint_core::id::ActionIndex;
use blueprint_core::system::{System, SystemContext};
use blueprint_core::value::Value;

use crate::{order, running, types};

pub const PASS_PORT: &str = "pass";
pub const REJECT_PORT: &str = "reject";

/// Which way a filter went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Pass,
    Reject,
}

impl FilterOutcome {
    pub fn port(self) -> &'static str {
        match self {
            FilterOutcome::Pass => PASS_PORT,
            FilterOutcome::Reject => REJECT_PORT,
        }
    }
}

#[derive(Debug, Default)]
pub struct FilterSystem {
    outcomes: HashMap<ActionIndex, FilterOutcome>,
}

impl FilterSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// The outcome of a filter that has completed since the last load.
    pub fn outcome(&self, index: ActionIndex) -> Option<FilterOutcome> {
        self.outcomes.get(&index).copied()
    }

    fn evaluate(frame: &mut BlueprintFrame, index: ActionIndex) -> FilterOutcome {
        let key: String = frame.require_property(index, "key", String::new());
        let op_text: String = frame.property_or(index, "op", "==".to_string());
        let op = CompareOp::parse(&op_text).unwrap_or_else(|| {
            frame.warn(index, format!("unknown operator '{op_text}'; using =="));
            CompareOp::Eq
        });
        let Some(target) = frame.property(index, "target").cloned() else {
            frame.warn(index, "missing property 'target'; rejecting");
            return FilterOutcome::Reject;
        };
        let Some(value) = Self::lookup(frame, index, &key) else {
            frame.warn(index, format!("blackboard has no value for '{key}'; rejecting"));
            return FilterOutcome::Reject;
        };

        if op.compare(&value, &target) {
            FilterOutcome::Pass
        } else {
            FilterOutcome::Reject
        }
    }

    fn lookup(frame: &BlueprintFrame, index: ActionIndex, key: &str) -> Option<Value> {
        let blackboard = frame.blackboard();
        let scoped = blackboard
            .activated_by(frame.action_id(index))
            .and_then(|source| blackboard.value(&scoped_key(source, key)));
        scoped.or_else(|| blackboard.value(key)).cloned()
    }
}

impl System for FilterSystem {
    fn name(&self) -> &str {
        "filter"
    }

    fn order(&self) -> i32 {
        order::FILTER
    }

    fn type_ids(&self) -> &[&'static str] {
        &[types::FILTER]
    }

    fn on_load(&mut self, _frame: &BlueprintFrame) {
        self.outcomes.clear();
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) {
        let frame = &mut *ctx.frame;
        for index in running(frame, types::FILTER) {
            frame.take_first_entry(index);
            let outcome = Self::evaluate(frame, index);
            tracing::debug!(
                tick = frame.tick(),
                action = %frame.action_id(index),
                ?outcome,
                "filter evaluated"
            );
            frame.complete_and_emit(index, outcome.port());
            self.outcomes.insert(index, outcome);
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
