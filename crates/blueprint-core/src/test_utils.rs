//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::condition::Condition;
use crate::graph::{CompiledAction, CompiledGraph, CompiledTransition, action_types};
use crate::host::{LogLevel, LogSink, SpawnHandler, SpawnRequest, WarningHandler, WarningRequest};
use crate::value::Value;

// ===========================================================================
// Graph builder
// ===========================================================================

/// Fluent builder for [`CompiledGraph`]s in tests.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    actions: Vec<CompiledAction>,
    transitions: Vec<CompiledTransition>,
    blackboard: BTreeMap<String, Value>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(self, id: &str) -> Self {
        self.action(id, action_types::START)
    }

    pub fn end(self, id: &str) -> Self {
        self.action(id, action_types::END)
    }

    pub fn action(self, id: &str, type_id: &str) -> Self {
        self.with(CompiledAction::new(id, type_id))
    }

    /// Add a fully configured action.
    pub fn with(mut self, action: CompiledAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Set a property on the most recently added action.
    pub fn prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Some(action) = self.actions.last_mut() {
            action.properties.insert(key.to_string(), value.into());
        }
        self
    }

    /// `from.out -> to.in`
    pub fn edge(self, from: &str, to: &str) -> Self {
        self.transition(CompiledTransition::new(from, to))
    }

    /// `from.port -> to.in`
    pub fn edge_on(self, from: &str, port: &str, to: &str) -> Self {
        self.transition(CompiledTransition::new(from, to).from_port(port))
    }

    pub fn edge_when(self, from: &str, to: &str, condition: Condition) -> Self {
        self.transition(CompiledTransition::new(from, to).with_condition(condition))
    }

    pub fn transition(mut self, transition: CompiledTransition) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn blackboard(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.blackboard.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> CompiledGraph {
        CompiledGraph {
            actions: self.actions,
            transitions: self.transitions,
            blackboard: self.blackboard,
        }
    }
}

// ===========================================================================
// Canned graphs
// ===========================================================================

/// `start -> step_0 -> ... -> step_{n-1} -> end`, with `step_i` of type
/// `types[i]`. Indices: start 0, steps 1..=n, end n+1.
pub fn linear_graph(types: &[&str]) -> CompiledGraph {
    let mut builder = GraphBuilder::new().start("start");
    let mut previous = "start".to_string();
    for (i, type_id) in types.iter().enumerate() {
        let id = format!("step_{i}");
        builder = builder.action(&id, type_id).edge(&previous, &id);
        previous = id;
    }
    builder.end("end").edge(&previous, "end").build()
}

/// `start -> {b, c} -> join -> end` where `b` and `c` are delays of
/// `b_ticks` and `c_ticks`. Indices: start 0, b 1, c 2, join 3, end 4.
pub fn join_graph(b_ticks: i64, c_ticks: i64) -> CompiledGraph {
    GraphBuilder::new()
        .start("start")
        .action("b", "delay")
        .prop("ticks", b_ticks)
        .action("c", "delay")
        .prop("ticks", c_ticks)
        .action("join", action_types::JOIN)
        .prop("count", 2i64)
        .end("end")
        .edge("start", "b")
        .edge("start", "c")
        .edge("b", "join")
        .edge("c", "join")
        .edge("join", "end")
        .build()
}

/// `depth` layers, each a fanout into `width` parallel delays and a join.
/// Used by the tick benchmark.
pub fn wide_graph(width: usize, depth: usize) -> CompiledGraph {
    let mut builder = GraphBuilder::new().start("start");
    let mut previous = "start".to_string();
    for layer in 0..depth {
        let fan = format!("fan_{layer}");
        let join = format!("join_{layer}");
        builder = builder
            .action(&fan, action_types::FANOUT)
            .edge(&previous, &fan)
            .action(&join, action_types::JOIN);
        for lane in 0..width {
            let id = format!("wait_{layer}_{lane}");
            builder = builder
                .action(&id, "delay")
                .prop("ticks", (lane % 3 + 1) as i64)
                .edge(&fan, &id)
                .edge(&id, &join);
        }
        previous = join;
    }
    builder.end("end").edge(&previous, "end").build()
}

// ===========================================================================
// Recording host handlers
// ===========================================================================

/// A log sink that keeps every message. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingLog {
    pub entries: Rc<RefCell<Vec<(LogLevel, String, String)>>>,
}

impl RecordingLog {
    pub fn messages(&self) -> Vec<String> {
        self.entries.borrow().iter().map(|e| e.2.clone()).collect()
    }
}

impl LogSink for RecordingLog {
    fn log(&mut self, level: LogLevel, action_id: &str, message: &str) {
        self.entries
            .borrow_mut()
            .push((level, action_id.to_string(), message.to_string()));
    }
}

/// Records spawn requests. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSpawns {
    pub requests: Rc<RefCell<Vec<SpawnRequest>>>,
}

impl SpawnHandler for RecordingSpawns {
    fn spawn(&mut self, request: &SpawnRequest) {
        self.requests.borrow_mut().push(request.clone());
    }
}

/// Records warning requests. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingWarnings {
    pub requests: Rc<RefCell<Vec<WarningRequest>>>,
}

impl WarningHandler for RecordingWarnings {
    fn show_warning(&mut self, request: &WarningRequest) {
        self.requests.borrow_mut().push(request.clone());
    }
}
