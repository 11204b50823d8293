//! The compiled, immutable execution graph.
//!
//! A [`CompiledGraph`] is the decoded in-memory shape produced by whatever
//! deserializer the host uses: a list of actions, a list of transitions
//! between their ports, and optional initial blackboard entries. The graph is
//! never mutated after load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::id::SceneHandle;
use crate::value::Value;

/// Output port every action emits on when it completes normally.
pub const DEFAULT_OUTPUT_PORT: &str = "out";

/// Input port assumed when a transition does not name one.
pub const DEFAULT_INPUT_PORT: &str = "in";

/// Type ids of the structural action types handled by the core.
pub mod action_types {
    pub const START: &str = "start";
    pub const END: &str = "end";
    pub const JOIN: &str = "join";
    pub const FANOUT: &str = "fanout";
}

// ---------------------------------------------------------------------------
// CompiledAction
// ---------------------------------------------------------------------------

/// One node of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledAction {
    /// Unique id within the graph.
    pub id: String,
    /// Selects which systems drive this action.
    pub type_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    /// Named scene bindings, resolved by the host.
    #[serde(default)]
    pub bindings: BTreeMap<String, SceneHandle>,
}

impl CompiledAction {
    pub fn new(id: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.into(),
            properties: BTreeMap::new(),
            bindings: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_binding(mut self, name: impl Into<String>, handle: SceneHandle) -> Self {
        self.bindings.insert(name.into(), handle);
        self
    }

    pub fn is_start(&self) -> bool {
        self.type_id == action_types::START
    }
}

// ---------------------------------------------------------------------------
// CompiledTransition
// ---------------------------------------------------------------------------

/// A directed, optionally conditioned edge between two ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledTransition {
    pub from_action: String,
    pub from_port: String,
    pub to_action: String,
    pub to_port: String,
    #[serde(default)]
    pub condition: Option<Condition>,
}

impl CompiledTransition {
    /// Connect `from`'s default output port to `to`'s default input port.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_action: from.into(),
            from_port: DEFAULT_OUTPUT_PORT.to_string(),
            to_action: to.into(),
            to_port: DEFAULT_INPUT_PORT.to_string(),
            condition: None,
        }
    }

    pub fn from_port(mut self, port: impl Into<String>) -> Self {
        self.from_port = port.into();
        self
    }

    pub fn to_port(mut self, port: impl Into<String>) -> Self {
        self.to_port = port.into();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

// ---------------------------------------------------------------------------
// CompiledGraph
// ---------------------------------------------------------------------------

/// Actions, transitions and initial blackboard entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledGraph {
    #[serde(default)]
    pub actions: Vec<CompiledAction>,
    #[serde(default)]
    pub transitions: Vec<CompiledTransition>,
    #[serde(default)]
    pub blackboard: BTreeMap<String, Value>,
}

impl CompiledGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}
