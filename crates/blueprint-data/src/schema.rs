//! Serde document structs for blueprint graphs.
//!
//! These define the on-disk shape of a graph. They are deserialized from
//! RON, JSON, or TOML and then resolved into the core's
//! [`CompiledGraph`] by [`GraphDocument::into_graph`].
//!
//! A JSON document looks like:
//!
//! ```json
//! {
//!   "actions": [
//!     { "id": "start", "type": "start" },
//!     { "id": "wait", "type": "delay", "properties": { "ticks": 30 } },
//!     { "id": "end", "type": "end" }
//!   ],
//!   "transitions": [
//!     { "from": "start", "to": "wait" },
//!     { "from": "wait", "to": "end",
//!       "condition": { "tag": { "tag": "alarm" } } }
//!   ],
//!   "blackboard": { "wave": 1 }
//! }
//! ```

use std::collections::BTreeMap;

use blueprint_core::condition::{CompareOp, Condition};
use blueprint_core::graph::{
    CompiledAction, CompiledGraph, CompiledTransition, DEFAULT_INPUT_PORT, DEFAULT_OUTPUT_PORT,
};
use blueprint_core::id::SceneHandle;
use blueprint_core::value::Value;
use serde::Deserialize;

use crate::loader::DataLoadError;

// ===========================================================================
// Values
// ===========================================================================

/// A property or blackboard value as written in a document. Plain scalars
/// map to the matching [`Value`]; `{ "enum": "High" }` is an enum member.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ValueData {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Enum {
        #[serde(rename = "enum")]
        member: String,
    },
}

impl From<ValueData> for Value {
    fn from(data: ValueData) -> Self {
        match data {
            ValueData::Bool(v) => Value::Bool(v),
            ValueData::Int(v) => Value::Int(v),
            ValueData::Float(v) => Value::Float(v),
            ValueData::String(v) => Value::String(v),
            ValueData::Enum { member } => Value::Enum(member),
        }
    }
}

// ===========================================================================
// Conditions
// ===========================================================================

/// A transition condition. Externally tagged, so it reads naturally in all
/// three formats, e.g. RON `delay(ticks: 30)` or JSON `{"delay": {"ticks": 30}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionData {
    Immediate,
    Delay {
        ticks: u64,
    },
    Expression {
        key: String,
        #[serde(default = "default_op")]
        op: String,
        value: ValueData,
    },
    Tag {
        tag: String,
    },
    Event {
        name: String,
    },
    AllOf(Vec<ConditionData>),
    AnyOf(Vec<ConditionData>),
}

fn default_op() -> String {
    "==".to_string()
}

impl ConditionData {
    /// Resolve into a core [`Condition`]. Fails only on an unknown operator.
    pub fn resolve(self, transition: usize) -> Result<Condition, DataLoadError> {
        Ok(match self {
            ConditionData::Immediate => Condition::Immediate,
            ConditionData::Delay { ticks } => Condition::Delay { ticks },
            ConditionData::Expression { key, op, value } => {
                let op = CompareOp::parse(&op).ok_or_else(|| DataLoadError::InvalidValue {
                    context: format!("transition {transition}"),
                    detail: format!("unknown comparison operator '{op}'"),
                })?;
                Condition::Expression {
                    key,
                    op,
                    value: value.into(),
                }
            }
            ConditionData::Tag { tag } => Condition::Tag { tag },
            ConditionData::Event { name } => Condition::Event { name },
            ConditionData::AllOf(children) => Condition::AllOf {
                conditions: resolve_all(children, transition)?,
            },
            ConditionData::AnyOf(children) => Condition::AnyOf {
                conditions: resolve_all(children, transition)?,
            },
        })
    }
}

fn resolve_all(
    children: Vec<ConditionData>,
    transition: usize,
) -> Result<Vec<Condition>, DataLoadError> {
    children
        .into_iter()
        .map(|child| child.resolve(transition))
        .collect()
}

// ===========================================================================
// Actions and transitions
// ===========================================================================

/// An action definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionData {
    pub id: String,
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, ValueData>,
    /// Scene bindings as raw host handles.
    #[serde(default)]
    pub bindings: BTreeMap<String, u64>,
}

/// A transition definition. Ports default to `out` and `in`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionData {
    pub from: String,
    #[serde(default = "default_from_port")]
    pub from_port: String,
    pub to: String,
    #[serde(default = "default_to_port")]
    pub to_port: String,
    #[serde(default)]
    pub condition: Option<ConditionData>,
}

fn default_from_port() -> String {
    DEFAULT_OUTPUT_PORT.to_string()
}

fn default_to_port() -> String {
    DEFAULT_INPUT_PORT.to_string()
}

// ===========================================================================
// Graph document
// ===========================================================================

/// A complete graph document.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphDocument {
    pub actions: Vec<ActionData>,
    #[serde(default)]
    pub transitions: Vec<TransitionData>,
    /// Initial blackboard entries.
    #[serde(default)]
    pub blackboard: BTreeMap<String, ValueData>,
}

impl GraphDocument {
    /// Resolve the document into a [`CompiledGraph`]. Structural validation
    /// is left to the loader.
    pub fn into_graph(self) -> Result<CompiledGraph, DataLoadError> {
        let actions = self
            .actions
            .into_iter()
            .map(|action| CompiledAction {
                id: action.id,
                type_id: action.type_id,
                properties: action
                    .properties
                    .into_iter()
                    .map(|(k, v)| (k, v.into()))
                    .collect(),
                bindings: action
                    .bindings
                    .into_iter()
                    .map(|(k, v)| (k, SceneHandle(v)))
                    .collect(),
            })
            .collect();

        let mut transitions = Vec::with_capacity(self.transitions.len());
        for (i, data) in self.transitions.into_iter().enumerate() {
            let mut transition = CompiledTransition::new(data.from, data.to)
                .from_port(data.from_port)
                .to_port(data.to_port);
            if let Some(condition) = data.condition {
                transition = transition.with_condition(condition.resolve(i)?);
            }
            transitions.push(transition);
        }

        Ok(CompiledGraph {
            actions,
            transitions,
            blackboard: self
                .blackboard
                .into_iter()
                .map(|(k, v)| (k, v.into()))
                .collect(),
        })
    }
}
