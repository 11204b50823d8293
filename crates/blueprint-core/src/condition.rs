//! Transition conditions and comparison operators.
//!
//! A transition without a condition fires as soon as its source port emits.
//! A conditioned transition whose condition does not hold at emission time is
//! deferred, and re-evaluated at the start of every following tick until it
//! holds or its source is cancelled.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::blackboard::Blackboard;
use crate::value::Value;

// ---------------------------------------------------------------------------
// CompareOp
// ---------------------------------------------------------------------------

/// Comparison operator shared by expression conditions and filter nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// Parse an operator as written by authoring tools: symbols (`">="`) or
    /// short names (`"gte"`).
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "==" | "=" | "eq" => Some(CompareOp::Eq),
            "!=" | "<>" | "ne" => Some(CompareOp::Ne),
            ">" | "gt" => Some(CompareOp::Gt),
            ">=" | "gte" => Some(CompareOp::Gte),
            "<" | "lt" => Some(CompareOp::Lt),
            "<=" | "lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    /// Compare `lhs op rhs`. Numeric when both sides have a numeric view,
    /// boolean equality for two booleans, text comparison otherwise.
    pub fn compare(self, lhs: &Value, rhs: &Value) -> bool {
        if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
            return match self {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Gt => a > b,
                CompareOp::Gte => a >= b,
                CompareOp::Lt => a < b,
                CompareOp::Lte => a <= b,
            };
        }
        if let (Some(a), Some(b)) = (lhs.as_bool(), rhs.as_bool()) {
            return match self {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                _ => false,
            };
        }
        let (a, b) = (lhs.to_text(), rhs.to_text());
        match self {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            CompareOp::Gt => a > b,
            CompareOp::Gte => a >= b,
            CompareOp::Lt => a < b,
            CompareOp::Lte => a <= b,
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// Nested condition attached to a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// Always holds.
    Immediate,
    /// Holds once `ticks` ticks have elapsed since the source port emitted.
    Delay { ticks: u64 },
    /// Holds when the blackboard value at `key` compares true against `value`.
    /// An absent key never holds.
    Expression {
        key: String,
        op: CompareOp,
        value: Value,
    },
    /// Holds while the host has `tag` set.
    Tag { tag: String },
    /// Holds during a tick in which the host raised `name`.
    Event { name: String },
    /// Holds when every child holds (vacuously true when empty).
    AllOf { conditions: Vec<Condition> },
    /// Holds when any child holds (false when empty).
    AnyOf { conditions: Vec<Condition> },
}

/// Everything a condition may look at.
#[derive(Debug, Clone, Copy)]
pub struct ConditionContext<'a> {
    pub blackboard: &'a Blackboard,
    pub tags: &'a BTreeSet<String>,
    pub raised_events: &'a BTreeSet<String>,
    /// Ticks since the source port emitted.
    pub elapsed: u64,
}

impl Condition {
    pub fn is_satisfied(&self, ctx: &ConditionContext<'_>) -> bool {
        match self {
            Condition::Immediate => true,
            Condition::Delay { ticks } => ctx.elapsed >= *ticks,
            Condition::Expression { key, op, value } => ctx
                .blackboard
                .value(key)
                .is_some_and(|current| op.compare(current, value)),
            Condition::Tag { tag } => ctx.tags.contains(tag),
            Condition::Event { name } => ctx.raised_events.contains(name),
            Condition::AllOf { conditions } => conditions.iter().all(|c| c.is_satisfied(ctx)),
            Condition::AnyOf { conditions } => conditions.iter().any(|c| c.is_satisfied(ctx)),
        }
    }
}
