//! Blueprint Core -- a deterministic, frame-stepped interpreter for compiled
//! action graphs.
//!
//! A graph of *actions* connected by port-to-port *transitions* is loaded
//! into a [`frame::BlueprintFrame`] and driven one tick at a time by a
//! [`runner::BlueprintRunner`] through an ordered pipeline of systems.
//!
//! # Tick Pipeline
//!
//! 1. **Transition** (order 0) -- deliver the events enqueued last tick,
//!    release deferred conditioned transitions, default-propagate completed
//!    actions.
//! 2. **Flow** (order 10) -- structural actions: start, end, join, fanout.
//! 3. **Domain** (order 100+) -- node-type systems, e.g. the ones in
//!    `blueprint-systems`.
//! 4. **Bookkeeping** -- advance phase timers, drop host events raised for
//!    this tick, record a history snapshot.
//!
//! Events enqueued during tick N are only visible from tick N+1.
//!
//! # Key Types
//!
//! - [`graph::CompiledGraph`] -- immutable actions, transitions, initial
//!   blackboard.
//! - [`frame::BlueprintFrame`] -- live state array, event queues, blackboard,
//!   indices.
//! - [`system::System`] -- the pipeline contract.
//! - [`runner::BlueprintRunner`] -- registration, loading, ticking, shutdown.
//! - [`history::FrameHistory`] -- pooled, diffed per-tick snapshots.
//! - [`host::HostServices`] -- host capabilities for side effects.
//! - [`serialize`] -- versioned snapshot encoding via bitcode.

pub mod blackboard;
pub mod condition;
pub mod config;
pub mod diagnostic;
pub mod flow;
pub mod frame;
pub mod graph;
pub mod history;
pub mod host;
pub mod id;
pub mod runner;
pub mod serialize;
pub mod sim;
pub mod state;
pub mod system;
pub mod transition;
pub mod validation;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
