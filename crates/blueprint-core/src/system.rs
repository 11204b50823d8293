//! The system pipeline contract.
//!
//! Systems hook into the runner's tick via the [`System`] trait. Each tick the
//! runner calls [`System::update`] once on every registered system, in
//! ascending [`System::order`], with a [`SystemContext`] holding the frame and
//! the host capabilities. Systems never interleave.

use crate::frame::BlueprintFrame;
use crate::host::HostServices;

/// Order of the transition system.
pub const TRANSITION_ORDER: i32 = 0;
/// Order of the flow system.
pub const FLOW_ORDER: i32 = 10;
/// Lowest order for node-type-specific systems.
pub const DOMAIN_ORDER: i32 = 100;

// ---------------------------------------------------------------------------
// System trait
// ---------------------------------------------------------------------------

/// A unit of per-tick behavior.
///
/// `on_load` and `shutdown` default to no-ops, so systems only override what
/// they need. Systems with per-node bookkeeping keep it in their own side
/// tables keyed by action index and reset them in `on_load`.
pub trait System: std::fmt::Debug {
    /// Human-readable name, used for lookup and logging.
    fn name(&self) -> &str;

    /// Stable ascending sort key. Ties keep registration order.
    fn order(&self) -> i32;

    /// Action type ids this system drives. Actions of a type no registered
    /// system claims are reported as diagnostics when the graph loads.
    fn type_ids(&self) -> &[&'static str] {
        &[]
    }

    /// Called after a graph is loaded, before its first tick.
    fn on_load(&mut self, frame: &BlueprintFrame) {
        let _ = frame;
    }

    /// One step of this system for the current tick.
    fn update(&mut self, ctx: &mut SystemContext<'_>);

    /// Release resources. Called once, by `BlueprintRunner::shutdown`.
    fn shutdown(&mut self) {}

    /// Downcast support for inspecting concrete systems.
    fn as_any(&self) -> &dyn std::any::Any;
}

// ---------------------------------------------------------------------------
// SystemContext
// ---------------------------------------------------------------------------

/// Mutable context passed to systems during `update`.
pub struct SystemContext<'a> {
    pub frame: &'a mut BlueprintFrame,
    pub host: &'a mut HostServices,
}

impl SystemContext<'_> {
    /// The current tick.
    pub fn tick(&self) -> u64 {
        self.frame.tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::linear_graph;

    #[derive(Debug, Default)]
    struct CountingSystem {
        updates: u32,
        loads: u32,
    }

    impl System for CountingSystem {
        fn name(&self) -> &str {
            "counting"
        }

        fn order(&self) -> i32 {
            DOMAIN_ORDER
        }

        fn on_load(&mut self, _frame: &BlueprintFrame) {
            self.loads += 1;
        }

        fn update(&mut self, _ctx: &mut SystemContext<'_>) {
            self.updates += 1;
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[test]
    fn default_hooks_are_no_ops() {
        let mut system = CountingSystem::default();
        let mut frame = BlueprintFrame::load(linear_graph(&["delay"])).unwrap();
        let mut host = HostServices::new();

        system.on_load(&frame);
        let mut ctx = SystemContext {
            frame: &mut frame,
            host: &mut host,
        };
        assert_eq!(ctx.tick(), 0);
        system.update(&mut ctx);
        system.shutdown();

        assert_eq!(system.loads, 1);
        assert_eq!(system.updates, 1);
        assert!(system.as_any().downcast_ref::<CountingSystem>().is_some());
    }
}
