//! The runner: owns the system pipeline, the loaded frame and the host
//! services, and drives ticks.
//!
//! # Tick
//!
//! Each [`BlueprintRunner::tick`]:
//! 1. advances the tick counter
//! 2. runs every registered system once, in ascending order
//! 3. advances phase timers and clears host events raised for this tick
//! 4. records a history snapshot, when history is enabled
//!
//! Events enqueued during a tick are delivered by the transition system at
//! the start of the next one.

use std::collections::HashSet;

use crate::config::RunnerConfig;
use crate::flow::FlowSystem;
use crate::frame::BlueprintFrame;
use crate::graph::CompiledGraph;
use crate::history::FrameHistory;
use crate::host::HostServices;
use crate::id::ActionIndex;
use crate::system::{System, SystemContext};
use crate::transition::TransitionSystem;
use crate::validation::LoadError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunnerError {
    /// The pipeline is fixed once registered or once a tick has run.
    #[error("systems are locked; register them once, before the first tick")]
    SystemsLocked,
    #[error("no graph loaded")]
    NotLoaded,
    #[error("runner has been shut down")]
    ShutDown,
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// The transition and flow systems every pipeline needs.
pub fn core_systems() -> Vec<Box<dyn System>> {
    vec![
        Box::new(TransitionSystem::new()),
        Box::new(FlowSystem::new()),
    ]
}

// ---------------------------------------------------------------------------
// BlueprintRunner
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct BlueprintRunner {
    systems: Vec<Box<dyn System>>,
    systems_locked: bool,
    frame: Option<BlueprintFrame>,
    host: HostServices,
    history: Option<FrameHistory>,
    config: RunnerConfig,
    shut_down: bool,
}

impl BlueprintRunner {
    pub fn new(host: HostServices) -> Self {
        Self::with_config(host, RunnerConfig::default())
    }

    pub fn with_config(host: HostServices, config: RunnerConfig) -> Self {
        let history = config.history_capacity.map(FrameHistory::new);
        Self {
            systems: Vec::new(),
            systems_locked: false,
            frame: None,
            host,
            history,
            config,
            shut_down: false,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    /// Fix the pipeline. Systems are stably sorted by order, so equal orders
    /// keep the sequence given here. Only the first call succeeds, and only
    /// before the first tick.
    pub fn register_systems(
        &mut self,
        systems: impl IntoIterator<Item = Box<dyn System>>,
    ) -> Result<(), RunnerError> {
        if self.shut_down {
            return Err(RunnerError::ShutDown);
        }
        if self.systems_locked {
            return Err(RunnerError::SystemsLocked);
        }
        let mut systems: Vec<Box<dyn System>> = systems.into_iter().collect();
        systems.sort_by_key(|s| s.order());
        tracing::debug!(
            systems = ?systems.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "pipeline registered"
        );
        self.systems = systems;
        self.systems_locked = true;

        if let Some(frame) = self.frame.as_mut() {
            for system in &mut self.systems {
                system.on_load(frame);
            }
            report_unclaimed_types(&self.systems, frame);
        }
        Ok(())
    }

    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    /// Look up a registered system by concrete type.
    pub fn system<T: System + 'static>(&self) -> Option<&T> {
        self.systems
            .iter()
            .find_map(|s| s.as_any().downcast_ref::<T>())
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Validate and load `graph`, replacing any previous run. On failure no
    /// frame exists afterwards.
    pub fn load(&mut self, graph: CompiledGraph) -> Result<(), RunnerError> {
        if self.shut_down {
            return Err(RunnerError::ShutDown);
        }
        self.frame = None;
        let mut frame = match BlueprintFrame::load(graph) {
            Ok(frame) => frame.with_diagnostic_limit(self.config.max_diagnostics),
            Err(err) => {
                tracing::warn!(error = %err, "graph rejected");
                return Err(err.into());
            }
        };
        for system in &mut self.systems {
            system.on_load(&frame);
        }
        if self.systems_locked {
            report_unclaimed_types(&self.systems, &mut frame);
        }
        if let Some(history) = &mut self.history {
            history.reset(&frame);
        }
        self.frame = Some(frame);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.frame.is_some()
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Run one ordered pass over the pipeline.
    pub fn tick(&mut self) -> Result<(), RunnerError> {
        if self.shut_down {
            return Err(RunnerError::ShutDown);
        }
        let frame = self.frame.as_mut().ok_or(RunnerError::NotLoaded)?;
        self.systems_locked = true;

        frame.begin_tick();
        let mut ctx = SystemContext {
            frame: &mut *frame,
            host: &mut self.host,
        };
        for system in &mut self.systems {
            system.update(&mut ctx);
        }
        frame.end_tick();

        if let Some(history) = &mut self.history {
            history.record(frame);
        }
        Ok(())
    }

    /// Tick until every action is terminal or `max_ticks` ticks have run.
    ///
    /// Returns the ticks consumed. When the run completes early that is the
    /// tick of the last phase transition. Exhausting the budget is not an
    /// error: listening actions may legitimately wait forever.
    pub fn run_until_complete(&mut self, max_ticks: u64) -> Result<u64, RunnerError> {
        if self.frame.is_none() {
            return Err(RunnerError::NotLoaded);
        }
        let mut consumed = 0;
        loop {
            if self.is_complete() {
                break;
            }
            if consumed == max_ticks {
                tracing::info!(
                    max_ticks,
                    tick = self.current_tick(),
                    "tick budget exhausted before completion"
                );
                break;
            }
            self.tick()?;
            consumed += 1;
        }
        Ok(consumed)
    }

    /// [`run_until_complete`](Self::run_until_complete) with the configured
    /// default budget.
    pub fn run(&mut self) -> Result<u64, RunnerError> {
        self.run_until_complete(self.config.default_max_ticks)
    }

    /// Every action of the loaded graph is terminal.
    pub fn is_complete(&self) -> bool {
        self.frame.as_ref().is_some_and(BlueprintFrame::is_all_terminal)
    }

    pub fn current_tick(&self) -> u64 {
        self.frame.as_ref().map_or(0, BlueprintFrame::tick)
    }

    // -----------------------------------------------------------------------
    // Host signals
    // -----------------------------------------------------------------------

    /// Raise a named event, visible to the next tick only.
    pub fn raise_event(&mut self, name: impl Into<String>) -> Result<(), RunnerError> {
        self.frame_mut()?.raise_event(name);
        Ok(())
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) -> Result<(), RunnerError> {
        self.frame_mut()?.set_tag(tag);
        Ok(())
    }

    pub fn clear_tag(&mut self, tag: &str) -> Result<bool, RunnerError> {
        Ok(self.frame_mut()?.clear_tag(tag))
    }

    /// Cancel the action `action_id`. Returns `false` for unknown ids and
    /// actions that are already terminal.
    pub fn cancel(&mut self, action_id: &str) -> Result<bool, RunnerError> {
        let frame = self.frame_mut()?;
        let Some(index) = frame.index_of(action_id) else {
            tracing::warn!(action = action_id, "cancel: unknown action");
            return Ok(false);
        };
        if frame.phase(index).is_terminal() {
            return Ok(false);
        }
        Ok(frame.cancel(index))
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn frame(&self) -> Option<&BlueprintFrame> {
        self.frame.as_ref()
    }

    /// Mutable frame access for hosts that write blackboard entries between
    /// ticks.
    pub fn frame_mut(&mut self) -> Result<&mut BlueprintFrame, RunnerError> {
        self.frame.as_mut().ok_or(RunnerError::NotLoaded)
    }

    pub fn host_mut(&mut self) -> &mut HostServices {
        &mut self.host
    }

    pub fn history(&self) -> Option<&FrameHistory> {
        self.history.as_ref()
    }

    /// Start recording snapshots, keeping the newest `capacity`. Replaces
    /// any existing history.
    pub fn enable_history(&mut self, capacity: usize) {
        let mut history = FrameHistory::new(capacity);
        if let Some(frame) = &self.frame {
            history.reset(frame);
        }
        self.history = Some(history);
    }

    pub fn disable_history(&mut self) {
        self.history = None;
    }

    /// Deterministic hash of the loaded frame, 0 when nothing is loaded.
    pub fn state_hash(&self) -> u64 {
        self.frame.as_ref().map_or(0, crate::sim::frame_hash)
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Release every system. Further calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        for system in &mut self.systems {
            system.shutdown();
        }
        tracing::info!(
            systems = self.systems.len(),
            tick = self.current_tick(),
            "runner shut down"
        );
        self.systems.clear();
        self.shut_down = true;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

/// Record one diagnostic per action type id no system in `systems` drives,
/// naming the first action of that type.
fn report_unclaimed_types(systems: &[Box<dyn System>], frame: &mut BlueprintFrame) {
    let claimed: HashSet<&str> = systems
        .iter()
        .flat_map(|s| s.type_ids().iter().copied())
        .collect();
    let mut seen = HashSet::new();
    let unclaimed: Vec<(ActionIndex, String)> = frame
        .graph()
        .actions
        .iter()
        .enumerate()
        .filter(|(_, a)| !claimed.contains(a.type_id.as_str()))
        .filter(|(_, a)| seen.insert(a.type_id.clone()))
        .map(|(i, a)| (ActionIndex::from(i), a.type_id.clone()))
        .collect();
    for (index, type_id) in unclaimed {
        frame.warn(index, format!("no registered system handles type '{type_id}'"));
    }
}

impl Drop for BlueprintRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CompiledAction, action_types};
    use crate::state::Phase;
    use crate::test_utils::{GraphBuilder, linear_graph};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn runner() -> BlueprintRunner {
        let mut runner = BlueprintRunner::new(HostServices::new());
        runner.register_systems(core_systems()).unwrap();
        runner
    }

    #[derive(Debug)]
    struct Probe {
        name: &'static str,
        order: i32,
        log: Rc<RefCell<Vec<&'static str>>>,
        shutdowns: Rc<RefCell<u32>>,
    }

    impl System for Probe {
        fn name(&self) -> &str {
            self.name
        }
        fn order(&self) -> i32 {
            self.order
        }
        fn update(&mut self, _ctx: &mut SystemContext<'_>) {
            self.log.borrow_mut().push(self.name);
        }
        fn shutdown(&mut self) {
            *self.shutdowns.borrow_mut() += 1;
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    fn probe(
        name: &'static str,
        order: i32,
        log: &Rc<RefCell<Vec<&'static str>>>,
        shutdowns: &Rc<RefCell<u32>>,
    ) -> Box<dyn System> {
        Box::new(Probe {
            name,
            order,
            log: Rc::clone(log),
            shutdowns: Rc::clone(shutdowns),
        })
    }

    #[test]
    fn systems_run_in_stable_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let shutdowns = Rc::new(RefCell::new(0));
        let mut runner = BlueprintRunner::new(HostServices::new());
        runner
            .register_systems(vec![
                probe("late", 200, &log, &shutdowns),
                probe("first", 100, &log, &shutdowns),
                probe("second", 100, &log, &shutdowns),
                probe("early", 5, &log, &shutdowns),
            ])
            .unwrap();
        runner.load(linear_graph(&[])).unwrap();
        runner.tick().unwrap();
        assert_eq!(*log.borrow(), vec!["early", "first", "second", "late"]);
    }

    #[test]
    fn registration_is_locked_after_first_call() {
        let mut runner = runner();
        assert_eq!(
            runner.register_systems(core_systems()),
            Err(RunnerError::SystemsLocked)
        );
    }

    #[test]
    fn registration_is_locked_after_a_tick() {
        let mut runner = BlueprintRunner::new(HostServices::new());
        runner.load(linear_graph(&[])).unwrap();
        runner.tick().unwrap();
        assert_eq!(
            runner.register_systems(core_systems()),
            Err(RunnerError::SystemsLocked)
        );
    }

    #[test]
    fn tick_without_graph_is_an_error() {
        let mut runner = runner();
        assert_eq!(runner.tick(), Err(RunnerError::NotLoaded));
        assert_eq!(runner.run_until_complete(5), Err(RunnerError::NotLoaded));
    }

    #[test]
    fn failed_load_leaves_no_frame() {
        let mut runner = runner();
        runner.load(linear_graph(&[])).unwrap();
        assert!(runner.is_loaded());

        let graph = GraphBuilder::new().action("a", "noop").build();
        assert_eq!(
            runner.load(graph),
            Err(RunnerError::Load(LoadError::NoStartNode))
        );
        assert!(!runner.is_loaded());
        assert!(runner.frame().is_none());
    }

    #[test]
    fn linear_graph_completes_at_last_transition_tick() {
        // start(1) -> end(2)
        let mut runner = runner();
        runner.load(linear_graph(&[])).unwrap();
        let ticks = runner.run_until_complete(100).unwrap();
        assert_eq!(ticks, 2);
        assert_eq!(runner.frame().unwrap().last_transition_tick(), ticks);
    }

    #[test]
    fn budget_bounds_the_run() {
        // The noop action never completes.
        let graph = GraphBuilder::new()
            .start("start")
            .action("wait", "noop")
            .edge("start", "wait")
            .build();
        let mut runner = runner();
        runner.load(graph).unwrap();
        assert_eq!(runner.run_until_complete(7).unwrap(), 7);
        assert_eq!(runner.current_tick(), 7);
        assert!(!runner.is_complete());
        assert_eq!(runner.run_until_complete(0).unwrap(), 0);
    }

    #[test]
    fn cancel_terminates_a_waiting_action() {
        let graph = GraphBuilder::new()
            .start("start")
            .action("wait", "noop")
            .edge("start", "wait")
            .build();
        let mut runner = runner();
        runner.load(graph).unwrap();
        runner.run_until_complete(3).unwrap();

        assert!(runner.cancel("wait").unwrap());
        assert!(!runner.cancel("wait").unwrap());
        assert!(!runner.cancel("ghost").unwrap());
        assert!(runner.is_complete());
        assert_eq!(runner.run_until_complete(10).unwrap(), 0);
    }

    #[test]
    fn history_is_recorded_per_tick() {
        let config = RunnerConfig::default().with_history(16);
        let mut runner = BlueprintRunner::with_config(HostServices::new(), config);
        runner.register_systems(core_systems()).unwrap();
        runner.load(linear_graph(&[])).unwrap();
        runner.run_until_complete(10).unwrap();

        let history = runner.history().unwrap();
        assert_eq!(history.len(), 2);
        let end = ActionIndex(1);
        assert_eq!(history.latest().unwrap().phase(end), Phase::Completed);
    }

    #[test]
    fn identical_runs_hash_identically() {
        let run = || {
            let mut runner = runner();
            runner.load(linear_graph(&["noop"])).unwrap();
            runner.run_until_complete(4).unwrap();
            runner.state_hash()
        };
        assert_eq!(run(), run());
        assert_eq!(BlueprintRunner::new(HostServices::new()).state_hash(), 0);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let shutdowns = Rc::new(RefCell::new(0));
        let mut runner = BlueprintRunner::new(HostServices::new());
        runner
            .register_systems(vec![probe("p", 100, &log, &shutdowns)])
            .unwrap();
        runner.shutdown();
        runner.shutdown();
        drop(runner);
        assert_eq!(*shutdowns.borrow(), 1);
    }

    #[test]
    fn shut_down_runner_refuses_work() {
        let mut runner = runner();
        runner.load(linear_graph(&[])).unwrap();
        runner.shutdown();
        assert!(runner.is_shut_down());
        assert_eq!(runner.tick(), Err(RunnerError::ShutDown));
        let graph = CompiledGraph {
            actions: vec![CompiledAction::new("s", action_types::START)],
            ..Default::default()
        };
        assert_eq!(runner.load(graph), Err(RunnerError::ShutDown));
    }

    #[test]
    fn unclaimed_type_ids_are_reported_once_at_load() {
        let mut runner = BlueprintRunner::with_config(
            HostServices::new(),
            RunnerConfig::default().with_max_ticks(3),
        );
        runner.register_systems(core_systems()).unwrap();
        assert_eq!(runner.system_names(), vec!["transition", "flow"]);
        runner.load(linear_graph(&["noop", "noop", "wait"])).unwrap();

        let diagnostics = runner.frame().unwrap().diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.mentions("step_0", "type 'noop'"));
        assert!(diagnostics.mentions("step_2", "type 'wait'"));
        assert!(diagnostics.entries().iter().all(|d| d.tick == 0));

        assert_eq!(runner.run().unwrap(), 3);
        assert!(!runner.is_complete());
    }

    #[test]
    fn registering_after_load_reports_unclaimed_types() {
        let mut runner = BlueprintRunner::new(HostServices::new());
        runner.load(linear_graph(&["noop"])).unwrap();
        assert!(runner.frame().unwrap().diagnostics().is_empty());
        runner.register_systems(core_systems()).unwrap();
        assert!(runner.frame().unwrap().diagnostics().mentions("step_0", "noop"));
    }

    #[test]
    fn unconsumed_first_entry_lasts_one_tick() {
        let mut runner = runner();
        runner.load(linear_graph(&["noop"])).unwrap();
        let step = ActionIndex(1);

        runner.tick().unwrap();
        runner.tick().unwrap();
        let state = runner.frame().unwrap().state(step).unwrap().clone();
        assert_eq!(state.phase, Phase::Running);
        assert!(!state.is_first_entry);

        for _ in 0..4 {
            runner.tick().unwrap();
            let state = runner.frame().unwrap().state(step).unwrap();
            assert!(!state.is_first_entry);
        }
        assert_eq!(runner.frame().unwrap().state(step).unwrap().ticks_in_phase, 5);
    }

    #[test]
    fn history_can_be_disabled() {
        let mut runner = runner();
        runner.enable_history(4);
        runner.load(linear_graph(&[])).unwrap();
        runner.tick().unwrap();
        assert_eq!(runner.history().map(FrameHistory::len), Some(1));

        runner.disable_history();
        runner.tick().unwrap();
        assert!(runner.history().is_none());
    }

    #[test]
    fn host_can_be_replaced_between_ticks() {
        let log = crate::test_utils::RecordingLog::default();
        let mut runner = runner();
        *runner.host_mut() = HostServices::new().with_log_sink(log.clone());
        runner
            .host_mut()
            .log(crate::host::LogLevel::Info, "host", "swapped");
        assert_eq!(log.messages(), vec!["swapped".to_string()]);
    }
}
