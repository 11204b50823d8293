//! The frame: compiled graph plus all live run state.
//!
//! # Architecture
//!
//! A [`BlueprintFrame`] owns:
//! - the immutable [`CompiledGraph`]
//! - the index-aligned [`ActionRuntimeState`] array (allocated once at load)
//! - the pending [`PortEvent`] queue and the events delivered this tick
//! - conditioned transitions waiting for their condition to hold
//! - the [`Blackboard`]
//! - lookup indices built once at load: id -> index, type id -> indices,
//!   index -> outgoing / incoming transitions
//!
//! Read accessors are fail-soft. Partially-authored graphs are expected, so
//! an unknown index, type id or property yields an empty or default result
//! rather than a panic.

use std::collections::{BTreeSet, HashMap};

use crate::blackboard::Blackboard;
use crate::condition::ConditionContext;
use crate::diagnostic::{Diagnostic, DiagnosticLog};
use crate::graph::{CompiledAction, CompiledGraph, CompiledTransition, DEFAULT_OUTPUT_PORT};
use crate::id::{ActionIndex, SceneHandle, TransitionIndex};
use crate::state::{ActionRuntimeState, Phase, PortEvent};
use crate::validation::{LoadError, validate_graph};
use crate::value::{FromValue, Value};

/// A conditioned transition armed by an emission whose condition did not
/// hold yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DeferredTransition {
    transition: TransitionIndex,
    armed_tick: u64,
}

// ---------------------------------------------------------------------------
// BlueprintFrame
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct BlueprintFrame {
    graph: CompiledGraph,
    states: Vec<ActionRuntimeState>,

    /// Events enqueued this tick; delivered at the start of the next one.
    pending: Vec<PortEvent>,
    /// Events delivered at the start of the current tick.
    delivered: Vec<PortEvent>,
    deferred: Vec<DeferredTransition>,

    blackboard: Blackboard,

    // -- Indices (built once at load) --
    index_by_id: HashMap<String, ActionIndex>,
    indices_by_type: HashMap<String, Vec<ActionIndex>>,
    outgoing: Vec<Vec<TransitionIndex>>,
    incoming: Vec<Vec<TransitionIndex>>,
    start: ActionIndex,

    // -- Host signals --
    raised_events: BTreeSet<String>,
    tags: BTreeSet<String>,

    tick: u64,
    last_transition_tick: u64,
    diagnostics: DiagnosticLog,
}

impl BlueprintFrame {
    /// Validate `graph` and build a frame with every action Idle except the
    /// start action, which is Running.
    pub fn load(graph: CompiledGraph) -> Result<Self, LoadError> {
        let (index_by_id, start) = validate_graph(&graph)?;

        let action_count = graph.actions.len();
        let mut indices_by_type: HashMap<String, Vec<ActionIndex>> = HashMap::new();
        for (i, action) in graph.actions.iter().enumerate() {
            indices_by_type
                .entry(action.type_id.clone())
                .or_default()
                .push(ActionIndex::from(i));
        }

        let mut outgoing = vec![Vec::new(); action_count];
        let mut incoming = vec![Vec::new(); action_count];
        for (i, transition) in graph.transitions.iter().enumerate() {
            // Endpoints were checked by validation.
            let from = index_by_id[&transition.from_action];
            let to = index_by_id[&transition.to_action];
            outgoing[from.get()].push(TransitionIndex::from(i));
            incoming[to.get()].push(TransitionIndex::from(i));
        }

        let mut blackboard = Blackboard::new();
        for (key, value) in &graph.blackboard {
            blackboard.set(key.clone(), value.clone());
        }

        let mut states = vec![ActionRuntimeState::default(); action_count];
        states[start.get()].activate();

        tracing::info!(
            actions = action_count,
            transitions = graph.transitions.len(),
            start = %graph.actions[start.get()].id,
            "blueprint graph loaded"
        );

        Ok(Self {
            graph,
            states,
            pending: Vec::new(),
            delivered: Vec::new(),
            deferred: Vec::new(),
            blackboard,
            index_by_id,
            indices_by_type,
            outgoing,
            incoming,
            start,
            raised_events: BTreeSet::new(),
            tags: BTreeSet::new(),
            tick: 0,
            last_transition_tick: 0,
            diagnostics: DiagnosticLog::default(),
        })
    }

    /// Replace the diagnostic log with one capped at `limit` entries.
    pub fn with_diagnostic_limit(mut self, limit: usize) -> Self {
        self.diagnostics = DiagnosticLog::new(limit);
        self
    }

    // -----------------------------------------------------------------------
    // Graph queries
    // -----------------------------------------------------------------------

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub fn action_count(&self) -> usize {
        self.states.len()
    }

    pub fn action(&self, index: ActionIndex) -> Option<&CompiledAction> {
        self.graph.actions.get(index.get())
    }

    /// Id of the action at `index`, or `""` when out of range.
    pub fn action_id(&self, index: ActionIndex) -> &str {
        self.action(index).map(|a| a.id.as_str()).unwrap_or("")
    }

    pub fn index_of(&self, action_id: &str) -> Option<ActionIndex> {
        self.index_by_id.get(action_id).copied()
    }

    pub fn start_index(&self) -> ActionIndex {
        self.start
    }

    /// All actions of `type_id`, in graph order. Empty when none exist.
    pub fn action_indices(&self, type_id: &str) -> &[ActionIndex] {
        self.indices_by_type
            .get(type_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn outgoing_transitions(&self, index: ActionIndex) -> &[TransitionIndex] {
        self.outgoing
            .get(index.get())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn incoming_transitions(&self, index: ActionIndex) -> &[TransitionIndex] {
        self.incoming
            .get(index.get())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn transition(&self, index: TransitionIndex) -> Option<&CompiledTransition> {
        self.graph.transitions.get(index.get())
    }

    // -----------------------------------------------------------------------
    // Properties and bindings
    // -----------------------------------------------------------------------

    pub fn property(&self, index: ActionIndex, key: &str) -> Option<&Value> {
        self.action(index).and_then(|a| a.properties.get(key))
    }

    /// Typed property with a default. An absent property silently yields
    /// `default`; a property of the wrong type yields `default` and records a
    /// diagnostic.
    pub fn property_or<T: FromValue>(&mut self, index: ActionIndex, key: &str, default: T) -> T {
        match self.property(index, key) {
            None => default,
            Some(value) => match T::from_value(value) {
                Some(v) => v,
                None => {
                    let message = format!(
                        "property '{key}' has unexpected type {}; using default",
                        value.type_name()
                    );
                    self.warn(index, message);
                    default
                }
            },
        }
    }

    /// Like [`property_or`](Self::property_or), but an absent property is
    /// also reported.
    pub fn require_property<T: FromValue>(
        &mut self,
        index: ActionIndex,
        key: &str,
        default: T,
    ) -> T {
        if self.property(index, key).is_none() {
            self.warn(index, format!("missing property '{key}'; using default"));
            return default;
        }
        self.property_or(index, key, default)
    }

    pub fn binding(&self, index: ActionIndex, name: &str) -> Option<SceneHandle> {
        self.action(index).and_then(|a| a.bindings.get(name).copied())
    }

    // -----------------------------------------------------------------------
    // State access
    // -----------------------------------------------------------------------

    pub fn states(&self) -> &[ActionRuntimeState] {
        &self.states
    }

    pub fn state(&self, index: ActionIndex) -> Option<&ActionRuntimeState> {
        self.states.get(index.get())
    }

    pub fn state_mut(&mut self, index: ActionIndex) -> Option<&mut ActionRuntimeState> {
        self.states.get_mut(index.get())
    }

    /// Phase of `index`, `Idle` when out of range.
    pub fn phase(&self, index: ActionIndex) -> Phase {
        self.state(index).map(|s| s.phase).unwrap_or_default()
    }

    /// Clear and return the first-entry flag of `index`.
    pub fn take_first_entry(&mut self, index: ActionIndex) -> bool {
        self.state_mut(index)
            .map(ActionRuntimeState::take_first_entry)
            .unwrap_or(false)
    }

    /// Move `index` to `phase`. Terminal phases are never left: such a write
    /// is refused and reported. Returns whether the phase changed.
    pub fn set_phase(&mut self, index: ActionIndex, phase: Phase) -> bool {
        let tick = self.tick;
        let Some(state) = self.states.get_mut(index.get()) else {
            return false;
        };
        if state.phase.is_terminal() && state.phase != phase {
            let message = format!("refused phase change {:?} -> {phase:?}", state.phase);
            self.warn(index, message);
            return false;
        }
        let changed = state.enter(phase);
        if changed {
            self.last_transition_tick = tick;
            tracing::debug!(tick, action = %self.action_id(index), ?phase, "phase changed");
        }
        changed
    }

    pub fn complete(&mut self, index: ActionIndex) -> bool {
        self.set_phase(index, Phase::Completed)
    }

    pub fn cancel(&mut self, index: ActionIndex) -> bool {
        self.set_phase(index, Phase::Cancelled)
    }

    /// Suppress default propagation for `index`.
    pub fn mark_propagated(&mut self, index: ActionIndex) {
        if let Some(state) = self.state_mut(index) {
            state.transition_propagated = true;
        }
    }

    /// Complete `index` and emit on `port` in the same tick, suppressing the
    /// default propagation pass.
    pub fn complete_and_emit(&mut self, index: ActionIndex, port: &str) -> usize {
        if !self.complete(index) {
            return 0;
        }
        let sent = self.emit_port(index, port);
        self.mark_propagated(index);
        sent
    }

    /// Every action is Completed or Cancelled.
    pub fn is_all_terminal(&self) -> bool {
        self.states.iter().all(|s| s.phase.is_terminal())
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Queue an event for delivery at the start of the next tick.
    pub fn enqueue(&mut self, event: PortEvent) {
        tracing::debug!(
            tick = self.tick,
            from = %self.action_id(event.from),
            from_port = %event.from_port,
            to = %self.action_id(event.to),
            to_port = %event.to_port,
            "port event enqueued"
        );
        self.pending.push(event);
    }

    /// Emit on every outgoing transition of `index` leaving `port`.
    /// Transitions whose condition holds now are enqueued; the rest are
    /// deferred until it does. Returns the number enqueued now.
    pub fn emit_port(&mut self, index: ActionIndex, port: &str) -> usize {
        let mut ready = Vec::new();
        let mut waiting = Vec::new();
        for &t in self.outgoing_transitions(index) {
            let transition = &self.graph.transitions[t.get()];
            if transition.from_port != port {
                continue;
            }
            let holds = match &transition.condition {
                None => true,
                Some(condition) => condition.is_satisfied(&self.condition_context(0)),
            };
            if holds {
                ready.push(t);
            } else {
                waiting.push(DeferredTransition {
                    transition: t,
                    armed_tick: self.tick,
                });
            }
        }
        self.deferred.extend(waiting);
        let sent = ready.len();
        for t in ready {
            let event = self.event_for(t);
            self.enqueue(event);
        }
        sent
    }

    /// Emit on the default output port.
    pub fn emit_default(&mut self, index: ActionIndex) -> usize {
        self.emit_port(index, DEFAULT_OUTPUT_PORT)
    }

    /// Events waiting for the next tick.
    pub fn pending_events(&self) -> &[PortEvent] {
        &self.pending
    }

    /// Events delivered at the start of the current tick.
    pub fn delivered_events(&self) -> &[PortEvent] {
        &self.delivered
    }

    /// Events delivered to `index` at the start of the current tick.
    pub fn delivered_to(&self, index: ActionIndex) -> impl Iterator<Item = &PortEvent> {
        self.delivered.iter().filter(move |e| e.to == index)
    }

    /// Number of conditioned transitions still waiting.
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    fn event_for(&self, t: TransitionIndex) -> PortEvent {
        let transition = &self.graph.transitions[t.get()];
        PortEvent::new(
            self.index_by_id[&transition.from_action],
            transition.from_port.clone(),
            self.index_by_id[&transition.to_action],
            transition.to_port.clone(),
        )
    }

    fn condition_context(&self, elapsed: u64) -> ConditionContext<'_> {
        ConditionContext {
            blackboard: &self.blackboard,
            tags: &self.tags,
            raised_events: &self.raised_events,
            elapsed,
        }
    }

    // -----------------------------------------------------------------------
    // Tick plumbing (driven by the runner and the transition system)
    // -----------------------------------------------------------------------

    pub(crate) fn begin_tick(&mut self) {
        self.tick += 1;
    }

    /// Take the events enqueued during the previous tick.
    pub(crate) fn drain_pending(&mut self) -> Vec<PortEvent> {
        self.delivered.clear();
        std::mem::take(&mut self.pending)
    }

    /// Apply one delivered event. Events addressed to a terminal action are
    /// dropped. Returns whether the target was activated.
    pub(crate) fn deliver(&mut self, event: PortEvent) -> bool {
        let tick = self.tick;
        let Some(target) = self.states.get_mut(event.to.get()) else {
            return false;
        };
        if target.phase.is_terminal() {
            tracing::debug!(
                tick,
                to = %self.action_id(event.to),
                "event dropped: target is terminal"
            );
            return false;
        }
        if target.phase != Phase::Running {
            self.last_transition_tick = tick;
        }
        target.activate();

        let source_id = self.action_id(event.from).to_string();
        let target_id = self.action_id(event.to).to_string();
        self.blackboard.record_activation(&target_id, &source_id);
        tracing::debug!(tick, from = %source_id, to = %target_id, "action activated");
        self.delivered.push(event);
        true
    }

    /// Enqueue deferred transitions whose condition now holds. Transitions
    /// whose source was cancelled are discarded.
    pub(crate) fn release_deferred(&mut self) -> usize {
        let deferred = std::mem::take(&mut self.deferred);
        let mut still_waiting = Vec::with_capacity(deferred.len());
        let mut ready = Vec::new();
        for entry in deferred {
            let transition = &self.graph.transitions[entry.transition.get()];
            let source = self.index_by_id[&transition.from_action];
            if self.phase(source) == Phase::Cancelled {
                continue;
            }
            let elapsed = self.tick.saturating_sub(entry.armed_tick);
            let holds = transition
                .condition
                .as_ref()
                .is_none_or(|c| c.is_satisfied(&self.condition_context(elapsed)));
            if holds {
                ready.push(entry.transition);
            } else {
                still_waiting.push(entry);
            }
        }
        self.deferred = still_waiting;
        let released = ready.len();
        for t in ready {
            let event = self.event_for(t);
            self.enqueue(event);
        }
        released
    }

    /// Bookkeeping at the end of a tick: advance phase timers, expire first
    /// entries no system consumed and forget the host events raised for
    /// this tick.
    pub(crate) fn end_tick(&mut self) {
        for state in &mut self.states {
            state.ticks_in_phase = state.ticks_in_phase.saturating_add(1);
            state.is_first_entry = false;
        }
        self.raised_events.clear();
    }

    // -----------------------------------------------------------------------
    // Blackboard, host signals, diagnostics
    // -----------------------------------------------------------------------

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    /// Raise a named host event, visible to conditions and systems during the
    /// next tick only.
    pub fn raise_event(&mut self, name: impl Into<String>) {
        self.raised_events.insert(name.into());
    }

    pub fn is_event_raised(&self, name: &str) -> bool {
        self.raised_events.contains(name)
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    pub fn clear_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Current tick; 0 before the first tick, 1 during the first.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Tick of the most recent phase change.
    pub fn last_transition_tick(&self) -> u64 {
        self.last_transition_tick
    }

    /// Record a recoverable problem concerning `index`.
    pub fn warn(&mut self, index: ActionIndex, message: impl Into<String>) {
        let message = message.into();
        let action_id = self.action(index).map(|a| a.id.clone());
        tracing::warn!(
            tick = self.tick,
            action = action_id.as_deref().unwrap_or("<none>"),
            "{message}"
        );
        self.diagnostics.push(Diagnostic {
            tick: self.tick,
            action_id,
            message,
        });
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }
}

// ===========================================================================
// Tests
// ===========================================================================
