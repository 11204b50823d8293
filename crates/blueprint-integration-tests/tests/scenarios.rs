//! Integration test: full pipeline scenarios
//!
//! Runs graphs through the complete system pipeline (core structural systems
//! plus every domain system) and checks tick-exact timing, branching,
//! history, cancellation and runner lifecycle.

use blueprint_core::graph::CompiledGraph;
use blueprint_core::host::HostServices;
use blueprint_core::id::ActionIndex;
use blueprint_core::runner::{BlueprintRunner, RunnerError};
use blueprint_core::serialize::{decode_history, encode_history};
use blueprint_core::state::Phase;
use blueprint_core::test_utils::*;
use blueprint_core::validation::LoadError;
use blueprint_systems::filter::{PASS_PORT, REJECT_PORT};
use blueprint_systems::{FilterSystem, default_systems, types};

// ============================================================================
// Shared helpers
// ============================================================================

fn runner_with(graph: CompiledGraph, host: HostServices) -> BlueprintRunner {
    let mut runner = BlueprintRunner::new(host);
    runner.register_systems(default_systems()).unwrap();
    runner.load(graph).unwrap();
    runner
}

fn runner_for(graph: CompiledGraph) -> BlueprintRunner {
    runner_with(graph, HostServices::new())
}

/// start -> src -> check, with check branching to `yes` on pass and `no` on
/// reject. Indices: start 0, src 1, check 2, yes 3, no 4.
fn score_filter(score: i64) -> CompiledGraph {
    GraphBuilder::new()
        .start("start")
        .action("src", "fanout")
        .action("check", types::FILTER)
        .prop("key", "score")
        .prop("op", ">=")
        .prop("target", "3")
        .end("yes")
        .end("no")
        .edge("start", "src")
        .edge("src", "check")
        .edge_on("check", PASS_PORT, "yes")
        .edge_on("check", REJECT_PORT, "no")
        .blackboard("src.score", score)
        .build()
}

// ============================================================================
// Test 1: Fan-in synchronization
// ============================================================================

/// B completes at tick 2 and C at tick 5, so the join completes at tick 6
/// and the end action at tick 7.
#[test]
fn join_completes_the_tick_after_its_last_input() {
    let mut runner = runner_for(join_graph(1, 4));
    runner.enable_history(32);

    assert_eq!(runner.run_until_complete(100).unwrap(), 7);
    assert!(runner.is_complete());

    let history = runner.history().unwrap();
    let (b, c, join, end) = (ActionIndex(1), ActionIndex(2), ActionIndex(3), ActionIndex(4));
    let completed_at = |index: ActionIndex| {
        history
            .changes_for(index)
            .into_iter()
            .find(|(_, change)| change.new == Phase::Completed)
            .map(|(tick, _)| tick)
    };
    assert_eq!(completed_at(b), Some(2));
    assert_eq!(completed_at(c), Some(5));
    assert_eq!(completed_at(join), Some(6));
    assert_eq!(completed_at(end), Some(7));

    // First arrival parks the join in Listening.
    assert_eq!(history.get(3).unwrap().phase(join), Phase::Listening);
}

#[test]
fn join_with_explicit_count_fires_on_first_arrival() {
    let mut graph = join_graph(1, 4);
    graph.actions[3]
        .properties
        .insert("count".into(), 1i64.into());
    let mut runner = runner_for(graph);
    runner.enable_history(32);
    // Join at 3, end at 4; the run is complete once C finishes at 5.
    assert_eq!(runner.run_until_complete(100).unwrap(), 5);

    let history = runner.history().unwrap();
    assert_eq!(history.get(3).unwrap().phase(ActionIndex(3)), Phase::Completed);
    assert_eq!(runner.frame().unwrap().pending_events().len(), 1);

    // C's late event reaches a completed join and is dropped.
    runner.tick().unwrap();
    let frame = runner.frame().unwrap();
    assert_eq!(frame.phase(ActionIndex(3)), Phase::Completed);
    assert!(frame.pending_events().is_empty());
    assert!(frame.delivered_events().is_empty());
}

// ============================================================================
// Test 2: Branching
// ============================================================================

#[test]
fn filter_routes_only_to_pass() {
    let mut runner = runner_for(score_filter(5));
    runner.enable_history(8);
    runner.run_until_complete(3).unwrap();

    let snapshot = runner.history().unwrap().latest().unwrap();
    assert_eq!(snapshot.tick_count, 3);
    assert_eq!(snapshot.pending.len(), 1);
    assert_eq!(snapshot.pending[0].from_port, PASS_PORT);
    assert!(snapshot.pending.iter().all(|e| e.from_port != REJECT_PORT));

    runner.tick().unwrap();
    let frame = runner.frame().unwrap();
    assert_eq!(frame.phase(ActionIndex(3)), Phase::Completed);
    assert_eq!(frame.phase(ActionIndex(4)), Phase::Idle);
    assert!(!runner.is_complete());
}

#[test]
fn filter_routes_low_scores_to_reject() {
    let mut runner = runner_for(score_filter(1));
    runner.run_until_complete(4).unwrap();
    let frame = runner.frame().unwrap();
    assert_eq!(frame.phase(ActionIndex(3)), Phase::Idle);
    assert_eq!(frame.phase(ActionIndex(4)), Phase::Completed);
    assert!(
        runner
            .system::<FilterSystem>()
            .unwrap()
            .outcome(ActionIndex(2))
            .is_some()
    );
}

// ============================================================================
// Test 3: History
// ============================================================================

#[test]
fn five_ticks_give_five_diffed_snapshots() {
    let mut runner = runner_for(linear_graph(&["delay", "delay", "delay"]));
    runner.enable_history(16);
    for _ in 0..5 {
        runner.tick().unwrap();
    }

    let history = runner.history().unwrap();
    let ticks: Vec<u64> = history.iter().map(|s| s.tick_count).collect();
    assert_eq!(ticks, vec![1, 2, 3, 4, 5]);

    // One delay completes per tick, so each tick changes exactly one action.
    for snapshot in history.iter() {
        let changed: Vec<usize> = snapshot.changes.iter().map(|c| c.index.get()).collect();
        let expected = (snapshot.tick_count - 1) as usize;
        assert_eq!(changed, vec![expected], "tick {}", snapshot.tick_count);
        assert_eq!(snapshot.changes[0].new, Phase::Completed);
    }
}

#[test]
fn exported_history_survives_the_snapshot_stream() {
    let mut runner = runner_for(join_graph(2, 3));
    runner.enable_history(4);
    runner.run_until_complete(100).unwrap();

    let history = runner.history().unwrap();
    let bytes = encode_history(history).unwrap();
    let decoded = decode_history(&bytes).unwrap();
    assert_eq!(decoded, history.export());
    assert_eq!(decoded.len(), 4);
    assert_eq!(decoded.last().unwrap().tick_count, runner.current_tick());
}

// ============================================================================
// Test 4: Cancellation and budgets
// ============================================================================

#[test]
fn cancelled_branch_never_reaches_the_join() {
    let mut runner = runner_for(join_graph(1, 4));
    runner.run_until_complete(3).unwrap();
    assert!(runner.cancel("c").unwrap());

    assert_eq!(runner.run_until_complete(20).unwrap(), 20);
    let frame = runner.frame().unwrap();
    assert_eq!(frame.phase(ActionIndex(2)), Phase::Cancelled);
    assert_eq!(frame.phase(ActionIndex(3)), Phase::Listening);
    assert_eq!(frame.phase(ActionIndex(4)), Phase::Idle);
}

#[test]
fn unfired_trigger_exhausts_the_budget() {
    let graph = GraphBuilder::new()
        .start("start")
        .action("wait", types::TRIGGER)
        .prop("event", "never")
        .end("end")
        .edge("start", "wait")
        .edge("wait", "end")
        .build();
    let mut runner = runner_for(graph);
    assert_eq!(runner.run_until_complete(25).unwrap(), 25);
    assert!(!runner.is_complete());
    assert_eq!(runner.current_tick(), 25);
}

// ============================================================================
// Test 5: Runner lifecycle
// ============================================================================

#[test]
fn invalid_graphs_never_tick() {
    let mut runner = BlueprintRunner::new(HostServices::new());
    runner.register_systems(default_systems()).unwrap();
    let graph = GraphBuilder::new().action("a", types::DELAY).build();

    assert_eq!(
        runner.load(graph),
        Err(RunnerError::Load(LoadError::NoStartNode))
    );
    assert!(runner.frame().is_none());
    assert_eq!(runner.tick(), Err(RunnerError::NotLoaded));
}

#[test]
fn shutdown_twice_is_the_same_as_once() {
    let mut runner = runner_for(join_graph(1, 2));
    runner.run_until_complete(100).unwrap();
    let hash = runner.state_hash();

    runner.shutdown();
    runner.shutdown();
    assert!(runner.is_shut_down());
    assert_eq!(runner.state_hash(), hash);
    assert_eq!(runner.tick(), Err(RunnerError::ShutDown));
}

#[test]
fn identical_runs_hash_identically() {
    let spawns_a = RecordingSpawns::default();
    let spawns_b = RecordingSpawns::default();
    let graph = || {
        GraphBuilder::new()
            .start("start")
            .action("fan", "fanout")
            .action("wave", types::SPAWN)
            .prop("prefab", "drone")
            .prop("count", 2i64)
            .action("bump", types::SET_VALUE)
            .prop("key", "alarm")
            .prop("value", true)
            .action("join", "join")
            .end("end")
            .edge("start", "fan")
            .edge("fan", "wave")
            .edge("fan", "bump")
            .edge("wave", "join")
            .edge("bump", "join")
            .edge("join", "end")
            .build()
    };
    let mut a = runner_with(graph(), HostServices::new().with_spawn_handler(spawns_a.clone()));
    let mut b = runner_with(graph(), HostServices::new().with_spawn_handler(spawns_b.clone()));

    while !a.is_complete() && a.current_tick() < 50 {
        a.tick().unwrap();
        b.tick().unwrap();
        assert_eq!(a.state_hash(), b.state_hash());
    }
    assert!(a.is_complete() && b.is_complete());
    assert_eq!(*spawns_a.requests.borrow(), *spawns_b.requests.borrow());
}
