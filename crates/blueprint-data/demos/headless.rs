//! Headless runner: loads a graph document and runs it to completion,
//! printing host effects as they happen.
//!
//! Run with: `cargo run -p blueprint-data --example headless -- [graph] [config]`
//!
//! Without arguments the bundled `demos/intro.ron` is used. The host raises
//! `door_opened` on tick 5. Set `RUST_LOG=blueprint_core=debug` to trace
//! every activation.

use std::path::PathBuf;

use blueprint_core::config::RunnerConfig;
use blueprint_core::host::{HostServices, SpawnRequest, WarningRequest};
use blueprint_core::runner::BlueprintRunner;
use blueprint_data::{load_graph_file, load_runner_config};
use tracing_subscriber::EnvFilter;

const DOOR_TICK: u64 = 5;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let graph_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/intro.ron"));
    let config = match args.next() {
        Some(path) => load_runner_config(&PathBuf::from(path))?,
        None => RunnerConfig::default().with_history(64),
    };

    let graph = load_graph_file(&graph_path)?;
    println!("Blueprint: {}", graph_path.display());
    println!(
        "  {} actions, {} transitions\n",
        graph.action_count(),
        graph.transition_count()
    );

    let host = HostServices::new()
        .with_spawn_handler(|r: &SpawnRequest| {
            println!(
                "  [tick {:>3}] spawn {} x{} at {:?}",
                r.tick, r.prefab, r.count, r.anchor
            );
        })
        .with_warning_handler(|r: &WarningRequest| {
            println!(
                "  [tick {:>3}] warning \"{}\" for {} ticks",
                r.tick, r.message, r.duration_ticks
            );
        });

    let max_ticks = config.default_max_ticks;
    let mut runner = BlueprintRunner::with_config(host, config);
    runner.register_systems(blueprint_systems::default_systems())?;
    runner.load(graph)?;

    while !runner.is_complete() && runner.current_tick() < max_ticks {
        if runner.current_tick() + 1 == DOOR_TICK {
            println!("  [tick {DOOR_TICK:>3}] host raises door_opened");
            runner.raise_event("door_opened")?;
        }
        runner.tick()?;
    }

    let frame = runner.frame().ok_or("no graph loaded")?;
    println!();
    println!(
        "Finished: complete={} tick={} last transition={}",
        runner.is_complete(),
        frame.tick(),
        frame.last_transition_tick()
    );
    println!("State hash: {:#018x}", runner.state_hash());

    if let Some(history) = runner.history() {
        println!("\nPhase changes ({} snapshots kept):", history.len());
        for snapshot in history.iter() {
            for change in &snapshot.changes {
                println!(
                    "  tick {:>3}: {:<8} {:?} -> {:?}",
                    snapshot.tick_count,
                    frame.action_id(change.index),
                    change.old,
                    change.new
                );
            }
        }
    }

    if !frame.diagnostics().is_empty() {
        println!("\nDiagnostics:");
        for d in frame.diagnostics().entries() {
            println!(
                "  tick {:>3} {}: {}",
                d.tick,
                d.action_id.as_deref().unwrap_or("-"),
                d.message
            );
        }
    }

    runner.shutdown();
    Ok(())
}
