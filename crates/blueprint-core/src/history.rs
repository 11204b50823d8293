//! Frame history: pooled, diffed per-tick snapshots in a bounded ring.
//!
//! After every tick the runner (when history is enabled) acquires a snapshot
//! from the pool, value-copies the state array and pending queue into it,
//! records which actions changed phase since the previous snapshot, and
//! appends it to the ring. A snapshot goes back to the pool only when the
//! ring evicts it. Snapshots never alias live frame state.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::frame::BlueprintFrame;
use crate::id::ActionIndex;
use crate::state::{ActionRuntimeState, Phase, PortEvent};

// ---------------------------------------------------------------------------
// FrameSnapshot
// ---------------------------------------------------------------------------

/// One action whose phase differs from the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChange {
    pub index: ActionIndex,
    pub old: Phase,
    pub new: Phase,
}

/// Point-in-time copy of a frame at the end of a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub tick_count: u64,
    pub states: Vec<ActionRuntimeState>,
    pub pending: Vec<PortEvent>,
    /// Phase changes versus the previous snapshot, in index order.
    pub changes: Vec<PhaseChange>,
}

impl FrameSnapshot {
    pub fn phase(&self, index: ActionIndex) -> Phase {
        self.states
            .get(index.get())
            .map(|s| s.phase)
            .unwrap_or_default()
    }

    pub fn changed(&self, index: ActionIndex) -> bool {
        self.changes.iter().any(|c| c.index == index)
    }

    /// Copy `frame` into this snapshot, reusing its buffers, and diff against
    /// `previous` phases.
    fn capture(&mut self, frame: &BlueprintFrame, previous: &[Phase]) {
        self.tick_count = frame.tick();
        self.states.clear();
        self.states.extend_from_slice(frame.states());
        self.pending.clear();
        self.pending.extend_from_slice(frame.pending_events());
        self.changes.clear();
        for (i, state) in self.states.iter().enumerate() {
            let old = previous.get(i).copied().unwrap_or_default();
            if old != state.phase {
                self.changes.push(PhaseChange {
                    index: ActionIndex::from(i),
                    old,
                    new: state.phase,
                });
            }
        }
    }

    fn reset(&mut self) {
        self.tick_count = 0;
        self.states.clear();
        self.pending.clear();
        self.changes.clear();
    }
}

// ---------------------------------------------------------------------------
// SnapshotPool
// ---------------------------------------------------------------------------

/// Allocation counters of a [`SnapshotPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Snapshots allocated fresh.
    pub created: u64,
    /// Acquisitions served from the free list.
    pub reused: u64,
    /// Snapshots currently on the free list.
    pub free: usize,
}

/// Free list of cleared snapshots. Buffers keep their capacity across reuse.
#[derive(Debug, Default)]
pub struct SnapshotPool {
    free: Vec<FrameSnapshot>,
    created: u64,
    reused: u64,
}

impl SnapshotPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self) -> FrameSnapshot {
        match self.free.pop() {
            Some(snapshot) => {
                self.reused += 1;
                snapshot
            }
            None => {
                self.created += 1;
                FrameSnapshot::default()
            }
        }
    }

    pub fn release(&mut self, mut snapshot: FrameSnapshot) {
        snapshot.reset();
        self.free.push(snapshot);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created,
            reused: self.reused,
            free: self.free.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// FrameHistory
// ---------------------------------------------------------------------------

/// Bounded ring of the most recent snapshots, oldest first.
#[derive(Debug)]
pub struct FrameHistory {
    capacity: usize,
    ring: VecDeque<FrameSnapshot>,
    pool: SnapshotPool,
    /// Phases as of the newest snapshot (or the load state).
    previous: Vec<Phase>,
}

impl FrameHistory {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ring: VecDeque::with_capacity(capacity),
            pool: SnapshotPool::new(),
            previous: Vec::new(),
        }
    }

    /// Forget all snapshots and take `frame` as the baseline for the first
    /// diff. Called on every load.
    pub fn reset(&mut self, frame: &BlueprintFrame) {
        while let Some(snapshot) = self.ring.pop_front() {
            self.pool.release(snapshot);
        }
        self.previous.clear();
        self.previous.extend(frame.states().iter().map(|s| s.phase));
    }

    /// Append a snapshot of `frame`, evicting the oldest when full.
    pub fn record(&mut self, frame: &BlueprintFrame) {
        if self.ring.len() == self.capacity {
            if let Some(evicted) = self.ring.pop_front() {
                self.pool.release(evicted);
            }
        }
        let mut snapshot = self.pool.acquire();
        snapshot.capture(frame, &self.previous);
        self.previous.clear();
        self.previous.extend(snapshot.states.iter().map(|s| s.phase));
        tracing::trace!(
            tick = snapshot.tick_count,
            changes = snapshot.changes.len(),
            "snapshot recorded"
        );
        self.ring.push_back(snapshot);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &FrameSnapshot> {
        self.ring.iter()
    }

    /// The snapshot taken at the end of `tick`, if still retained.
    pub fn get(&self, tick: u64) -> Option<&FrameSnapshot> {
        self.ring.iter().find(|s| s.tick_count == tick)
    }

    pub fn latest(&self) -> Option<&FrameSnapshot> {
        self.ring.back()
    }

    /// Every retained phase change of `index` with the tick it happened in.
    pub fn changes_for(&self, index: ActionIndex) -> Vec<(u64, PhaseChange)> {
        self.ring
            .iter()
            .flat_map(|s| {
                s.changes
                    .iter()
                    .filter(move |c| c.index == index)
                    .map(move |c| (s.tick_count, *c))
            })
            .collect()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Owned copies of the retained snapshots, oldest first.
    pub fn export(&self) -> Vec<FrameSnapshot> {
        self.ring.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::linear_graph;

    /// start -> delay -> end
    fn frame() -> BlueprintFrame {
        BlueprintFrame::load(linear_graph(&["delay"])).unwrap()
    }

    #[test]
    fn snapshots_carry_ticks_and_diffs() {
        let mut frame = frame();
        let mut history = FrameHistory::new(8);
        history.reset(&frame);

        frame.begin_tick();
        frame.complete(ActionIndex(0));
        history.record(&frame);

        frame.begin_tick();
        history.record(&frame);

        let ticks: Vec<u64> = history.iter().map(|s| s.tick_count).collect();
        assert_eq!(ticks, vec![1, 2]);

        let first = history.get(1).unwrap();
        assert_eq!(
            first.changes,
            vec![PhaseChange {
                index: ActionIndex(0),
                old: Phase::Running,
                new: Phase::Completed,
            }]
        );
        assert!(history.get(2).unwrap().changes.is_empty());
        assert_eq!(history.changes_for(ActionIndex(0)).len(), 1);
    }

    #[test]
    fn snapshots_do_not_alias_live_state() {
        let mut frame = frame();
        let mut history = FrameHistory::new(4);
        history.reset(&frame);
        frame.begin_tick();
        history.record(&frame);

        frame.complete(ActionIndex(0));
        assert_eq!(history.latest().unwrap().phase(ActionIndex(0)), Phase::Running);
    }

    #[test]
    fn eviction_returns_snapshots_to_pool() {
        let mut frame = frame();
        let mut history = FrameHistory::new(2);
        history.reset(&frame);
        for _ in 0..5 {
            frame.begin_tick();
            history.record(&frame);
        }
        assert_eq!(history.len(), 2);
        let ticks: Vec<u64> = history.iter().map(|s| s.tick_count).collect();
        assert_eq!(ticks, vec![4, 5]);

        let stats = history.pool_stats();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.reused, 3);
        assert_eq!(stats.free, 0);
    }

    #[test]
    fn reset_releases_everything() {
        let mut frame = frame();
        let mut history = FrameHistory::new(3);
        history.reset(&frame);
        frame.begin_tick();
        history.record(&frame);
        history.record(&frame);

        history.reset(&frame);
        assert!(history.is_empty());
        assert_eq!(history.pool_stats().free, 2);
    }
}
