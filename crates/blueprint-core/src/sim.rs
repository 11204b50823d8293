//! Deterministic state hashing.
//!
//! Two runners fed the same graph, systems and host signals must produce the
//! same hash after every tick. Used by tests and by hosts comparing replays.

use crate::frame::BlueprintFrame;
use crate::state::{Phase, PortEvent};
use crate::value::Value;

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    /// Length-prefixed, so `("ab", "c")` and `("a", "bc")` differ.
    pub fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write(s.as_bytes());
    }

    pub fn write_value(&mut self, value: &Value) {
        match value {
            Value::Int(v) => {
                self.write_u32(0);
                self.write(&v.to_le_bytes());
            }
            Value::Float(v) => {
                self.write_u32(1);
                self.write_u64(v.to_bits());
            }
            Value::Bool(v) => {
                self.write_u32(2);
                self.write_u32(*v as u32);
            }
            Value::String(v) => {
                self.write_u32(3);
                self.write_str(v);
            }
            Value::Enum(v) => {
                self.write_u32(4);
                self.write_str(v);
            }
        }
    }

    fn write_phase(&mut self, phase: Phase) {
        let tag = match phase {
            Phase::Idle => 0,
            Phase::Running => 1,
            Phase::Listening => 2,
            Phase::Completed => 3,
            Phase::Cancelled => 4,
        };
        self.write_u32(tag);
    }

    fn write_event(&mut self, event: &PortEvent) {
        self.write_u32(event.from.0);
        self.write_str(&event.from_port);
        self.write_u32(event.to.0);
        self.write_str(&event.to_port);
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash the observable run state of `frame`: tick, every action state, the
/// pending queue and the blackboard (iterated in key order).
pub fn frame_hash(frame: &BlueprintFrame) -> u64 {
    let mut h = StateHash::new();
    h.write_u64(frame.tick());
    h.write_u64(frame.states().len() as u64);
    for state in frame.states() {
        h.write_phase(state.phase);
        h.write_u64(state.ticks_in_phase);
        h.write_u32(state.is_first_entry as u32);
        h.write_u32(state.transition_propagated as u32);
    }
    h.write_u64(frame.pending_events().len() as u64);
    for event in frame.pending_events() {
        h.write_event(event);
    }
    h.write_u64(frame.blackboard().len() as u64);
    for (key, value) in frame.blackboard().iter() {
        h.write_str(key);
        h.write_value(value);
    }
    h.finish()
}
