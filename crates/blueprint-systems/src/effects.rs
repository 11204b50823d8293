//! Host effects: spawning, player warnings and authored log lines.
//!
//! Each of these actions builds a request record from its properties, hands
//! it to the matching [`HostServices`] capability and completes on the same
//! tick. An unregistered capability is a logged no-op, never a failure.
//! Completion is left to the default propagation pass.

use std::collections::HashMap;

use blueprint_core::blackboard::scoped_key;
use blueprint_core::frame::BlueprintFrame;
use blueprint_core::host::{HostServices, LogLevel, SpawnRequest, WarningRequest};
use blueprint_core::id::ActionIndex;
use blueprint_core::system::{System, SystemContext};

use crate::{order, running, types};

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawns `count` (default 1) instances of the required `prefab` property at
/// the optional `anchor` scene binding. Writes `"{id}.spawned"` with the
/// number of instances the host accepted (0 when no handler is registered).
#[derive(Debug, Default)]
pub struct SpawnSystem {
    spawned: HashMap<ActionIndex, u32>,
}

impl SpawnSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instances requested by `index` and accepted by the host.
    pub fn spawned(&self, index: ActionIndex) -> u32 {
        self.spawned.get(&index).copied().unwrap_or(0)
    }

    /// Instances accepted across all spawn actions.
    pub fn total_spawned(&self) -> u64 {
        self.spawned.values().map(|&n| u64::from(n)).sum()
    }

    fn request(frame: &mut BlueprintFrame, index: ActionIndex) -> Option<SpawnRequest> {
        let prefab: String = frame.require_property(index, "prefab", String::new());
        if prefab.is_empty() {
            return None;
        }
        let count = frame.property_or(index, "count", 1u32);
        let anchor = frame.binding(index, "anchor");
        if anchor.is_none() && frame.property(index, "anchor").is_some() {
            frame.warn(index, "anchor is not a scene binding; using host default");
        }
        Some(SpawnRequest {
            action_id: frame.action_id(index).to_string(),
            prefab,
            count,
            anchor,
            tick: frame.tick(),
        })
    }
}

impl System for SpawnSystem {
    fn name(&self) -> &str {
        "spawn"
    }

    fn order(&self) -> i32 {
        order::SPAWN
    }

    fn type_ids(&self) -> &[&'static str] {
        &[types::SPAWN]
    }

    fn on_load(&mut self, _frame: &BlueprintFrame) {
        self.spawned.clear();
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) {
        let frame = &mut *ctx.frame;
        let host = &mut *ctx.host;
        for index in running(frame, types::SPAWN) {
            frame.take_first_entry(index);
            let accepted = match Self::request(frame, index) {
                Some(request) if host.spawn(&request) => request.count,
                _ => 0,
            };
            let key = scoped_key(frame.action_id(index), "spawned");
            frame.blackboard_mut().set(key, accepted);
            *self.spawned.entry(index).or_insert(0) += accepted;
            frame.complete(index);
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Warning
// ---------------------------------------------------------------------------

/// Default on-screen duration of a warning, in ticks.
pub const DEFAULT_WARNING_TICKS: u64 = 60;

/// Shows the `message` property to the player for `duration_ticks`.
#[derive(Debug, Default)]
pub struct WarningSystem {
    shown: u64,
}

impl WarningSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Warnings accepted by the host since the last load.
    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl System for WarningSystem {
    fn name(&self) -> &str {
        "warning"
    }

    fn order(&self) -> i32 {
        order::WARNING
    }

    fn type_ids(&self) -> &[&'static str] {
        &[types::WARNING]
    }

    fn on_load(&mut self, _frame: &BlueprintFrame) {
        self.shown = 0;
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) {
        let frame = &mut *ctx.frame;
        let host = &mut *ctx.host;
        for index in running(frame, types::WARNING) {
            frame.take_first_entry(index);
            let request = WarningRequest {
                action_id: frame.action_id(index).to_string(),
                message: frame.require_property(index, "message", String::new()),
                duration_ticks: frame.property_or(index, "duration_ticks", DEFAULT_WARNING_TICKS),
                tick: frame.tick(),
            };
            if host.show_warning(&request) {
                self.shown += 1;
            }
            frame.complete(index);
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// Sends the `message` property to the host log sink at `level` (default
/// `info`). Placeholders `{key}` in the message are replaced with blackboard
/// values.
#[derive(Debug, Default)]
pub struct LogSystem;

impl LogSystem {
    pub fn new() -> Self {
        Self
    }

    fn level(frame: &mut BlueprintFrame, index: ActionIndex) -> LogLevel {
        let text: String = frame.property_or(index, "level", "info".to_string());
        LogLevel::parse(&text).unwrap_or_else(|| {
            frame.warn(index, format!("unknown log level '{text}'; using info"));
            LogLevel::Info
        })
    }

    fn write(host: &mut HostServices, frame: &mut BlueprintFrame, index: ActionIndex) {
        let level = Self::level(frame, index);
        let template: String = frame.require_property(index, "message", String::new());
        let message = interpolate(&template, frame);
        host.log(level, frame.action_id(index), &message);
    }
}

/// Replace `{key}` with the blackboard's text for `key`. Unknown keys are
/// left as written.
pub fn interpolate(template: &str, frame: &BlueprintFrame) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match frame.blackboard().value(key) {
                    Some(value) => out.push_str(&value.to_text()),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

impl System for LogSystem {
    fn name(&self) -> &str {
        "log"
    }

    fn order(&self) -> i32 {
        order::LOG
    }

    fn type_ids(&self) -> &[&'static str] {
        &[types::LOG]
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) {
        let frame = &mut *ctx.frame;
        let host = &mut *ctx.host;
        for index in running(frame, types::LOG) {
            frame.take_first_entry(index);
            Self::write(host, frame, index);
            frame.complete(index);
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
