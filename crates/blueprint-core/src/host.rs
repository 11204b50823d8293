//! Host capability interfaces.
//!
//! Domain systems produce side effects only through these interfaces. Each
//! effect is a structured request record handed to a host-registered handler.
//! A capability the host did not register degrades to a logged no-op.

use crate::id::SceneHandle;

// ---------------------------------------------------------------------------
// Logging sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Parse a level name; unknown names yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Host-side log output for messages authored into the graph.
pub trait LogSink {
    fn log(&mut self, level: LogLevel, action_id: &str, message: &str);
}

/// Default sink: forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn log(&mut self, level: LogLevel, action_id: &str, message: &str) {
        match level {
            LogLevel::Info => tracing::info!(action = action_id, "{message}"),
            LogLevel::Warning => tracing::warn!(action = action_id, "{message}"),
            LogLevel::Error => tracing::error!(action = action_id, "{message}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Effect requests
// ---------------------------------------------------------------------------

/// Ask the host to spawn `count` instances of `prefab`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub action_id: String,
    pub prefab: String,
    pub count: u32,
    /// Where to spawn. `None` lets the host pick its default location.
    pub anchor: Option<SceneHandle>,
    pub tick: u64,
}

pub trait SpawnHandler {
    fn spawn(&mut self, request: &SpawnRequest);
}

impl<F: FnMut(&SpawnRequest)> SpawnHandler for F {
    fn spawn(&mut self, request: &SpawnRequest) {
        self(request)
    }
}

/// Ask the host to display a warning to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningRequest {
    pub action_id: String,
    pub message: String,
    /// How long the host should keep the warning on screen, in ticks.
    pub duration_ticks: u64,
    pub tick: u64,
}

pub trait WarningHandler {
    fn show_warning(&mut self, request: &WarningRequest);
}

impl<F: FnMut(&WarningRequest)> WarningHandler for F {
    fn show_warning(&mut self, request: &WarningRequest) {
        self(request)
    }
}

// ---------------------------------------------------------------------------
// HostServices
// ---------------------------------------------------------------------------

/// The capabilities a host has registered with a runner.
pub struct HostServices {
    log: Box<dyn LogSink>,
    spawn: Option<Box<dyn SpawnHandler>>,
    warning: Option<Box<dyn WarningHandler>>,
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices")
            .field("spawn", &self.spawn.is_some())
            .field("warning", &self.warning.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for HostServices {
    fn default() -> Self {
        Self::new()
    }
}

impl HostServices {
    /// Logging through `tracing`, no effect handlers.
    pub fn new() -> Self {
        Self {
            log: Box::new(TracingLog),
            spawn: None,
            warning: None,
        }
    }

    pub fn with_log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.log = Box::new(sink);
        self
    }

    pub fn with_spawn_handler(mut self, handler: impl SpawnHandler + 'static) -> Self {
        self.spawn = Some(Box::new(handler));
        self
    }

    pub fn with_warning_handler(mut self, handler: impl WarningHandler + 'static) -> Self {
        self.warning = Some(Box::new(handler));
        self
    }

    pub fn log(&mut self, level: LogLevel, action_id: &str, message: &str) {
        self.log.log(level, action_id, message);
    }

    /// Forward a spawn request. Returns `false` when no handler is registered.
    pub fn spawn(&mut self, request: &SpawnRequest) -> bool {
        match self.spawn.as_mut() {
            Some(handler) => {
                handler.spawn(request);
                true
            }
            None => {
                tracing::warn!(
                    action = %request.action_id,
                    prefab = %request.prefab,
                    "no spawn handler registered; request ignored"
                );
                false
            }
        }
    }

    /// Forward a warning request. Returns `false` when no handler is registered.
    pub fn show_warning(&mut self, request: &WarningRequest) -> bool {
        match self.warning.as_mut() {
            Some(handler) => {
                handler.show_warning(request);
                true
            }
            None => {
                tracing::warn!(
                    action = %request.action_id,
                    message = %request.message,
                    "no warning handler registered; request ignored"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn request() -> SpawnRequest {
        SpawnRequest {
            action_id: "spawn_1".into(),
            prefab: "crate".into(),
            count: 2,
            anchor: None,
            tick: 3,
        }
    }

    #[test]
    fn unregistered_handlers_are_no_ops() {
        let mut host = HostServices::new();
        assert!(!host.spawn(&request()));
        let warning = WarningRequest {
            action_id: "w".into(),
            message: "low fuel".into(),
            duration_ticks: 10,
            tick: 1,
        };
        assert!(!host.show_warning(&warning));
    }

    #[test]
    fn closures_act_as_handlers() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut host = HostServices::new()
            .with_spawn_handler(move |r: &SpawnRequest| sink.borrow_mut().push(r.clone()));
        assert!(host.spawn(&request()));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].prefab, "crate");
    }

    #[test]
    fn log_level_parse() {
        assert_eq!(LogLevel::parse("Warning"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("warn"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("loud"), None);
    }
}
