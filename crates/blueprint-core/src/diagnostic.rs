//! Recoverable run-time diagnostics.
//!
//! Systems never fail a run because of bad node data. They substitute a
//! documented default and record a [`Diagnostic`] instead; the frame keeps a
//! bounded log of them and mirrors each one to `tracing`.

/// Default cap on retained diagnostics per frame.
pub const DEFAULT_DIAGNOSTIC_LIMIT: usize = 1024;

/// One recoverable problem observed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Tick during which the problem was observed (0 = load).
    pub tick: u64,
    /// The action concerned, when there is one.
    pub action_id: Option<String>,
    pub message: String,
}

/// Bounded diagnostic log. Once full, further entries are counted but dropped.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
    limit: usize,
    dropped: u64,
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTIC_LIMIT)
    }
}

impl DiagnosticLog {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if self.entries.len() < self.limit {
            self.entries.push(diagnostic);
        } else {
            self.dropped += 1;
        }
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries discarded because the log was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Whether any retained entry concerns `action_id` and mentions `needle`.
    pub fn mentions(&self, action_id: &str, needle: &str) -> bool {
        self.entries
            .iter()
            .any(|d| d.action_id.as_deref() == Some(action_id) && d.message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(message: &str) -> Diagnostic {
        Diagnostic {
            tick: 1,
            action_id: Some("a".into()),
            message: message.into(),
        }
    }

    #[test]
    fn log_caps_and_counts_dropped() {
        let mut log = DiagnosticLog::new(2);
        log.push(diag("one"));
        log.push(diag("two"));
        log.push(diag("three"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.dropped_count(), 1);
        assert!(log.mentions("a", "two"));
        assert!(!log.mentions("a", "three"));
    }
}
