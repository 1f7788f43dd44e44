//! Observers for warnings raised while shaping responses

use std::sync::Mutex;

use tracing::warn;

use super::{Specification, Warning};

/// Receives every non-empty warning list produced by a contract.
///
/// Route handlers, tests and production logging all observe the same event
/// through this hook; the engine itself has no opinion on where it goes.
pub trait WarningSink: Send + Sync {
    fn record(&self, spec: &Specification, warnings: &[Warning]);
}

/// Default sink: structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWarningSink;

impl WarningSink for TracingWarningSink {
    fn record(&self, spec: &Specification, warnings: &[Warning]) {
        warn!(
            contract = spec.name(),
            endpoint = spec.endpoint(),
            method = %spec.method(),
            count = warnings.len(),
            "{}",
            warnings.join(" ")
        );
    }
}

/// One recorded sink event
#[derive(Debug, Clone, PartialEq)]
pub struct SinkEvent {
    pub contract: String,
    pub endpoint: String,
    pub warnings: Vec<Warning>,
}

/// Sink that keeps every event in memory, for inspection in tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// All recorded warnings, flattened in arrival order
    pub fn warnings(&self) -> Vec<Warning> {
        self.events()
            .into_iter()
            .flat_map(|event| event.warnings)
            .collect()
    }
}

impl WarningSink for RecordingSink {
    fn record(&self, spec: &Specification, warnings: &[Warning]) {
        if let Ok(mut events) = self.events.lock() {
            events.push(SinkEvent {
                contract: spec.name().to_string(),
                endpoint: spec.endpoint().to_string(),
                warnings: warnings.to_vec(),
            });
        }
    }
}
