//! Execution traces and the correlation-id archive.

use std::collections::{BTreeSet, VecDeque};

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::label;
use crate::phase::Phase;

/// How one traced step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Completed normally.
    Ok,
    /// Failed and aborted the invocation.
    Error,
    /// Failed in a non-fatal phase; the failure was logged and ignored.
    Skipped,
}

/// The observable record of one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    /// The phase the step ran in.
    pub phase: Phase,
    /// The step label.
    pub label: String,
    /// How it ended.
    pub outcome: Outcome,
}

impl TraceEntry {
    /// The `"PHASE:label"` introspection form.
    #[must_use]
    pub fn qualified(&self) -> String {
        label::qualified(self.phase, &self.label)
    }
}

/// Ordered record of the steps an invocation executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub(crate) fn push(&mut self, phase: Phase, label: &str, outcome: Outcome) {
        self.entries.push(TraceEntry {
            phase,
            label: label.to_string(),
            outcome,
        });
    }

    /// Every entry, in execution order.
    #[must_use]
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// `"PHASE:label"` strings, in execution order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(TraceEntry::qualified).collect()
    }

    /// `"PHASE:label"` strings as a set, for cross-transport comparison.
    #[must_use]
    pub fn label_set(&self) -> BTreeSet<String> {
        self.entries.iter().map(TraceEntry::qualified).collect()
    }

    /// Phases that recorded at least one entry, in first-seen order.
    #[must_use]
    pub fn phases(&self) -> Vec<Phase> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&entry.phase) {
                seen.push(entry.phase);
            }
        }
        seen
    }

    /// Index of the first entry with this label.
    #[must_use]
    pub fn position(&self, label: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.label == label)
    }

    /// Returns true if any entry has this label.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing ran.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TraceArchive
// ─────────────────────────────────────────────────────────────────────────────

/// Bounded FIFO of recent traces keyed by correlation id.
#[derive(Debug)]
pub(crate) struct TraceArchive {
    capacity: usize,
    inner: Mutex<ArchiveInner>,
}

#[derive(Debug, Default)]
struct ArchiveInner {
    order: VecDeque<String>,
    traces: HashMap<String, Trace>,
}

impl TraceArchive {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(ArchiveInner::default()),
        }
    }

    pub(crate) fn record(&self, correlation_id: &str, trace: Trace) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        if inner
            .traces
            .insert(correlation_id.to_string(), trace)
            .is_none()
        {
            inner.order.push_back(correlation_id.to_string());
        }
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.traces.remove(&evicted);
            }
        }
    }

    pub(crate) fn get(&self, correlation_id: &str) -> Option<Trace> {
        self.inner.lock().traces.get(correlation_id).cloned()
    }
}
