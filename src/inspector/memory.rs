use clutch_report_internals::{ScopeId, decode, scope::SCOPE_SEPARATOR};
use indexmap::IndexMap;

use super::InspectorSink;
use crate::report::Report;

/// One call received by a [`MemoryInspector`].
#[derive(Clone, Debug)]
pub enum InspectorEvent {
    /// A report delivery.
    Report {
        /// Composite delivery key.
        key: String,
        /// The delivered report.
        report: Report,
        /// Host-internal id, when one was supplied.
        internal_id: Option<String>,
    },
    /// A cancelled removal.
    CancelDrop(ScopeId),
    /// A removal request.
    Drop(ScopeId),
}

#[derive(Default)]
struct MemoryState {
    events: Vec<InspectorEvent>,
    live: IndexMap<String, Report>,
}

/// An in-process inspector that keeps the latest report per key.
///
/// Every call is also appended to an event log. A removal request drops the
/// reports of the scope and of every scope nested inside it immediately.
#[derive(Default)]
pub struct MemoryInspector {
    state: spin::Mutex<MemoryState>,
}

impl core::fmt::Debug for MemoryInspector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryInspector")
            .field("events", &state.events.len())
            .field("live", &state.live.len())
            .finish()
    }
}

impl MemoryInspector {
    /// Creates an empty inspector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call received so far, in order.
    pub fn events(&self) -> Vec<InspectorEvent> {
        self.state.lock().events.clone()
    }

    /// The keys of every delivered report, in delivery order, duplicates
    /// included.
    pub fn delivered_keys(&self) -> Vec<String> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|event| match event {
                InspectorEvent::Report { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// The latest report for `key`, unless it has been dropped.
    pub fn live_report(&self, key: &str) -> Option<Report> {
        self.state.lock().live.get(key).cloned()
    }

    /// Keys of the reports currently held, in first-delivery order.
    pub fn live_keys(&self) -> Vec<String> {
        self.state.lock().live.keys().cloned().collect()
    }

    /// Forgets all events and reports.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.events.clear();
        state.live.clear();
    }
}

fn within(scope: &ScopeId, key: &str) -> bool {
    let key_scope = match decode(key) {
        Some([key_scope, _, _]) => key_scope,
        None => return false,
    };
    key_scope == scope.as_str()
        || key_scope
            .strip_prefix(scope.as_str())
            .is_some_and(|rest| rest.starts_with(SCOPE_SEPARATOR))
}

impl InspectorSink for MemoryInspector {
    fn report(&self, key: &str, report: &Report, internal_id: Option<&str>) {
        let mut state = self.state.lock();
        state.live.insert(key.to_owned(), report.clone());
        state.events.push(InspectorEvent::Report {
            key: key.to_owned(),
            report: report.clone(),
            internal_id: internal_id.map(str::to_owned),
        });
    }

    fn cancel_drop_reports(&self, scope: &ScopeId) {
        self.state
            .lock()
            .events
            .push(InspectorEvent::CancelDrop(scope.clone()));
    }

    fn drop_reports(&self, scope: &ScopeId) {
        let mut state = self.state.lock();
        state.live.retain(|key, _| !within(scope, key));
        state.events.push(InspectorEvent::Drop(scope.clone()));
    }
}
