//! Scope-wide report cleanup across mount and unmount churn.
//!
//! Hosts tear instances down and recreate them constantly, and hot reload
//! may unmount and remount the same position within a single frame. So
//! an instance never removes its reports outright. Its teardown asks the
//! inspector to drop the scope, and its next commit cancels any such
//! pending request, leaving the timing of the final removal to the inspector.
//!
//! The cleanup is keyed on the decoded debug key: it re-fires whenever the
//! instance is repositioned in the composition hierarchy, and only then.

use clutch_report_internals::{DebugKey, ScopeId};

use crate::Instrumentation;

#[derive(Clone, Debug)]
struct Armed {
    key: Option<DebugKey>,
    scope: ScopeId,
}

/// Cleanup state of one instance.
///
/// Each armed scope is dropped at most once, so a commit followed by a
/// teardown yields exactly one cancel and one drop.
#[derive(Clone, Debug, Default)]
pub struct CleanupGuard {
    armed: Option<Armed>,
}

impl CleanupGuard {
    /// Creates a guard for an instance that has not committed yet.
    pub const fn new() -> Self {
        Self { armed: None }
    }

    /// The scope whose removal will be requested on teardown.
    pub fn armed_scope(&self) -> Option<&ScopeId> {
        self.armed.as_ref().map(|armed| &armed.scope)
    }

    /// Runs after the instance commits with `key` and `scope`.
    ///
    /// On the first commit, and whenever the key changed since the last one,
    /// the previously armed scope is dropped and removal of `scope` is
    /// cancelled. Returns whether anything ran.
    pub fn commit(
        &mut self,
        instrumentation: &Instrumentation,
        key: Option<&DebugKey>,
        scope: &ScopeId,
    ) -> bool {
        if self
            .armed
            .as_ref()
            .is_some_and(|armed| armed.key.as_ref() == key)
        {
            return false;
        }

        self.teardown(instrumentation);
        instrumentation.cancel_drop_reports(scope);
        self.armed = Some(Armed {
            key: key.cloned(),
            scope: scope.clone(),
        });
        true
    }

    /// Runs when the instance unmounts. Returns whether a removal was
    /// requested.
    pub fn teardown(&mut self, instrumentation: &Instrumentation) -> bool {
        match self.armed.take() {
            Some(armed) => {
                instrumentation.drop_reports(&armed.scope);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        inspector::{InspectorEvent, MemoryInspector},
        scheduler::ManualScheduler,
    };

    fn attached() -> (Instrumentation, Arc<MemoryInspector>) {
        let instrumentation = Instrumentation::builder(ManualScheduler::new())
            .global_inspector(false)
            .build();
        let memory = Arc::new(MemoryInspector::new());
        instrumentation.attach_inspector(memory.clone());
        (instrumentation, memory)
    }

    fn calls(memory: &MemoryInspector) -> Vec<String> {
        memory
            .events()
            .into_iter()
            .filter_map(|event| match event {
                InspectorEvent::CancelDrop(scope) => Some(format!("cancel {scope}")),
                InspectorEvent::Drop(scope) => Some(format!("drop {scope}")),
                InspectorEvent::Report { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_commit_then_teardown() {
        let (instrumentation, memory) = attached();
        let key = DebugKey::parse("0#42#");
        let scope = ScopeId::new("42");
        let mut guard = CleanupGuard::new();

        assert!(guard.commit(&instrumentation, key.as_ref(), &scope));
        assert!(!guard.commit(&instrumentation, key.as_ref(), &scope));
        assert!(guard.teardown(&instrumentation));
        assert!(!guard.teardown(&instrumentation));

        assert_eq!(calls(&memory), ["cancel 42", "drop 42"]);
    }

    #[test]
    fn test_key_change_refires() {
        let (instrumentation, memory) = attached();
        let mut guard = CleanupGuard::new();

        let first = DebugKey::parse("0#42#");
        guard.commit(&instrumentation, first.as_ref(), &ScopeId::new("42"));
        let moved = DebugKey::parse("7#42#");
        guard.commit(&instrumentation, moved.as_ref(), &ScopeId::new("7.42"));
        guard.teardown(&instrumentation);

        assert_eq!(
            calls(&memory),
            ["cancel 42", "drop 42", "cancel 7.42", "drop 7.42"]
        );
    }

    #[test]
    fn test_remount_churn() {
        let (instrumentation, memory) = attached();
        let key = DebugKey::parse("0#card#");
        let scope = ScopeId::new("card");

        let mut before = CleanupGuard::new();
        before.commit(&instrumentation, key.as_ref(), &scope);
        before.teardown(&instrumentation);

        let mut after = CleanupGuard::new();
        after.commit(&instrumentation, key.as_ref(), &scope);

        assert_eq!(calls(&memory), ["cancel card", "drop card", "cancel card"]);
        assert_eq!(after.armed_scope(), Some(&scope));
    }

    #[test]
    fn test_without_inspector_nothing_is_called() {
        let instrumentation = Instrumentation::builder(ManualScheduler::new())
            .global_inspector(false)
            .build();
        let mut guard = CleanupGuard::new();

        assert!(guard.commit(&instrumentation, None, &ScopeId::new("3")));
        assert!(guard.teardown(&instrumentation));

        let memory = Arc::new(MemoryInspector::new());
        instrumentation.attach_inspector(memory.clone());
        assert!(memory.events().is_empty());
    }
}
