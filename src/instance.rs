//! Per-instance instrumentation entry points.
//!
//! A host keeps one [`InstanceSlot`] per live component instance, the way it
//! would keep any other per-instance state, and drives it through three
//! phases:
//!
//! 1. **Render**: [`Instrumentation::use_report`] resolves the instance's
//!    scope, builds and sends its own report, and returns a [`ChildKeys`]
//!    builder for the instances it composes.
//! 2. **Commit**: [`Instrumentation::commit`] cancels any pending removal of
//!    the scope, or re-arms the cleanup if the instance moved.
//! 3. **Unmount**: [`Instrumentation::unmount`] requests removal of the
//!    scope's reports and forgets the cached scope.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use clutch_report::{
//!     Instrumentation, InstanceSlot, get_report,
//!     inspector::MemoryInspector,
//!     report::Props,
//!     scheduler::ManualScheduler,
//! };
//! use serde_json::json;
//!
//! let instrumentation = Instrumentation::builder(ManualScheduler::new())
//!     .global_inspector(false)
//!     .build();
//! let memory = Arc::new(MemoryInspector::new());
//! instrumentation.attach_inspector(memory.clone());
//!
//! let mut props = Props::new();
//! props.insert("data-d".into(), json!("0#list#"));
//! props.insert("items".into(), json!(["a", "b"]));
//!
//! let mut slot = InstanceSlot::new();
//! let list = instrumentation.use_report(&mut slot, "list", &props, None, None, None);
//! assert!(!list.props.contains_key("data-d"));
//!
//! // A render prop called for each item derives a sub-report and addresses
//! // the item instance under the list's scope.
//! for (index, item) in ["a", "b"].into_iter().enumerate() {
//!     let (item_report, _vars) =
//!         get_report("list", "renderItem", Some(&list.report), "item", vec![json!(item)]);
//!     let key = list.keys.key(&item_report, "row", &index.to_string(), None);
//!     assert_eq!(key, format!("list#row#{index}"));
//! }
//!
//! instrumentation.commit(&mut slot);
//! instrumentation.unmount(&mut slot);
//! assert_eq!(memory.delivered_keys(), ["list#list#none", "list#row#0", "list#row#1"]);
//! ```

use clutch_report_internals::{DebugKey, ScopeCache, ScopeId, calculate_scope, encode};
use serde_json::Value;

use crate::{
    Instrumentation, InstrumentError, Outcome,
    lifecycle::CleanupGuard,
    report::{Props, Report, SharedVars},
};

/// Prop carrying the inherited debug key.
pub const DEBUG_KEY_PROP: &str = "data-d";

/// Prop the node reference is stored under.
pub const REF_PROP: &str = "ref";

/// Custom key of an instance's own report.
pub const OWN_REPORT_KEY: &str = "none";

/// Per-instance instrumentation state, owned by the host instance.
#[derive(Clone, Debug, Default)]
pub struct InstanceSlot {
    scope: ScopeCache,
    cleanup: CleanupGuard,
}

impl InstanceSlot {
    /// State for a freshly created instance.
    pub const fn new() -> Self {
        Self {
            scope: ScopeCache::new(),
            cleanup: CleanupGuard::new(),
        }
    }

    /// The scope resolved on the last render, if any.
    pub fn scope(&self) -> Option<&ScopeId> {
        self.scope.current()
    }

    /// The scope whose reports will be dropped on unmount.
    pub fn armed_scope(&self) -> Option<&ScopeId> {
        self.cleanup.armed_scope()
    }
}

/// Builds the composite keys of the instances composed by one owner.
#[derive(Clone, Debug)]
pub struct ChildKeys {
    reporter: Option<Instrumentation>,
    scope: ScopeId,
}

impl ChildKeys {
    /// The owner scope children are addressed under.
    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    /// Computes `scope#childId#customKey` without sending anything.
    pub fn key_for(&self, child_id: &str, custom_key: &str) -> String {
        encode(self.scope.as_str(), child_id, custom_key)
    }

    /// Computes the composite key of a child and sends `child_report` under
    /// it.
    ///
    /// The returned key is also the debug key to hand to the child.
    pub fn key(
        &self,
        child_report: &Report,
        child_id: &str,
        custom_key: &str,
        internal_id: Option<&str>,
    ) -> String {
        let key = self.key_for(child_id, custom_key);
        if let Some(reporter) = &self.reporter {
            reporter.send(&key, child_report, internal_id);
        }
        key
    }
}

/// The result of instrumenting one render of an instance.
#[derive(Clone, Debug)]
pub struct RenderedInstance {
    /// The instance's own report.
    pub report: Report,
    /// Key builder for composed children.
    pub keys: ChildKeys,
    /// The props without the debug key, with the node reference applied.
    pub props: Props,
}

impl RenderedInstance {
    /// Splits into `(report, keys, props)`.
    pub fn into_parts(self) -> (Report, ChildKeys, Props) {
        (self.report, self.keys, self.props)
    }
}

/// A render without instance state, such as on a server.
#[derive(Clone, Debug)]
pub struct StaticRender {
    /// Key builder that never sends.
    pub keys: ChildKeys,
    /// The props without the debug key, with the node reference applied.
    pub props: Props,
}

fn debug_key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Copies `props`, removing the debug key and applying `node_ref`.
fn clean_props(props: &Props, node_ref: Option<Value>) -> (Props, Option<String>) {
    let mut props = props.clone();
    let debug_key = props.get(DEBUG_KEY_PROP).and_then(debug_key_text);

    if let Some(node_ref) = node_ref {
        props.insert(REF_PROP.to_owned(), node_ref);
    }
    props.shift_remove(DEBUG_KEY_PROP);

    (props, debug_key)
}

fn lineage(raw: &str) -> Outcome<DebugKey> {
    DebugKey::parse(raw).ok_or_else(|| {
        rootcause::Report::new(InstrumentError::MalformedDebugKey).attach(format!("key: {raw:?}"))
    })
}

impl Instrumentation {
    fn resolve_scope(&self, slot: &mut InstanceSlot, debug_key: Option<&str>) -> ScopeId {
        if let Some(Err(report)) = debug_key.map(lineage) {
            tracing::debug!(
                target: "clutch_report::lifecycle",
                "{report}; falling back to a counter scope"
            );
        }
        slot.scope.resolve(debug_key, self.instance_counter()).clone()
    }

    /// Instruments one render of an instance.
    ///
    /// The scope is resolved from the `data-d` prop, reusing the cached one
    /// unless the decoded key changed. The own report is sent under
    /// `scope#instanceId#none`.
    pub fn use_report(
        &self,
        slot: &mut InstanceSlot,
        instance_id: &str,
        props: &Props,
        vars: Option<SharedVars>,
        variants: Option<Value>,
        node_ref: Option<Value>,
    ) -> RenderedInstance {
        let (props, debug_key) = clean_props(props, node_ref);
        let scope = self.resolve_scope(slot, debug_key.as_deref());

        let report = Report::own(instance_id, Some(props.clone()), vars, variants);
        self.send(
            &encode(scope.as_str(), instance_id, OWN_REPORT_KEY),
            &report,
            None,
        );

        RenderedInstance {
            report,
            keys: ChildKeys {
                reporter: Some(self.clone()),
                scope,
            },
            props,
        }
    }

    /// Instruments a report built elsewhere, inheriting `debug_key`.
    ///
    /// Unlike [`use_report`](Self::use_report) nothing is sent for the report
    /// itself; it is the caller's to deliver.
    pub fn track_report(&self, slot: &mut InstanceSlot, debug_key: Option<&str>) -> ChildKeys {
        let scope = self.resolve_scope(slot, debug_key);
        ChildKeys {
            reporter: Some(self.clone()),
            scope,
        }
    }

    /// Runs the commit phase of an instance's cleanup protocol.
    pub fn commit(&self, slot: &mut InstanceSlot) {
        let InstanceSlot { scope, cleanup } = slot;
        if let Some(current) = scope.current() {
            cleanup.commit(self, scope.input(), current);
        }
    }

    /// Runs the unmount phase: requests removal of the instance's reports and
    /// forgets its scope.
    pub fn unmount(&self, slot: &mut InstanceSlot) {
        slot.cleanup.teardown(self);
        slot.scope.reset();
    }

    /// Instruments a render that has no instance state.
    ///
    /// No report is built or sent and the instance counter is not touched;
    /// children are addressed under the scope derived from the debug key
    /// alone.
    pub fn static_render(props: &Props, node_ref: Option<Value>) -> StaticRender {
        let (props, debug_key) = clean_props(props, node_ref);
        StaticRender {
            keys: ChildKeys {
                reporter: None,
                scope: calculate_scope(debug_key.as_deref()),
            },
            props,
        }
    }
}
