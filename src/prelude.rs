//! Commonly used items for convenient importing.
//!
//! ```rust
//! use clutch_report::prelude::*;
//!
//! let instrumentation = Instrumentation::builder(ManualScheduler::new()).build();
//! let mut slot = InstanceSlot::new();
//! let rendered = instrumentation.use_report(&mut slot, "app", &Props::new(), None, None, None);
//! assert!(rendered.report.property_name().is_composition());
//! # instrumentation.shutdown();
//! ```
//!
//! # What's Included
//!
//! - **[`Instrumentation`]** and **[`InstanceSlot`]**: the context and the
//!   per-instance state driven through it
//! - **[`Report`]**, **[`Props`]** and **[`get_report`]**: building reports
//! - **[`InspectorSink`]** and **[`MemoryInspector`]**: consuming them
//! - **[`ManualScheduler`]**: a scheduler for single-threaded hosts

pub use crate::{
    DebugKey, InstanceSlot, Instrumentation, ScopeId, get_report,
    inspector::{InspectorSink, MemoryInspector},
    report::{Props, Report, SharedVars, Vars},
    scheduler::{ManualScheduler, Scheduler},
};
