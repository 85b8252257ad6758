#![forbid(unsafe_code)]
#![deny(
    missing_docs,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Extra checks on nightly
#![cfg_attr(nightly_extra_checks, feature(rustdoc_missing_doc_code_examples))]
#![cfg_attr(nightly_extra_checks, forbid(rustdoc::missing_doc_code_examples))]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Runtime provenance reports for composed UI component trees.
//!
//! ## Overview
//!
//! When a component tree is built out of composed, user-editable components,
//! an inspector needs to know, for every instance on screen, where it came
//! from and what it computed. This crate is the instrumentation core that
//! answers that question at render time.
//!
//! Each instrumented instance derives a hierarchical **scope** from the
//! compact **debug key** its parent handed it, builds an immutable
//! [`Report`] describing its props, variables and variants, and sends it to an
//! attached inspector under a composite delivery key. Keys for the instances
//! it composes are built from its own scope, so the addresses of a whole tree
//! mirror its composition hierarchy.
//!
//! Nothing here ever interrupts the host's render pass. Reports sent while no
//! inspector is attached are buffered and delivered, in order and exactly
//! once, as soon as one appears. Malformed input falls back to a safe default.
//!
//! ## Quick Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use clutch_report::prelude::*;
//! use serde_json::json;
//!
//! let instrumentation = Instrumentation::builder(ManualScheduler::new())
//!     .global_inspector(false)
//!     .build();
//! let inspector = Arc::new(MemoryInspector::new());
//! instrumentation.attach_inspector(inspector.clone());
//!
//! // Rendering the page instance.
//! let mut page = InstanceSlot::new();
//! let rendered = instrumentation.use_report(&mut page, "page", &Props::new(), None, None, None);
//!
//! // The page composes a header; its key goes down as the header's `data-d`.
//! let header_key = rendered.keys.key(&rendered.report, "header", "", None);
//!
//! let mut header = InstanceSlot::new();
//! let mut props = Props::new();
//! props.insert("data-d".into(), json!(header_key));
//! instrumentation.use_report(&mut header, "header", &props, None, None, None);
//!
//! assert_eq!(
//!     inspector.delivered_keys(),
//!     ["0#page#none", "0#header#", "header#header#none"]
//! );
//! ```
//!
//! ## Architecture
//!
//! - **[`clutch_report_internals`]**: the debug key codec and scope derivation,
//!   re-exported here as [`DebugKey`], [`ScopeId`] and friends.
//! - **[`report`]**: the immutable [`Report`] record and [`merge_variables`].
//! - **[`Instrumentation`]**: the shared context owning the delivery buffer, its
//!   retry timer and the attached inspector.
//! - **[`instance`]**: the per-instance entry points, `use_report`, `commit`
//!   and `unmount`, with the cleanup protocol in [`lifecycle`].
//! - **[`inspector`]**: the [`InspectorSink`](inspector::InspectorSink)
//!   contract and the process-wide inspector handle.
//! - **[`scheduler`]**: where the retry timer runs. [`ManualScheduler`](scheduler::ManualScheduler)
//!   for single-threaded hosts and tests; `TokioScheduler` with the `tokio`
//!   feature.
//! - **[`theme`]**: the token flattener and color mode state.
//! - **[`guard`]**: guarded invocation of render props.
//!
//! ## Logging
//!
//! Events are emitted through [`tracing`] under the `clutch_report::delivery`,
//! `clutch_report::lifecycle`, `clutch_report::guard` and
//! `clutch_report::theme` targets. No subscriber is installed by this crate.

pub mod config;
mod context;
pub mod delivery;
mod error;
pub mod guard;
pub mod inspector;
pub mod instance;
pub mod lifecycle;
pub mod prelude;
pub mod report;
pub mod scheduler;
pub mod theme;

pub use clutch_report_internals::{
    DebugKey, InstanceCounter, ROOT_SCOPE, ScopeCache, ScopeId, calculate_scope, decode,
    derive_scope, encode,
};

pub use self::{
    context::{Instrumentation, InstrumentationBuilder},
    error::{InstrumentError, Outcome},
    instance::{ChildKeys, InstanceSlot, RenderedInstance, StaticRender},
    report::{Report, merge_variables},
};

/// Alias of [`merge_variables`] under the name render-prop code knows it by.
pub use self::report::merge_variables as get_report;
