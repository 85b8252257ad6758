#![forbid(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
//! Internal implementation crate for [`clutch-report`].
//!
//! # Overview
//!
//! This crate contains the pure, host-independent pieces of the instrumentation
//! core: the codec for the compact debug keys that travel down the component
//! tree, and the derivation of hierarchical scope identities from those keys.
//!
//! **This crate is an implementation detail.** No semantic versioning guarantees
//! are provided. Users should depend on the [`clutch-report`] crate, not this
//! one.
//!
//! # Architecture
//!
//! - **[`debug_key`]**: The `scope#id#customKey` wire format
//!   - [`DebugKey`]: Owned, decoded key
//!   - [`decode`] / [`encode`]: Borrowed codec functions
//!
//! - **[`scope`]**: Scope identities
//!   - [`ScopeId`]: Dot-separated hierarchical scope address
//!   - [`calculate_scope`]: Pure derivation from a debug key
//!   - [`ScopeCache`]: Per-instance memoization with counter fallback
//!   - [`InstanceCounter`]: Monotonic fallback identity source
//!
//! A scope accumulates one segment per composition boundary. Intermediate
//! renders that are not instrumented never see a debug key and therefore never
//! add a segment:
//!
//! ```
//! use clutch_report_internals::{DebugKey, calculate_scope};
//!
//! // A root instance with id `42` hands this key to its child.
//! let key = DebugKey::new("0", "42", "").encode();
//! assert_eq!(calculate_scope(Some(&key)).as_str(), "42");
//!
//! // The child re-addresses its own children under `42`.
//! let nested = DebugKey::new("42", "7", "row-1").encode();
//! assert_eq!(calculate_scope(Some(&nested)).as_str(), "42.7");
//! ```
//!
//! [`clutch-report`]: https://docs.rs/clutch-report

pub mod debug_key;
pub mod scope;

pub use self::{
    debug_key::{DebugKey, decode, encode},
    scope::{InstanceCounter, ROOT_SCOPE, ScopeCache, ScopeId, calculate_scope, derive_scope},
};
