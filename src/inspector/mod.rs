//! The inspector sink contract and its process-wide handle.
//!
//! An inspector is any consumer of reports implementing [`InspectorSink`]. It
//! can be attached to a single [`Instrumentation`](crate::Instrumentation)
//! context, or installed once for the whole process through the well-known
//! handle in this module. Contexts configured with
//! [`use_global_inspector`](crate::config::InstrumentationConfig::use_global_inspector)
//! look the handle up on every call, so an inspector installed late is picked
//! up without any coordination.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use clutch_report::inspector::{self, MemoryInspector};
//!
//! let memory = Arc::new(MemoryInspector::new());
//! inspector::install(memory.clone()).expect("failed to install inspector");
//!
//! // A second installation is rejected and hands the sink back.
//! let rejected = inspector::install(Arc::new(MemoryInspector::new())).unwrap_err();
//! drop(rejected.0);
//!
//! # inspector::uninstall();
//! ```

mod memory;
mod slot;

use core::fmt;
use std::sync::Arc;

use clutch_report_internals::ScopeId;

pub use self::memory::{InspectorEvent, MemoryInspector};
pub(crate) use self::slot::SinkSlot;
use crate::report::Report;

/// Contract versions an inspector can implement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum InspectorVersion {
    /// The only version this crate speaks.
    V1,
}

/// A consumer of reports.
///
/// Implementations must be best-effort: they must not panic on malformed
/// reports or unknown scopes.
pub trait InspectorSink: Send + Sync + 'static {
    /// Accepts one report addressed by its composite delivery key.
    fn report(&self, key: &str, report: &Report, internal_id: Option<&str>);

    /// Cancels a pending removal of the reports under `scope`.
    fn cancel_drop_reports(&self, scope: &ScopeId);

    /// Requests removal of every report under `scope`. The inspector decides
    /// when the removal takes effect.
    fn drop_reports(&self, scope: &ScopeId);

    /// The contract version this inspector implements.
    fn version(&self) -> InspectorVersion {
        InspectorVersion::V1
    }
}

/// A shared inspector handle.
pub type SharedSink = Arc<dyn InspectorSink>;

/// Error returned when attempting to install an inspector when one is already
/// installed.
///
/// Contains the inspector that was attempted to be installed.
pub struct InspectorAlreadyInstalledError(pub SharedSink);

impl fmt::Debug for InspectorAlreadyInstalledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InspectorAlreadyInstalledError").finish()
    }
}

impl fmt::Display for InspectorAlreadyInstalledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&crate::InstrumentError::InspectorAlreadyInstalled, f)
    }
}

impl core::error::Error for InspectorAlreadyInstalledError {}

static GLOBAL: SinkSlot = SinkSlot::new();

/// Installs the process-wide inspector.
///
/// If an inspector is already installed, returns an
/// [`InspectorAlreadyInstalledError`] containing `sink`.
///
/// See also [`replace`] which will replace any existing inspector without
/// erroring.
pub fn install(sink: SharedSink) -> Result<(), InspectorAlreadyInstalledError> {
    GLOBAL.install(sink).map_err(InspectorAlreadyInstalledError)?;
    tracing::debug!(target: "clutch_report::delivery", "global inspector installed");
    Ok(())
}

/// Replaces the process-wide inspector, returning the previous one.
pub fn replace(sink: SharedSink) -> Option<SharedSink> {
    GLOBAL.replace(Some(sink))
}

/// Removes the process-wide inspector, returning it.
pub fn uninstall() -> Option<SharedSink> {
    GLOBAL.replace(None)
}

/// The currently installed process-wide inspector, of any version.
pub fn current() -> Option<SharedSink> {
    GLOBAL.get()
}

/// Whether a process-wide inspector is installed.
pub fn is_installed() -> bool {
    GLOBAL.is_set()
}

/// The installed process-wide inspector, if it speaks [`InspectorVersion::V1`].
pub(crate) fn current_v1() -> Option<SharedSink> {
    current().filter(|sink| sink.version() == InspectorVersion::V1)
}
