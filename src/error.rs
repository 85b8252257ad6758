//! Failure taxonomy for the instrumentation core.
//!
//! None of these failures ever reach the host render pass. Internally they are
//! carried as [`Outcome`] values, a [`rootcause::Report`] wrapping an
//! [`InstrumentError`] with attachments describing the offending input; the
//! public entry points log them and fall back to a safe default.

use core::fmt;

/// Result type used for internal, best-effort operations.
pub type Outcome<T> = Result<T, rootcause::Report<InstrumentError>>;

/// Reasons an instrumentation step fell back to a default.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentError {
    /// A debug key did not have the `scope#id#customKey` shape.
    MalformedDebugKey,
    /// A render-prop payload was expected but none was supplied.
    MissingRenderProp,
    /// User-supplied render-prop code returned an error.
    RenderPropFailed,
    /// User-supplied render-prop code panicked.
    RenderPropPanicked,
    /// A theme token entry has no string `varRef` field.
    MissingVarRef,
    /// A global inspector is already installed.
    InspectorAlreadyInstalled,
}

impl fmt::Display for InstrumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::MalformedDebugKey => "debug key is not of the form scope#id#customKey",
            Self::MissingRenderProp => "code property on an instance is not exporting a function",
            Self::RenderPropFailed => "render prop returned an error",
            Self::RenderPropPanicked => "render prop panicked",
            Self::MissingVarRef => "token entry has no varRef",
            Self::InspectorAlreadyInstalled => "an inspector is already installed globally",
        };
        f.write_str(message)
    }
}

impl core::error::Error for InstrumentError {}
