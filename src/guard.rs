//! Guarded invocation of user-supplied render-prop code.
//!
//! Render props are arbitrary host code. A failing render prop must never
//! abort the render pass that instruments it, so failures are logged on the
//! `clutch_report::guard` target and turned into [`None`].

use core::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::{InstrumentError, Outcome};

fn panic_message(payload: &(dyn core::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

fn run_guarded<A, T, E, F>(code: Option<F>, args: A) -> Outcome<T>
where
    F: FnOnce(A) -> Result<T, E>,
    E: fmt::Display,
{
    let Some(code) = code else {
        return Err(rootcause::Report::new(InstrumentError::MissingRenderProp));
    };

    match panic::catch_unwind(AssertUnwindSafe(move || code(args))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(rootcause::Report::new(InstrumentError::RenderPropFailed)
            .attach(format!("error: {error}"))),
        Err(payload) => Err(rootcause::Report::new(InstrumentError::RenderPropPanicked)
            .attach(format!("panic: {}", panic_message(&*payload)))),
    }
}

/// Runs a fallible render prop, returning [`None`] if it is missing, returns
/// an error, or panics.
///
/// The panic hook still runs for a panicking render prop.
///
/// ```
/// use clutch_report::guard::try_render;
///
/// let double = |n: i32| Ok::<_, String>(n * 2);
/// assert_eq!(try_render(Some(double), 21), Some(42));
///
/// let failing = |_: i32| Err::<i32, _>("no rows");
/// assert_eq!(try_render(Some(failing), 1), None);
///
/// assert_eq!(try_render(None::<fn(i32) -> Result<i32, String>>, 1), None);
/// ```
pub fn try_render<A, T, E, F>(code: Option<F>, args: A) -> Option<T>
where
    F: FnOnce(A) -> Result<T, E>,
    E: fmt::Display,
{
    match run_guarded(code, args) {
        Ok(value) => Some(value),
        Err(report) => {
            tracing::error!(target: "clutch_report::guard", "{report}");
            None
        }
    }
}

/// Like [`try_render`], for render props that cannot return an error.
pub fn try_call<A, T, F>(code: Option<F>, args: A) -> Option<T>
where
    F: FnOnce(A) -> T,
{
    try_render(code.map(|code| move |args| Ok::<_, core::convert::Infallible>(code(args))), args)
}
