use super::SharedSink;

/// A lock-protected, optionally empty sink handle.
///
/// Readers clone the [`SharedSink`] out and release the lock before calling
/// into it, so a sink may re-enter the instrumentation context.
#[repr(transparent)]
pub(crate) struct SinkSlot(spin::RwLock<Option<SharedSink>>);

impl SinkSlot {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self(spin::RwLock::new(None))
    }

    #[inline]
    pub(crate) fn get(&self) -> Option<SharedSink> {
        self.0.read().clone()
    }

    #[inline]
    pub(crate) fn is_set(&self) -> bool {
        self.0.read().is_some()
    }

    /// Stores `sink` only if the slot is empty, handing it back otherwise.
    pub(crate) fn install(&self, sink: SharedSink) -> Result<(), SharedSink> {
        let mut guard = self.0.write();
        if guard.is_some() {
            return Err(sink);
        }
        *guard = Some(sink);
        Ok(())
    }

    #[inline]
    pub(crate) fn replace(&self, sink: Option<SharedSink>) -> Option<SharedSink> {
        core::mem::replace(&mut *self.0.write(), sink)
    }
}
