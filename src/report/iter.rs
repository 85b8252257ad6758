use core::iter::FusedIterator;

use crate::report::Report;

/// An iterator over the ancestors of a report, nearest parent first.
///
/// This iterator yields `&Report` items by following the parent
/// back-references. The report the iterator was created from is not included.
#[must_use]
pub struct Ancestors<'a> {
    next: Option<&'a Report>,
}

impl<'a> Ancestors<'a> {
    /// Creates a new [`Ancestors`] starting at the parent of `report`.
    pub(crate) fn new(report: &'a Report) -> Self {
        Self {
            next: report.parent(),
        }
    }
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Report;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = cur.parent();
        Some(cur)
    }
}

impl FusedIterator for Ancestors<'_> {}
