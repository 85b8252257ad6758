//! Buffering of reports while no inspector is attached.
//!
//! Reports sent while no inspector is reachable are queued in arrival order
//! and delivered, in that same order, the next time one is. A [`RetryTimer`]
//! polls for the inspector in between; the queue is drained and the timer
//! stopped by whichever comes first, the next tick with an inspector present
//! or the next send.
//!
//! Draining takes the whole queue out before delivering anything, so reports
//! queued while a flush is in progress land in a fresh queue and are neither
//! lost nor delivered twice.
//!
//! # Bound
//!
//! The queue keeps at most
//! [`buffer_capacity`](crate::config::InstrumentationConfig::buffer_capacity)
//! entries; past that the oldest entry is evicted. With no capacity the queue
//! grows for as long as no inspector appears.

mod retry;

use std::collections::VecDeque;

pub use self::retry::RetryTimer;
use crate::report::Report;

/// A report waiting for an inspector.
#[derive(Clone, Debug)]
pub struct BufferedReport {
    /// Composite delivery key.
    pub key: String,
    /// The report, shared with whoever built it.
    pub report: Report,
    /// Host-internal id, passed through to the inspector.
    pub internal_id: Option<String>,
}

/// FIFO queue of undelivered reports.
#[derive(Debug, Default)]
pub struct DeliveryBuffer {
    entries: VecDeque<BufferedReport>,
    capacity: Option<usize>,
    evicted: u64,
}

impl DeliveryBuffer {
    /// Creates an empty buffer holding at most `capacity` entries.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            evicted: 0,
        }
    }

    /// Appends an entry, returning the entry evicted to make room, if any.
    pub fn push(&mut self, entry: BufferedReport) -> Option<BufferedReport> {
        self.entries.push_back(entry);
        match self.capacity {
            Some(capacity) if self.entries.len() > capacity => {
                self.evicted += 1;
                self.entries.pop_front()
            }
            _ => None,
        }
    }

    /// Removes and returns every entry, oldest first.
    pub fn take(&mut self) -> VecDeque<BufferedReport> {
        core::mem::take(&mut self.entries)
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of entries evicted over the buffer's lifetime.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Iterates over the queued entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &BufferedReport> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str) -> BufferedReport {
        BufferedReport {
            key: key.to_owned(),
            report: Report::own("x", None, None, None),
            internal_id: None,
        }
    }

    fn keys(buffer: &DeliveryBuffer) -> Vec<&str> {
        buffer.iter().map(|entry| entry.key.as_str()).collect()
    }

    #[test]
    fn test_fifo_take() {
        let mut buffer = DeliveryBuffer::new(None);
        for key in ["1#a#", "1#b#", "2#c#"] {
            assert!(buffer.push(entry(key)).is_none());
        }

        let taken: Vec<String> = buffer.take().into_iter().map(|entry| entry.key).collect();
        assert_eq!(taken, ["1#a#", "1#b#", "2#c#"]);
        assert!(buffer.is_empty());
        assert!(buffer.take().is_empty());
    }

    #[test]
    fn test_drop_oldest_past_capacity() {
        let mut buffer = DeliveryBuffer::new(Some(2));
        buffer.push(entry("1#a#"));
        buffer.push(entry("1#b#"));
        let evicted = buffer.push(entry("1#c#")).unwrap();

        assert_eq!(evicted.key, "1#a#");
        assert_eq!(keys(&buffer), ["1#b#", "1#c#"]);
        assert_eq!(buffer.evicted(), 1);
    }
}
