//! Fixed-capacity FIFO log.

use std::collections::VecDeque;

/// An append-only log that evicts its oldest entry once full.
///
/// Each entry carries the store-wide sequence number it was appended with, so
/// logs belonging to different applications can be merged back into arrival
/// order.
#[derive(Debug)]
pub(crate) struct BoundedLog<T> {
    entries: VecDeque<(u64, T)>,
    capacity: usize,
}

impl<T> BoundedLog<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append an entry, returning the evicted one when the log was full.
    pub(crate) fn push(&mut self, seq: u64, item: T) -> Option<T> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front().map(|(_, item)| item)
        } else {
            None
        };
        self.entries.push_back((seq, item));
        evicted
    }

    /// Entries oldest first.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, item)| item)
    }

    pub(crate) fn iter_sequenced(&self) -> impl Iterator<Item = (u64, &T)> {
        self.entries.iter().map(|(seq, item)| (*seq, item))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn evicts_oldest_first() {
        let mut log = BoundedLog::new(2);
        assert_eq!(log.push(0, "a"), None);
        assert_eq!(log.push(1, "b"), None);
        assert_eq!(log.push(2, "c"), Some("a"));
        assert_eq!(log.iter().copied().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    proptest! {
        #[test]
        fn keeps_most_recent_entries(capacity in 1usize..16, total in 0usize..64) {
            let mut log = BoundedLog::new(capacity);
            for i in 0..total {
                log.push(i as u64, i);
            }
            let expected: Vec<usize> = (total.saturating_sub(capacity)..total).collect();
            prop_assert_eq!(log.len(), total.min(capacity));
            prop_assert_eq!(log.iter().copied().collect::<Vec<_>>(), expected);
        }
    }
}
