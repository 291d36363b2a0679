//! Filled-range bookkeeping for the window.

/// Half-open interval `[start, end)` of stream offsets that has been written
/// but not yet consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FilledRange {
    pub start: u64,
    pub end:   u64,
}

/// Ranges kept sorted by descending `start`, so the smallest start sits at the
/// tail and can be peeked or popped in constant time.
///
/// Overlapping and adjacent ranges are never merged.
#[derive(Debug, Default)]
pub(crate) struct RangeTracker {
    ranges: Vec<FilledRange>,
}

impl RangeTracker {
    pub fn new() -> Self { Self::default() }

    /// Track `[start, end)`. Empty intervals are dropped and reported as `false`.
    pub fn insert(&mut self, start: u64, end: u64) -> bool {
        if start >= end {
            return false;
        }

        self.ranges.push(FilledRange { start, end });

        // Walk the new entry towards the front until its left neighbour starts
        // at or after it.
        let mut i = self.ranges.len() - 1;
        while i > 0 && self.ranges[i - 1].start < self.ranges[i].start {
            self.ranges.swap(i - 1, i);
            i -= 1;
        }
        true
    }

    pub fn peek_min(&self) -> Option<FilledRange> { self.ranges.last().copied() }

    pub fn pop_min(&mut self) -> Option<FilledRange> { self.ranges.pop() }

    pub fn len(&self) -> usize { self.ranges.len() }

    pub fn is_empty(&self) -> bool { self.ranges.is_empty() }
}
