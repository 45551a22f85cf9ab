//! Dirty-range tracking for partial GPU re-upload

use crate::core::BufferIndex;

/// Half-open range of buffer elements `[start, end)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateRange {
    pub start: BufferIndex,
    pub end: BufferIndex,
}

impl UpdateRange {
    pub fn new(start: BufferIndex, end: BufferIndex) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Sorted, disjoint set of modified ranges.
///
/// Overlapping and touching ranges coalesce on insert, so the set never
/// holds more entries than there are separate modified regions.
#[derive(Clone, Debug, Default)]
pub struct DirtyRanges {
    ranges: Vec<UpdateRange>,
}

impl DirtyRanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `[start, end)` as modified
    pub fn insert(&mut self, start: BufferIndex, end: BufferIndex) {
        if end <= start {
            return;
        }

        // First range that could touch the new one, and one past the last
        let first = self.ranges.partition_point(|r| r.end < start);
        let last = self.ranges.partition_point(|r| r.start <= end);

        let mut merged = UpdateRange::new(start, end);
        if first < last {
            merged.start = merged.start.min(self.ranges[first].start);
            merged.end = merged.end.max(self.ranges[last - 1].end);
        }
        self.ranges.splice(first..last, std::iter::once(merged));
    }

    /// Record a single element as modified
    pub fn insert_one(&mut self, index: BufferIndex) {
        self.insert(index, index + 1);
    }

    pub fn ranges(&self) -> &[UpdateRange] {
        &self.ranges
    }

    /// Total number of elements covered
    pub fn element_count(&self) -> u32 {
        self.ranges.iter().map(UpdateRange::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}
