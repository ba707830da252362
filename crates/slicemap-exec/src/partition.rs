//! Partition plans for parallel column mapping
//!
//! A plan splits a column range into contiguous, non-overlapping ranges, one
//! per worker. Sizes differ by at most one column and no range is empty. The
//! plan is computed once before any worker starts and never re-balanced.

use std::ops::Range;

use slicemap_core::{SliceMapError, SliceMapResult};

/// Read-only assignment of column ranges to workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    ranges: Vec<Range<usize>>,
}

impl PartitionPlan {
    /// Split `columns` into at most `workers` contiguous ranges
    ///
    /// # Examples
    ///
    /// ```
    /// use slicemap_exec::PartitionPlan;
    ///
    /// let plan = PartitionPlan::new(0..10, 3).unwrap();
    /// assert_eq!(plan.ranges(), &[0..4, 4..7, 7..10]);
    /// ```
    pub fn new(columns: Range<usize>, workers: usize) -> SliceMapResult<Self> {
        if workers == 0 {
            return Err(SliceMapError::invalid("worker count must be at least 1"));
        }

        let total = columns.len();
        let parts = workers.min(total);
        let mut ranges = Vec::with_capacity(parts);
        if parts == 0 {
            return Ok(Self { ranges });
        }

        let base = total / parts;
        let extra = total % parts;
        let mut start = columns.start;
        for part in 0..parts {
            let len = base + usize::from(part < extra);
            ranges.push(start..start + len);
            start += len;
        }

        Ok(Self { ranges })
    }

    /// Column range of every worker, in worker order
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Number of workers that receive columns
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if the plan assigns no columns
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Index of the worker owning `column`
    pub fn worker_of(&self, column: usize) -> Option<usize> {
        self.ranges.iter().position(|range| range.contains(&column))
    }
}
