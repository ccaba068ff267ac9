// ==============================================================================
// coverage.rs - Depth of Coverage Analysis
// ==============================================================================
// Description: Dense per-position depth arrays, summary statistics and
//              run-length encoded low/zero coverage regions
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

use crate::models::CoverageRecord;

/// Half-open `[start, end)` interval of constant depth (0-based, BED style)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthInterval {
    pub start: usize,
    pub end: usize,
    pub depth: u32,
}

/// Expand depth intervals into a dense per-position array
///
/// The array length is the largest interval end. Intervals are expected to
/// be non-overlapping; positions not covered by any interval stay at 0.
///
/// # Example
/// ```
/// use viral_report::coverage::{depth_array, DepthInterval};
///
/// let intervals = [
///     DepthInterval { start: 0, end: 3, depth: 1 },
///     DepthInterval { start: 3, end: 6, depth: 2 },
///     DepthInterval { start: 6, end: 10, depth: 3 },
/// ];
/// assert_eq!(depth_array(&intervals), vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 3]);
/// ```
pub fn depth_array(intervals: &[DepthInterval]) -> Vec<u32> {
    let length = intervals.iter().map(|i| i.end).max().unwrap_or(0);
    let mut depths = vec![0u32; length];
    for interval in intervals {
        let start = interval.start.min(interval.end);
        depths[start..interval.end].fill(interval.depth);
    }
    depths
}

/// Positions selected by `threshold`: exactly zero when `threshold == 0`,
/// otherwise strictly below `threshold`
fn below(depth: u32, threshold: u32) -> bool {
    if threshold == 0 {
        depth == 0
    } else {
        depth < threshold
    }
}

/// Run-length encode the positions below `threshold` as 1-based ranges
///
/// Singleton runs render as `"N"`, longer runs as `"START-END"`, joined
/// with `"; "`.
pub fn interval_coords(depths: &[u32], threshold: u32) -> String {
    let mut runs: Vec<(usize, usize)> = Vec::new();

    for (idx, &depth) in depths.iter().enumerate() {
        if !below(depth, threshold) {
            continue;
        }
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == idx => *end = idx,
            _ => runs.push((idx, idx)),
        }
    }

    runs.iter()
        .map(|&(start, end)| {
            if start == end {
                format!("{}", start + 1)
            } else {
                format!("{}-{}", start + 1, end + 1)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fraction of positions with depth at or above `low_coverage_threshold`
pub fn genome_coverage(depths: &[u32], low_coverage_threshold: u32) -> f64 {
    if depths.is_empty() {
        return 0.0;
    }
    let n_low = depths.iter().filter(|&&d| d < low_coverage_threshold).count();
    1.0 - (n_low as f64 / depths.len() as f64)
}

pub fn mean_depth(depths: &[u32]) -> f64 {
    if depths.is_empty() {
        return 0.0;
    }
    depths.iter().map(|&d| d as f64).sum::<f64>() / depths.len() as f64
}

/// Median depth; even-length arrays average the two middle values
pub fn median_depth(depths: &[u32]) -> f64 {
    if depths.is_empty() {
        return 0.0;
    }
    let mut sorted = depths.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    } else {
        sorted[mid] as f64
    }
}

impl CoverageRecord {
    /// Summarise a dense depth array for `sample`
    ///
    /// The median is truncated to an integer depth.
    pub fn from_depths(sample: impl Into<String>, depths: &[u32], low_coverage_threshold: u32) -> Self {
        Self {
            sample: sample.into(),
            n_zero_coverage: depths.iter().filter(|&&d| d == 0).count(),
            zero_coverage_coords: interval_coords(depths, 0),
            low_coverage_threshold,
            n_low_coverage: depths.iter().filter(|&&d| d < low_coverage_threshold).count(),
            low_coverage_coords: interval_coords(depths, low_coverage_threshold),
            genome_coverage: genome_coverage(depths, low_coverage_threshold),
            mean_coverage: mean_depth(depths),
            median_coverage: median_depth(depths).trunc() as u64,
            ref_seq_length: depths.len(),
        }
    }
}
