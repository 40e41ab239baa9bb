//! Merged set of stored byte spans for one cached resource.

use serde::{Deserialize, Serialize};

/// Sorted, non-overlapping, non-adjacent half-open spans `[start, end)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ByteRangeSet {
    spans: Vec<(u64, u64)>,
}

impl ByteRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn spans(&self) -> &[(u64, u64)] {
        &self.spans
    }

    /// Total number of stored bytes.
    pub fn total(&self) -> u64 {
        self.spans.iter().map(|(start, end)| end - start).sum()
    }

    /// Exclusive end of the highest stored span.
    pub fn max_end(&self) -> u64 {
        self.spans.last().map_or(0, |&(_, end)| end)
    }

    /// Bytes of `[start, end)` not yet stored.
    pub fn uncovered(&self, start: u64, end: u64) -> u64 {
        if end <= start {
            return 0;
        }
        let covered: u64 = self
            .spans
            .iter()
            .map(|&(s, e)| {
                let lo = s.max(start);
                let hi = e.min(end);
                hi.saturating_sub(lo)
            })
            .sum();
        (end - start) - covered
    }

    /// Adds `[start, end)`, merging overlapping and adjacent spans.
    ///
    /// Returns the number of newly stored bytes.
    pub fn insert(&mut self, start: u64, end: u64) -> u64 {
        if end <= start {
            return 0;
        }
        let added = self.uncovered(start, end);

        let mut merged = Vec::with_capacity(self.spans.len() + 1);
        let mut current = (start, end);
        let mut placed = false;

        for &(s, e) in &self.spans {
            if e < current.0 {
                merged.push((s, e));
            } else if s > current.1 {
                if !placed {
                    merged.push(current);
                    placed = true;
                }
                merged.push((s, e));
            } else {
                current = (current.0.min(s), current.1.max(e));
            }
        }
        if !placed {
            merged.push(current);
        }

        self.spans = merged;
        added
    }

    /// Length of the stored run starting exactly at `offset`.
    pub fn contiguous_from(&self, offset: u64) -> u64 {
        self.spans
            .iter()
            .find(|&&(s, e)| s <= offset && offset < e)
            .map_or(0, |&(_, e)| e - offset)
    }

    /// First unstored span inside `[start, end)`; `end == None` means unbounded.
    ///
    /// An unbounded gap is returned with `None` as its end.
    pub fn first_gap(&self, start: u64, end: Option<u64>) -> Option<(u64, Option<u64>)> {
        let mut pos = start;
        for &(s, e) in &self.spans {
            if e <= pos {
                continue;
            }
            if s > pos {
                let gap_end = end.map_or(s, |limit| s.min(limit));
                return (gap_end > pos).then_some((pos, Some(gap_end)));
            }
            pos = e;
            if end.is_some_and(|limit| pos >= limit) {
                return None;
            }
        }
        match end {
            Some(limit) if pos < limit => Some((pos, Some(limit))),
            Some(_) => None,
            None => Some((pos, None)),
        }
    }
}
