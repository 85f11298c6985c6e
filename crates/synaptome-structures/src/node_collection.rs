// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Node collections.

A [`NodeCollection`] is an ordered set of node identifiers kept in canonical
form: sorted, non-overlapping inclusive ranges with adjacent ranges merged.
A collection made of a single range is `Primitive`, anything else is
`Composite` (the empty collection is an empty `Composite`).

Collections are immutable; slicing and set algebra return new collections.
Equality compares members, never the history of how a collection was built.
*/

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::{NodeId, StructuresError, StructuresResult, VirtualProcessMap};

/// Inclusive range of identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRange {
    first: NodeId,
    last: NodeId,
}

impl NodeRange {
    pub fn new(first: u64, last: u64) -> StructuresResult<Self> {
        if first == 0 {
            return Err(StructuresError::UnknownNode(0));
        }
        if first > last {
            return Err(StructuresError::BadParameters(format!(
                "range start {} after end {}",
                first, last
            )));
        }
        Ok(Self {
            first: NodeId(first),
            last: NodeId(last),
        })
    }

    #[inline]
    pub fn first(&self) -> NodeId {
        self.first
    }

    #[inline]
    pub fn last(&self) -> NodeId {
        self.last
    }

    #[inline]
    pub fn len(&self) -> usize {
        (self.last.0 - self.first.0 + 1) as usize
    }

    /// Ranges always hold at least one node
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.first <= id && id <= self.last
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> {
        (self.first.0..=self.last.0).map(NodeId)
    }
}

/// Ordered set of node identifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeCollection {
    Primitive(NodeRange),
    Composite(Vec<NodeRange>),
}

impl NodeCollection {
    pub fn empty() -> Self {
        NodeCollection::Composite(Vec::new())
    }

    /// Primitive collection `first..=last`
    pub fn from_range(first: u64, last: u64) -> StructuresResult<Self> {
        Ok(NodeCollection::Primitive(NodeRange::new(first, last)?))
    }

    /// Canonical collection from identifiers in any order, duplicates allowed
    pub fn from_ids<I>(ids: I) -> StructuresResult<Self>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut raw: Vec<u64> = ids.into_iter().map(|id| id.0).collect();
        if raw.contains(&0) {
            return Err(StructuresError::UnknownNode(0));
        }
        raw.sort_unstable();
        raw.dedup();
        Ok(Self::from_sorted_unique(raw.into_iter()))
    }

    /// Canonical collection from ranges in any order, overlaps allowed
    pub fn from_ranges(mut ranges: Vec<NodeRange>) -> Self {
        ranges.sort_unstable_by_key(|r| r.first);
        let mut merged: Vec<NodeRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(prev) if range.first.0 <= prev.last.0.saturating_add(1) => {
                    if range.last > prev.last {
                        prev.last = range.last;
                    }
                }
                _ => merged.push(range),
            }
        }
        Self::from_canonical(merged)
    }

    fn from_sorted_unique(ids: impl Iterator<Item = u64>) -> Self {
        let mut ranges: Vec<NodeRange> = Vec::new();
        for raw in ids {
            match ranges.last_mut() {
                Some(prev) if prev.last.0.checked_add(1) == Some(raw) => prev.last = NodeId(raw),
                _ => ranges.push(NodeRange {
                    first: NodeId(raw),
                    last: NodeId(raw),
                }),
            }
        }
        Self::from_canonical(ranges)
    }

    fn from_canonical(mut ranges: Vec<NodeRange>) -> Self {
        if ranges.len() == 1 {
            NodeCollection::Primitive(ranges.remove(0))
        } else {
            NodeCollection::Composite(ranges)
        }
    }

    /// Canonical ranges in ascending order
    pub fn ranges(&self) -> &[NodeRange] {
        match self {
            NodeCollection::Primitive(range) => std::slice::from_ref(range),
            NodeCollection::Composite(ranges) => ranges,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, NodeCollection::Primitive(_))
    }

    pub fn len(&self) -> usize {
        self.ranges().iter().map(NodeRange::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges().is_empty()
    }

    pub fn first(&self) -> Option<NodeId> {
        self.ranges().first().map(|r| r.first)
    }

    pub fn last(&self) -> Option<NodeId> {
        self.ranges().last().map(|r| r.last)
    }

    /// Members in ascending (logical) order
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ranges().iter().flat_map(NodeRange::iter)
    }

    /// Member at logical position `index`
    pub fn get(&self, index: usize) -> Option<NodeId> {
        let mut offset = index;
        for range in self.ranges() {
            if offset < range.len() {
                return Some(NodeId(range.first.0 + offset as u64));
            }
            offset -= range.len();
        }
        None
    }

    /// Logical position of `id`
    pub fn position(&self, id: NodeId) -> Option<usize> {
        let ranges = self.ranges();
        let idx = ranges.partition_point(|r| r.last < id);
        let range = ranges.get(idx)?;
        if !range.contains(id) {
            return None;
        }
        let before: usize = ranges[..idx].iter().map(NodeRange::len).sum();
        Some(before + (id.0 - range.first.0) as usize)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        let ranges = self.ranges();
        let idx = ranges.partition_point(|r| r.last < id);
        ranges.get(idx).is_some_and(|r| r.contains(id))
    }

    /// Members at logical positions `start, start + step, ...` below `stop`
    pub fn slice(&self, start: usize, stop: usize, step: usize) -> StructuresResult<Self> {
        if step == 0 {
            return Err(StructuresError::BadParameters(
                "slice step must be positive".to_string(),
            ));
        }
        let len = self.len();
        if stop > len {
            return Err(StructuresError::IndexOutOfRange { index: stop, len });
        }
        if start > stop {
            return Err(StructuresError::IndexOutOfRange { index: start, len });
        }

        let count = (stop - start).div_ceil(step);
        Ok(Self::from_sorted_unique(
            self.iter().skip(start).step_by(step).take(count).map(|id| id.0),
        ))
    }

    pub fn union(&self, other: &NodeCollection) -> Self {
        let mut ranges = self.ranges().to_vec();
        ranges.extend_from_slice(other.ranges());
        Self::from_ranges(ranges)
    }

    pub fn intersection(&self, other: &NodeCollection) -> Self {
        let (a, b) = (self.ranges(), other.ranges());
        let (mut i, mut j) = (0, 0);
        let mut out = Vec::new();
        while i < a.len() && j < b.len() {
            let first = a[i].first.max(b[j].first);
            let last = a[i].last.min(b[j].last);
            if first <= last {
                out.push(NodeRange { first, last });
            }
            if a[i].last < b[j].last {
                i += 1;
            } else {
                j += 1;
            }
        }
        // Pieces are disjoint and ordered but may touch
        Self::from_ranges(out)
    }

    /// Members of `self` not in `other`
    pub fn difference(&self, other: &NodeCollection) -> Self {
        let removed = other.ranges();
        let mut out = Vec::new();
        for range in self.ranges() {
            // First id not yet covered; `None` once a cut reaches u64::MAX
            let mut cursor = Some(range.first.0);
            let start = removed.partition_point(|r| r.last < range.first);
            for cut in &removed[start..] {
                let Some(next) = cursor else { break };
                if cut.first > range.last {
                    break;
                }
                if cut.first.0 > next {
                    out.push(NodeRange {
                        first: NodeId(next),
                        last: NodeId(cut.first.0 - 1),
                    });
                }
                cursor = cut.last.0.checked_add(1).map(|after| after.max(next));
            }
            if let Some(next) = cursor.filter(|&next| next <= range.last.0) {
                out.push(NodeRange {
                    first: NodeId(next),
                    last: range.last,
                });
            }
        }
        Self::from_canonical(out)
    }

    /// Members owned by `rank`
    pub fn local_only(&self, vp_map: &VirtualProcessMap, rank: usize) -> Self {
        Self::from_sorted_unique(
            self.iter()
                .filter(|&id| vp_map.is_local(id, rank))
                .map(|id| id.0),
        )
    }

    /// Members owned by one thread of one rank
    pub fn thread_local(&self, vp_map: &VirtualProcessMap, rank: usize, thread: usize) -> Self {
        Self::from_sorted_unique(
            self.iter()
                .filter(|&id| vp_map.is_thread_local(id, rank, thread))
                .map(|id| id.0),
        )
    }

    /// Whether the two collections share at least one member
    pub fn overlaps(&self, other: &NodeCollection) -> bool {
        !self.intersection(other).is_empty()
    }
}

impl PartialEq for NodeCollection {
    fn eq(&self, other: &Self) -> bool {
        self.ranges() == other.ranges()
    }
}

impl Eq for NodeCollection {}

impl Hash for NodeCollection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ranges().hash(state);
    }
}

impl Display for NodeCollection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeCollection(")?;
        for (i, range) in self.ranges().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if range.first == range.last {
                write!(f, "{}", range.first)?;
            } else {
                write!(f, "{}..={}", range.first, range.last)?;
            }
        }
        write!(f, ")")
    }
}

impl TryFrom<Vec<u64>> for NodeCollection {
    type Error = StructuresError;

    fn try_from(ids: Vec<u64>) -> StructuresResult<Self> {
        Self::from_ids(ids.into_iter().map(NodeId))
    }
}
