// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Virtual process mapping.

Every node is owned by exactly one virtual process (VP), i.e. one
(rank, thread) pair. The mapping is round-robin over the global identifier
space:

```text
vp     = id mod V
rank   = vp div threads_per_rank
thread = vp mod threads_per_rank
```

It is a pure function of the identifier and the partition shape, so all ranks
compute it without communication.
*/

use serde::{Deserialize, Serialize};

use crate::{NodeId, StructuresError, StructuresResult};

/// Placement of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VpAssignment {
    pub vp: usize,
    pub rank: usize,
    pub thread: usize,
    /// Number of nodes on the same VP with a smaller identifier
    pub local_index: u64,
}

/// Deterministic node → (rank, thread, local slot) mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualProcessMap {
    num_ranks: usize,
    threads_per_rank: usize,
}

impl VirtualProcessMap {
    pub fn new(num_ranks: usize, threads_per_rank: usize) -> StructuresResult<Self> {
        if num_ranks == 0 || threads_per_rank == 0 {
            return Err(StructuresError::BadParameters(format!(
                "partition needs at least one rank and one thread (got {} x {})",
                num_ranks, threads_per_rank
            )));
        }
        Ok(Self {
            num_ranks,
            threads_per_rank,
        })
    }

    #[inline]
    pub fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    #[inline]
    pub fn threads_per_rank(&self) -> usize {
        self.threads_per_rank
    }

    #[inline]
    pub fn total_vps(&self) -> usize {
        self.num_ranks * self.threads_per_rank
    }

    #[inline]
    pub fn vp_of(&self, id: NodeId) -> usize {
        (id.0 % self.total_vps() as u64) as usize
    }

    #[inline]
    pub fn rank_of(&self, id: NodeId) -> usize {
        self.vp_of(id) / self.threads_per_rank
    }

    #[inline]
    pub fn thread_of(&self, id: NodeId) -> usize {
        self.vp_of(id) % self.threads_per_rank
    }

    /// VP index of a (rank, thread) pair
    #[inline]
    pub fn vp_for(&self, rank: usize, thread: usize) -> usize {
        rank * self.threads_per_rank + thread
    }

    /// Full placement of `id`
    pub fn assign(&self, id: NodeId) -> VpAssignment {
        let total = self.total_vps() as u64;
        let vp = (id.0 % total) as usize;
        let quotient = id.0 / total;
        // Identifiers start at 1, so residue 0 has no member at position 0
        let local_index = if vp == 0 {
            quotient.saturating_sub(1)
        } else {
            quotient
        };

        VpAssignment {
            vp,
            rank: vp / self.threads_per_rank,
            thread: vp % self.threads_per_rank,
            local_index,
        }
    }

    #[inline]
    pub fn is_local(&self, id: NodeId, rank: usize) -> bool {
        self.rank_of(id) == rank
    }

    #[inline]
    pub fn is_thread_local(&self, id: NodeId, rank: usize, thread: usize) -> bool {
        self.vp_of(id) == self.vp_for(rank, thread)
    }

    /// Ascending identifiers in `1..=max_id` owned by `vp`
    pub fn nodes_on_vp(&self, vp: usize, max_id: u64) -> impl Iterator<Item = NodeId> {
        let total = self.total_vps() as u64;
        let first = if vp == 0 { total } else { vp as u64 };
        let valid = vp < self.total_vps();
        (0..)
            .map(move |k| first + k * total)
            .take_while(move |&raw| valid && raw <= max_id)
            .map(NodeId)
    }
}
