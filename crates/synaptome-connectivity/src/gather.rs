// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Distributed gather of connection views.

```text
Idle ──> CountExchange ──> DataExchange ──> Sorted
```

Every rank runs both exchanges, including ranks with no local matches, so
idle ranks never leave the others waiting. The count exchange also carries
each rank's connectivity generation: if the ranks disagree, some rank mutated
its graph out of step and the query fails on every rank.
*/

use crate::collective::{CollectiveOp, Communicator};
use crate::query::{sort_canonical, ConnectionView};
use crate::types::{ConnectError, ConnectResult};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherState {
    Idle,
    CountExchange,
    DataExchange,
    Sorted,
}

/// One gather; a finished gather cannot be rerun
pub struct DistributedGather<'a> {
    comm: &'a Communicator,
    generation: u64,
    state: GatherState,
}

impl<'a> DistributedGather<'a> {
    pub fn new(comm: &'a Communicator, generation: u64) -> Self {
        Self {
            comm,
            generation,
            state: GatherState::Idle,
        }
    }

    pub fn state(&self) -> GatherState {
        self.state
    }

    /// Pool every rank's `local` views into one canonically sorted sequence
    pub fn run(&mut self, local: Vec<ConnectionView>) -> ConnectResult<Vec<ConnectionView>> {
        if self.state != GatherState::Idle {
            return Err(ConnectError::CollectiveFailure(format!(
                "gather already in state {:?}",
                self.state
            )));
        }

        self.state = GatherState::CountExchange;
        let counts: Vec<(u64, u64)> = self.comm.all_gather_as(
            CollectiveOp::GatherCounts,
            &(self.generation, local.len() as u64),
        )?;
        if counts.iter().any(|&(generation, _)| generation != self.generation) {
            let generations: Vec<u64> = counts.iter().map(|&(g, _)| g).collect();
            return Err(ConnectError::CollectiveFailure(format!(
                "connectivity generations differ across ranks: {generations:?}"
            )));
        }
        let total: u64 = counts.iter().map(|&(_, n)| n).sum();

        self.state = GatherState::DataExchange;
        let parts: Vec<Vec<ConnectionView>> = self
            .comm
            .all_gather_as(CollectiveOp::GatherData, &local)?;
        let mut pooled: Vec<ConnectionView> = parts.into_iter().flatten().collect();
        if pooled.len() as u64 != total {
            return Err(ConnectError::CollectiveFailure(format!(
                "gathered {} connections, ranks announced {}",
                pooled.len(),
                total
            )));
        }

        sort_canonical(&mut pooled);
        self.state = GatherState::Sorted;
        debug!(
            target: "synaptome-connectivity",
            "[GATHER] rank {} pooled {} connections from {} ranks",
            self.comm.rank(),
            total,
            counts.len()
        );
        Ok(pooled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collective::{InProcessGroup, SingleProcess};
    use std::sync::Arc;
    use std::thread;
    use synaptome_runtime::{CreationIndex, SynapseModelId};
    use synaptome_structures::NodeId;

    fn view(source: u64, target: u64, ordinal: u64, rank: u32) -> ConnectionView {
        ConnectionView {
            source: NodeId(source),
            target: NodeId(target),
            synapse_model: SynapseModelId(0),
            weight: 1.0,
            delay: 1.0,
            creation: CreationIndex { call: 0, ordinal },
            rank,
            thread: 0,
            local_index: 0,
        }
    }

    #[test]
    fn test_single_rank_sorts() {
        let comm = Communicator::new(Arc::new(SingleProcess));
        let mut gather = DistributedGather::new(&comm, 0);
        let out = gather
            .run(vec![view(3, 1, 0, 0), view(1, 2, 1, 0), view(1, 1, 2, 0)])
            .unwrap();
        let pairs: Vec<(u64, u64)> = out.iter().map(|v| (v.source.0, v.target.0)).collect();
        assert_eq!(pairs, vec![(1, 1), (1, 2), (3, 1)]);
        assert_eq!(gather.state(), GatherState::Sorted);
        assert!(gather.run(Vec::new()).is_err());
    }

    #[test]
    fn test_empty_ranks_still_complete() {
        let workers: Vec<_> = InProcessGroup::create(4)
            .into_iter()
            .map(|handle| {
                thread::spawn(move || {
                    let comm = Communicator::new(Arc::new(handle));
                    let rank = comm.rank() as u32;
                    let local = match rank {
                        1 => vec![view(1, 1, 0, rank)],
                        2 => vec![view(2, 2, 1, rank)],
                        _ => Vec::new(),
                    };
                    DistributedGather::new(&comm, 5).run(local).unwrap()
                })
            })
            .collect();
        for worker in workers {
            let pooled = worker.join().unwrap();
            assert_eq!(pooled.len(), 2);
            assert_eq!(pooled[0].source, NodeId(1));
            assert_eq!(pooled[1].source, NodeId(2));
        }
    }

    #[test]
    fn test_generation_mismatch_fails_everywhere() {
        let workers: Vec<_> = InProcessGroup::create(2)
            .into_iter()
            .map(|handle| {
                thread::spawn(move || {
                    let comm = Communicator::new(Arc::new(handle));
                    let generation = comm.rank() as u64;
                    DistributedGather::new(&comm, generation).run(Vec::new())
                })
            })
            .collect();
        for worker in workers {
            assert!(matches!(
                worker.join().unwrap(),
                Err(ConnectError::CollectiveFailure(_))
            ));
        }
    }
}
