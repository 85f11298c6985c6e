// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Collective operations across ranks.

## Architecture

```text
rank 0 ──┐
rank 1 ──┼── participate(Contribution) ──> every rank receives all contributions
rank 2 ──┘
```

[`Collective`] has a single required method. Everything else (gathers,
reductions, agreement) is built on top of it by [`Communicator`], which also
stamps each call with a sequence number. Ranks must call collectives in the
same order; a rank that sends a different operation or sequence number makes
the round fail on every rank instead of hanging.

There are no timeouts. A rank that never arrives blocks the others, except
for [`InProcessGroup`] handles, where dropping a handle breaks the group.
*/

use parking_lot::{Condvar, Mutex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Tag of a collective round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectiveOp {
    AllGather,
    ReduceSum,
    ReduceMin,
    ReduceMax,
    Agree,
    GatherCounts,
    GatherData,
}

/// One rank's input to a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub op: CollectiveOp,
    pub seq: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollectiveError {
    #[error("Mismatched participation: rank {rank} sent {found:?}#{found_seq}, expected {expected:?}#{expected_seq}")]
    Mismatch {
        rank: usize,
        expected: CollectiveOp,
        expected_seq: u64,
        found: CollectiveOp,
        found_seq: u64,
    },

    #[error("A participant left the group")]
    ParticipantLeft,

    #[error("Expected {expected} contributions, received {received}")]
    WrongSize { expected: usize, received: usize },

    #[error("Payload codec error: {0}")]
    Codec(String),
}

pub type CollectiveResult<T> = Result<T, CollectiveError>;

/// Message-passing substrate shared by all ranks
pub trait Collective: Send + Sync {
    fn rank(&self) -> usize;

    fn num_ranks(&self) -> usize;

    /// Contribute and block until every rank has; returns all contributions
    /// indexed by rank
    fn participate(&self, contribution: Contribution) -> CollectiveResult<Vec<Contribution>>;
}

/// Check that every rank took part in the same round
fn check_round(
    contributions: &[Contribution],
    op: CollectiveOp,
    seq: u64,
    expected_len: usize,
) -> CollectiveResult<()> {
    if contributions.len() != expected_len {
        return Err(CollectiveError::WrongSize {
            expected: expected_len,
            received: contributions.len(),
        });
    }
    for (rank, c) in contributions.iter().enumerate() {
        if c.op != op || c.seq != seq {
            return Err(CollectiveError::Mismatch {
                rank,
                expected: op,
                expected_seq: seq,
                found: c.op,
                found_seq: c.seq,
            });
        }
    }
    Ok(())
}

// ============================================================================
// Single process
// ============================================================================

/// The only rank of a one-rank run
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleProcess;

impl Collective for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn num_ranks(&self) -> usize {
        1
    }

    fn participate(&self, contribution: Contribution) -> CollectiveResult<Vec<Contribution>> {
        Ok(vec![contribution])
    }
}

// ============================================================================
// In-process group
// ============================================================================

struct RoundState {
    slots: Vec<Option<Contribution>>,
    arrived: usize,
    round: u64,
    results: Arc<Vec<Contribution>>,
    broken: bool,
}

struct Rendezvous {
    size: usize,
    state: Mutex<RoundState>,
    cv: Condvar,
}

/// N ranks as threads of one process
///
/// ```
/// use std::sync::Arc;
/// use synaptome_connectivity::collective::{Collective, InProcessGroup};
///
/// let handles = InProcessGroup::create(3);
/// assert_eq!(handles.len(), 3);
/// assert_eq!(handles[2].rank(), 2);
/// ```
pub struct InProcessGroup;

impl InProcessGroup {
    /// One handle per rank; move each into the thread running that rank
    pub fn create(num_ranks: usize) -> Vec<InProcessHandle> {
        let shared = Arc::new(Rendezvous {
            size: num_ranks,
            state: Mutex::new(RoundState {
                slots: vec![None; num_ranks],
                arrived: 0,
                round: 0,
                results: Arc::new(Vec::new()),
                broken: false,
            }),
            cv: Condvar::new(),
        });
        (0..num_ranks)
            .map(|rank| InProcessHandle {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

pub struct InProcessHandle {
    rank: usize,
    shared: Arc<Rendezvous>,
}

impl Collective for InProcessHandle {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_ranks(&self) -> usize {
        self.shared.size
    }

    fn participate(&self, contribution: Contribution) -> CollectiveResult<Vec<Contribution>> {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if state.broken {
            return Err(CollectiveError::ParticipantLeft);
        }

        let my_round = state.round;
        state.slots[self.rank] = Some(contribution);
        state.arrived += 1;

        if state.arrived == shared.size {
            let gathered: Vec<Contribution> = state.slots.iter_mut().filter_map(Option::take).collect();
            state.results = Arc::new(gathered);
            state.arrived = 0;
            state.round += 1;
            trace!(target: "synaptome-connectivity", "[COLLECTIVE] round {} complete", my_round);
            shared.cv.notify_all();
            return Ok(state.results.as_ref().clone());
        }

        // The next round cannot complete without this rank, so `results`
        // still holds this round's data once `round` has moved on.
        while state.round == my_round {
            if state.broken {
                return Err(CollectiveError::ParticipantLeft);
            }
            shared.cv.wait(&mut state);
        }
        Ok(state.results.as_ref().clone())
    }
}

impl Drop for InProcessHandle {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if !state.broken {
            debug!(target: "synaptome-connectivity", "[COLLECTIVE] rank {} left the group", self.rank);
        }
        state.broken = true;
        self.shared.cv.notify_all();
    }
}

// ============================================================================
// Typed helpers
// ============================================================================

fn encode<T: Serialize>(value: &T) -> CollectiveResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| CollectiveError::Codec(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CollectiveResult<T> {
    bincode::deserialize(bytes).map_err(|e| CollectiveError::Codec(e.to_string()))
}

/// Typed, sequence-numbered collectives over a [`Collective`]
pub struct Communicator {
    collective: Arc<dyn Collective>,
    seq: AtomicU64,
}

impl Communicator {
    pub fn new(collective: Arc<dyn Collective>) -> Self {
        Self {
            collective,
            seq: AtomicU64::new(0),
        }
    }

    pub fn rank(&self) -> usize {
        self.collective.rank()
    }

    pub fn num_ranks(&self) -> usize {
        self.collective.num_ranks()
    }

    /// Rounds completed or attempted so far
    pub fn sequence(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Raw round: every rank's payload, in rank order
    pub fn exchange(&self, op: CollectiveOp, payload: Vec<u8>) -> CollectiveResult<Vec<Vec<u8>>> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let contributions = self
            .collective
            .participate(Contribution { op, seq, payload })?;
        check_round(&contributions, op, seq, self.num_ranks())?;
        Ok(contributions.into_iter().map(|c| c.payload).collect())
    }

    /// Every rank's value, in rank order
    pub fn all_gather_as<T>(&self, op: CollectiveOp, value: &T) -> CollectiveResult<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        self.exchange(op, encode(value)?)?
            .iter()
            .map(|bytes| decode(bytes))
            .collect()
    }

    pub fn all_gather<T>(&self, value: &T) -> CollectiveResult<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        self.all_gather_as(CollectiveOp::AllGather, value)
    }

    pub fn all_reduce_sum(&self, value: u64) -> CollectiveResult<u64> {
        Ok(self
            .all_gather_as(CollectiveOp::ReduceSum, &value)?
            .into_iter()
            .sum())
    }

    pub fn all_reduce_min(&self, value: f64) -> CollectiveResult<f64> {
        Ok(self
            .all_gather_as(CollectiveOp::ReduceMin, &value)?
            .into_iter()
            .fold(f64::INFINITY, f64::min))
    }

    pub fn all_reduce_max(&self, value: f64) -> CollectiveResult<f64> {
        Ok(self
            .all_gather_as(CollectiveOp::ReduceMax, &value)?
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max))
    }

    /// Ranks that reported a failure, with their reasons in rank order;
    /// empty when all agree
    pub fn all_agree(&self, failure: Option<String>) -> CollectiveResult<Vec<(usize, String)>> {
        Ok(self
            .all_gather_as(CollectiveOp::Agree, &failure)?
            .into_iter()
            .enumerate()
            .filter_map(|(rank, failure)| failure.map(|reason| (rank, reason)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Run `f` once per rank on its own thread, results in rank order
    fn run_group<T, F>(num_ranks: usize, f: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(Communicator) -> T + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let workers: Vec<_> = InProcessGroup::create(num_ranks)
            .into_iter()
            .map(|handle| {
                let f = Arc::clone(&f);
                thread::spawn(move || f(Communicator::new(Arc::new(handle))))
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    }

    #[test]
    fn test_single_process_round_trip() {
        let comm = Communicator::new(Arc::new(SingleProcess));
        assert_eq!(comm.all_gather(&vec![1u32, 2]).unwrap(), vec![vec![1, 2]]);
        assert_eq!(comm.all_reduce_sum(7).unwrap(), 7);
        assert!(comm.all_agree(None).unwrap().is_empty());
        assert_eq!(comm.sequence(), 3);
    }

    #[test]
    fn test_group_gather_and_reduce() {
        let results = run_group(4, |comm| {
            let rank = comm.rank() as u64;
            let gathered = comm.all_gather(&rank).unwrap();
            let sum = comm.all_reduce_sum(rank + 1).unwrap();
            let min = comm.all_reduce_min(rank as f64 + 0.5).unwrap();
            let max = comm.all_reduce_max(rank as f64 + 0.5).unwrap();
            (gathered, sum, min, max)
        });
        for (gathered, sum, min, max) in results {
            assert_eq!(gathered, vec![0, 1, 2, 3]);
            assert_eq!(sum, 10);
            assert_eq!(min, 0.5);
            assert_eq!(max, 3.5);
        }
    }

    #[test]
    fn test_many_rounds_stay_in_step() {
        let results = run_group(3, |comm| {
            (0..200u64)
                .map(|round| comm.all_reduce_sum(round).unwrap())
                .sum::<u64>()
        });
        let expected: u64 = (0..200u64).map(|r| r * 3).sum();
        assert!(results.iter().all(|&total| total == expected));
    }

    #[test]
    fn test_agree_reports_dissenters() {
        let results = run_group(3, |comm| {
            let failure = (comm.rank() == 1).then(|| "bad delay".to_string());
            comm.all_agree(failure).unwrap()
        });
        assert!(results
            .iter()
            .all(|r| r == &vec![(1, "bad delay".to_string())]));
    }

    #[test]
    fn test_mismatched_operations_fail_everywhere() {
        let results = run_group(2, |comm| {
            if comm.rank() == 0 {
                comm.all_reduce_sum(1).map(|_| ())
            } else {
                comm.all_agree(None).map(|_| ())
            }
        });
        for result in results {
            assert!(matches!(result, Err(CollectiveError::Mismatch { .. })));
        }
    }

    #[test]
    fn test_dropped_participant_breaks_group() {
        let mut handles = InProcessGroup::create(2);
        let survivor = handles.remove(0);
        drop(handles);
        let comm = Communicator::new(Arc::new(survivor));
        assert_eq!(comm.all_reduce_sum(1), Err(CollectiveError::ParticipantLeft));
    }
}
