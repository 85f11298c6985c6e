// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-thread connection arena
//!
//! Structure-of-arrays storage with a validity mask. Disconnecting clears the
//! mask bit and leaves the slot in place, so indices handed out earlier stay
//! meaningful and enumeration order is stable.

use crate::connection::{Connection, ConnectionId, CreationIndex, NewConnection, SynapseModelId};
use crate::error::{RuntimeError, RuntimeResult};
use crate::traits::ConnectionStorage;
use ahash::AHashMap;
use synaptome_structures::NodeId;
use tracing::trace;

/// Connections whose targets are owned by one worker thread
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    thread: usize,

    /// Slots used, tombstones included
    count: usize,

    /// Live slots
    live: usize,

    sources: Vec<NodeId>,
    targets: Vec<NodeId>,
    synapse_models: Vec<SynapseModelId>,
    weights: Vec<f64>,
    delays: Vec<f64>,
    creation: Vec<CreationIndex>,

    /// Valid connection mask
    valid_mask: Vec<bool>,

    /// (source, target) -> slots, for point lookup
    pair_index: AHashMap<(NodeId, NodeId), Vec<usize>>,
}

impl ConnectionRegistry {
    /// Create an empty registry for `thread` with room for `capacity` connections
    pub fn new(thread: usize, capacity: usize) -> Self {
        Self {
            thread,
            count: 0,
            live: 0,
            sources: Vec::with_capacity(capacity),
            targets: Vec::with_capacity(capacity),
            synapse_models: Vec::with_capacity(capacity),
            weights: Vec::with_capacity(capacity),
            delays: Vec::with_capacity(capacity),
            creation: Vec::with_capacity(capacity),
            valid_mask: Vec::with_capacity(capacity),
            pair_index: AHashMap::new(),
        }
    }

    fn check_index(&self, index: usize) -> RuntimeResult<()> {
        if index >= self.count {
            return Err(RuntimeError::InvalidIndex {
                index,
                count: self.count,
            });
        }
        if !self.valid_mask[index] {
            return Err(RuntimeError::Tombstoned(index));
        }
        Ok(())
    }

    fn record(&self, index: usize) -> Connection {
        Connection {
            source: self.sources[index],
            target: self.targets[index],
            synapse_model: self.synapse_models[index],
            weight: self.weights[index],
            delay: self.delays[index],
            id: ConnectionId {
                thread: self.thread as u32,
                index: index as u32,
            },
            creation: self.creation[index],
        }
    }

    /// Live connections from `source` to `target`, optionally of one model
    pub fn find(
        &self,
        source: NodeId,
        target: NodeId,
        synapse_model: Option<SynapseModelId>,
    ) -> impl Iterator<Item = Connection> + '_ {
        self.pair_index
            .get(&(source, target))
            .into_iter()
            .flatten()
            .copied()
            .filter(move |&idx| {
                self.valid_mask[idx]
                    && synapse_model.map_or(true, |m| self.synapse_models[idx] == m)
            })
            .map(move |idx| self.record(idx))
    }

    /// Whether at least one live connection `source -> target` exists
    pub fn contains_pair(&self, source: NodeId, target: NodeId) -> bool {
        self.find(source, target, None).next().is_some()
    }

    /// Tombstone every live `source -> target` connection of `synapse_model`
    pub fn disconnect_pair(
        &mut self,
        source: NodeId,
        target: NodeId,
        synapse_model: SynapseModelId,
    ) -> usize {
        let Some(slots) = self.pair_index.get(&(source, target)) else {
            return 0;
        };
        let mut removed = 0;
        for &idx in slots {
            if self.valid_mask[idx] && self.synapse_models[idx] == synapse_model {
                self.valid_mask[idx] = false;
                removed += 1;
            }
        }
        self.live -= removed;
        if removed > 0 {
            trace!(
                target: "synaptome-runtime",
                "[REGISTRY] thread {} removed {} connection(s) {} -> {}",
                self.thread, removed, source, target
            );
        }
        removed
    }

    /// Tombstone every live connection matching `predicate`
    pub fn disconnect<P>(&mut self, predicate: P) -> usize
    where
        P: Fn(&Connection) -> bool,
    {
        let removed = self.disconnect_where(predicate);
        trace!(
            target: "synaptome-runtime",
            "[REGISTRY] thread {} removed {} connection(s)",
            self.thread, removed
        );
        removed
    }

    /// Lazily enumerate live connections matching `predicate`, in slot order
    ///
    /// Borrowing `self` keeps the arena frozen while the iterator lives.
    pub fn enumerate<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = Connection> + 'a
    where
        P: Fn(&Connection) -> bool + 'a,
    {
        (0..self.count)
            .filter(move |&idx| self.valid_mask[idx])
            .map(move |idx| self.record(idx))
            .filter(move |c| predicate(c))
    }

    /// All live connections in slot order
    pub fn iter(&self) -> impl Iterator<Item = Connection> + '_ {
        self.enumerate(|_| true)
    }

    /// Smallest and largest delay among live connections
    pub fn local_delay_extrema(&self) -> Option<(f64, f64)> {
        (0..self.count)
            .filter(|&idx| self.valid_mask[idx])
            .map(|idx| self.delays[idx])
            .fold(None, |acc, d| match acc {
                None => Some((d, d)),
                Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
            })
    }

    /// Live connections per synapse model
    pub fn counts_by_model(&self) -> AHashMap<SynapseModelId, usize> {
        let mut counts = AHashMap::new();
        for idx in (0..self.count).filter(|&idx| self.valid_mask[idx]) {
            *counts.entry(self.synapse_models[idx]).or_insert(0) += 1;
        }
        counts
    }

    /// Approximate heap footprint in bytes
    pub fn memory_usage(&self) -> usize {
        let per_slot = std::mem::size_of::<NodeId>() * 2
            + std::mem::size_of::<SynapseModelId>()
            + std::mem::size_of::<f64>() * 2
            + std::mem::size_of::<CreationIndex>()
            + std::mem::size_of::<bool>();
        per_slot * self.sources.capacity()
            + self.pair_index.capacity() * std::mem::size_of::<((NodeId, NodeId), Vec<usize>)>()
    }
}

impl ConnectionStorage for ConnectionRegistry {
    fn thread(&self) -> usize {
        self.thread
    }

    fn count(&self) -> usize {
        self.count
    }

    fn valid_count(&self) -> usize {
        self.live
    }

    fn insert(&mut self, connection: NewConnection) -> ConnectionId {
        let idx = self.count;

        self.sources.push(connection.source);
        self.targets.push(connection.target);
        self.synapse_models.push(connection.synapse_model);
        self.weights.push(connection.weight);
        self.delays.push(connection.delay);
        self.creation.push(connection.creation);
        self.valid_mask.push(true);

        self.pair_index
            .entry((connection.source, connection.target))
            .or_default()
            .push(idx);

        self.count += 1;
        self.live += 1;

        ConnectionId {
            thread: self.thread as u32,
            index: idx as u32,
        }
    }

    fn get(&self, index: usize) -> Option<Connection> {
        (index < self.count && self.valid_mask[index]).then(|| self.record(index))
    }

    fn tombstone(&mut self, index: usize) -> RuntimeResult<bool> {
        if index >= self.count {
            return Err(RuntimeError::InvalidIndex {
                index,
                count: self.count,
            });
        }
        let was_live = std::mem::replace(&mut self.valid_mask[index], false);
        if was_live {
            self.live -= 1;
        }
        Ok(was_live)
    }

    fn set_weight(&mut self, index: usize, weight: f64) -> RuntimeResult<()> {
        self.check_index(index)?;
        if !weight.is_finite() {
            return Err(RuntimeError::InvalidValue {
                field: "weight",
                value: weight,
            });
        }
        self.weights[index] = weight;
        Ok(())
    }

    fn set_delay(&mut self, index: usize, delay: f64) -> RuntimeResult<()> {
        self.check_index(index)?;
        if !delay.is_finite() || delay <= 0.0 {
            return Err(RuntimeError::InvalidValue {
                field: "delay",
                value: delay,
            });
        }
        self.delays[index] = delay;
        Ok(())
    }

    fn clear(&mut self) {
        self.count = 0;
        self.live = 0;
        self.sources.clear();
        self.targets.clear();
        self.synapse_models.clear();
        self.weights.clear();
        self.delays.clear();
        self.creation.clear();
        self.valid_mask.clear();
        self.pair_index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATIC: SynapseModelId = SynapseModelId(0);
    const STDP: SynapseModelId = SynapseModelId(2);

    fn conn(source: u64, target: u64, model: SynapseModelId, ordinal: u64) -> NewConnection {
        NewConnection {
            source: NodeId(source),
            target: NodeId(target),
            synapse_model: model,
            weight: 1.0,
            delay: 1.5,
            creation: CreationIndex { call: 0, ordinal },
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut reg = ConnectionRegistry::new(3, 4);
        let id = reg.insert(conn(1, 2, STATIC, 0));
        assert_eq!(id, ConnectionId { thread: 3, index: 0 });
        assert_eq!(reg.count(), 1);
        assert_eq!(reg.valid_count(), 1);

        let c = reg.get(0).unwrap();
        assert_eq!(c.source, NodeId(1));
        assert_eq!(c.target, NodeId(2));
        assert_eq!(c.id, id);
        assert!(reg.get(1).is_none());
    }

    #[test]
    fn test_find_filters_model() {
        let mut reg = ConnectionRegistry::new(0, 4);
        reg.insert(conn(1, 2, STATIC, 0));
        reg.insert(conn(1, 2, STDP, 1));
        reg.insert(conn(1, 3, STATIC, 2));

        assert_eq!(reg.find(NodeId(1), NodeId(2), None).count(), 2);
        assert_eq!(reg.find(NodeId(1), NodeId(2), Some(STDP)).count(), 1);
        assert_eq!(reg.find(NodeId(2), NodeId(1), None).count(), 0);
        assert!(reg.contains_pair(NodeId(1), NodeId(3)));
    }

    #[test]
    fn test_disconnect_pair_is_idempotent() {
        let mut reg = ConnectionRegistry::new(0, 4);
        reg.insert(conn(1, 2, STATIC, 0));
        reg.insert(conn(1, 2, STATIC, 1));
        reg.insert(conn(1, 2, STDP, 2));

        assert_eq!(reg.disconnect_pair(NodeId(1), NodeId(2), STATIC), 2);
        assert_eq!(reg.disconnect_pair(NodeId(1), NodeId(2), STATIC), 0);
        assert_eq!(reg.valid_count(), 1);
        assert_eq!(reg.count(), 3);
        assert_eq!(reg.disconnect_pair(NodeId(9), NodeId(9), STATIC), 0);
    }

    #[test]
    fn test_counts_by_model_skip_tombstones() {
        let mut reg = ConnectionRegistry::new(0, 4);
        reg.insert(conn(1, 2, STATIC, 0));
        reg.insert(conn(1, 3, STATIC, 1));
        reg.insert(conn(1, 2, STDP, 2));
        reg.disconnect_pair(NodeId(1), NodeId(3), STATIC);

        let counts = reg.counts_by_model();
        assert_eq!(counts.get(&STATIC), Some(&1));
        assert_eq!(counts.get(&STDP), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn test_memory_usage_follows_capacity() {
        let small = ConnectionRegistry::new(0, 4);
        let large = ConnectionRegistry::new(0, 4096);
        assert!(small.memory_usage() > 0);
        assert!(large.memory_usage() > small.memory_usage());

        let mut grown = ConnectionRegistry::new(0, 0);
        let empty = grown.memory_usage();
        for ordinal in 0..64 {
            grown.insert(conn(1, ordinal + 2, STATIC, ordinal));
        }
        assert!(grown.memory_usage() > empty);
    }

    #[test]
    fn test_disconnect_where() {
        let mut reg = ConnectionRegistry::new(0, 8);
        for t in 1..=5 {
            reg.insert(conn(1, t, STATIC, t));
        }
        let removed = reg.disconnect_where(|c| c.target.0 % 2 == 0);
        assert_eq!(removed, 2);
        assert_eq!(reg.disconnect_where(|c| c.target.0 % 2 == 0), 0);
        let targets: Vec<u64> = reg.iter().map(|c| c.target.0).collect();
        assert_eq!(targets, vec![1, 3, 5]);
    }

    #[test]
    fn test_tombstoned_slot_rejects_updates() {
        let mut reg = ConnectionRegistry::new(0, 2);
        reg.insert(conn(1, 2, STATIC, 0));
        assert!(reg.tombstone(0).unwrap());
        assert!(!reg.tombstone(0).unwrap());
        assert_eq!(reg.set_weight(0, 2.0), Err(RuntimeError::Tombstoned(0)));
        assert_eq!(
            reg.set_delay(5, 2.0),
            Err(RuntimeError::InvalidIndex { index: 5, count: 1 })
        );
    }

    #[test]
    fn test_set_weight_and_delay() {
        let mut reg = ConnectionRegistry::new(0, 2);
        reg.insert(conn(1, 2, STATIC, 0));
        reg.set_weight(0, -3.5).unwrap();
        reg.set_delay(0, 4.0).unwrap();
        let c = reg.get(0).unwrap();
        assert_eq!(c.weight, -3.5);
        assert_eq!(c.delay, 4.0);
        assert!(reg.set_weight(0, f64::NAN).is_err());
        assert!(reg.set_delay(0, 0.0).is_err());
    }

    #[test]
    fn test_delay_extrema_ignores_tombstones() {
        let mut reg = ConnectionRegistry::new(0, 4);
        assert_eq!(reg.local_delay_extrema(), None);

        let mut a = conn(1, 2, STATIC, 0);
        a.delay = 0.5;
        let mut b = conn(1, 3, STATIC, 1);
        b.delay = 7.0;
        let mut c = conn(1, 4, STATIC, 2);
        c.delay = 2.0;
        reg.insert(a);
        reg.insert(b);
        reg.insert(c);
        assert_eq!(reg.local_delay_extrema(), Some((0.5, 7.0)));

        reg.disconnect_pair(NodeId(1), NodeId(3), STATIC);
        assert_eq!(reg.local_delay_extrema(), Some((0.5, 2.0)));
    }

    #[test]
    fn test_enumerate_is_lazy_and_ordered() {
        let mut reg = ConnectionRegistry::new(0, 4);
        reg.insert(conn(4, 2, STATIC, 0));
        reg.insert(conn(1, 2, STDP, 1));
        reg.insert(conn(3, 2, STATIC, 2));
        let mut it = reg.enumerate(|c| c.synapse_model == STATIC);
        assert_eq!(it.next().map(|c| c.source), Some(NodeId(4)));
        assert_eq!(it.next().map(|c| c.source), Some(NodeId(3)));
        assert!(it.next().is_none());
    }

    #[test]
    fn test_clear_resets_numbering() {
        let mut reg = ConnectionRegistry::new(1, 2);
        reg.insert(conn(1, 2, STATIC, 0));
        reg.insert(conn(1, 3, STATIC, 1));
        reg.clear();
        assert_eq!(reg.count(), 0);
        assert_eq!(reg.insert(conn(5, 6, STATIC, 0)).index, 0);
        assert_eq!(reg.counts_by_model().get(&STATIC), Some(&1));
    }

    #[test]
    fn test_connection_serializes() {
        let mut reg = ConnectionRegistry::new(0, 1);
        reg.insert(conn(1, 2, STATIC, 0));
        let c = reg.get(0).unwrap();
        let bytes = bincode::serialize(&c).unwrap();
        let back: Connection = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, c);
    }
}
