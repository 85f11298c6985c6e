// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Storage abstraction for connection arenas
//!
//! The builder and gather code only talk to storage through this trait, so
//! an arena layout can change without touching the connection rules.

use crate::{Connection, ConnectionId, NewConnection, RuntimeResult};

/// Connection storage trait: one arena per worker thread
pub trait ConnectionStorage: Send + Sync {
    /// Thread owning this arena
    fn thread(&self) -> usize;

    /// Slots ever used, tombstones included
    fn count(&self) -> usize;

    /// Live connections
    fn valid_count(&self) -> usize;

    /// Append a connection
    fn insert(&mut self, connection: NewConnection) -> ConnectionId;

    /// Live connection at `index`
    fn get(&self, index: usize) -> Option<Connection>;

    /// Tombstone one slot; returns whether it was live
    fn tombstone(&mut self, index: usize) -> RuntimeResult<bool>;

    fn set_weight(&mut self, index: usize, weight: f64) -> RuntimeResult<()>;

    fn set_delay(&mut self, index: usize, delay: f64) -> RuntimeResult<()>;

    /// Drop every connection and reset slot numbering
    fn clear(&mut self);

    /// Append many connections, returns how many were added
    fn insert_batch(&mut self, connections: Vec<NewConnection>) -> usize {
        let added = connections.len();
        for connection in connections {
            self.insert(connection);
        }
        added
    }

    /// Tombstone every live connection matching `predicate`
    ///
    /// Already removed slots are skipped, so repeating a call is a no-op.
    fn disconnect_where<P>(&mut self, predicate: P) -> usize
    where
        Self: Sized,
        P: Fn(&Connection) -> bool,
    {
        let matching: Vec<usize> = (0..self.count())
            .filter(|&idx| self.get(idx).is_some_and(|c| predicate(&c)))
            .collect();
        matching
            .into_iter()
            .filter(|&idx| matches!(self.tombstone(idx), Ok(true)))
            .count()
    }
}
