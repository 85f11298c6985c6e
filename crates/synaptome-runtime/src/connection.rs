// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Connection record types

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use synaptome_structures::NodeId;

/// Handle of a registered synapse model
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SynapseModelId(pub u16);

impl Display for SynapseModelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "syn#{}", self.0)
    }
}

/// Partition-independent creation order of a connection
///
/// `call` counts connect calls on the kernel (identical on every rank),
/// `ordinal` is the canonical candidate index within that call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CreationIndex {
    pub call: u64,
    pub ordinal: u64,
}

/// Arena address of a connection: owning thread and slot in its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId {
    pub thread: u32,
    pub index: u32,
}

/// Connection about to be inserted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewConnection {
    pub source: NodeId,
    pub target: NodeId,
    pub synapse_model: SynapseModelId,
    pub weight: f64,
    pub delay: f64,
    pub creation: CreationIndex,
}

/// Stored connection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub source: NodeId,
    pub target: NodeId,
    pub synapse_model: SynapseModelId,
    pub weight: f64,
    pub delay: f64,
    pub id: ConnectionId,
    pub creation: CreationIndex,
}

impl Connection {
    /// Sort key that does not depend on ranks or threads
    #[inline]
    pub fn canonical_key(&self) -> (NodeId, NodeId, SynapseModelId, CreationIndex) {
        (self.source, self.target, self.synapse_model, self.creation)
    }
}
