// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Connection queries and the caller-facing connection view.
*/

use serde::{Deserialize, Serialize};
use synaptome_runtime::{Connection, CreationIndex, SynapseModelId};
use synaptome_structures::{NodeCollection, NodeId};

/// Filter for connection enumeration; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionQuery {
    pub sources: Option<NodeCollection>,
    pub targets: Option<NodeCollection>,
    pub synapse_model: Option<String>,
}

impl ConnectionQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_sources(mut self, sources: NodeCollection) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn with_targets(mut self, targets: NodeCollection) -> Self {
        self.targets = Some(targets);
        self
    }

    pub fn with_synapse_model(mut self, model: impl Into<String>) -> Self {
        self.synapse_model = Some(model.into());
        self
    }
}

/// Query with the model name resolved to an id
pub(crate) struct ResolvedQuery<'a> {
    pub sources: Option<&'a NodeCollection>,
    pub targets: Option<&'a NodeCollection>,
    pub synapse_model: Option<SynapseModelId>,
}

impl ResolvedQuery<'_> {
    pub fn matches(&self, c: &Connection) -> bool {
        self.synapse_model.map_or(true, |m| c.synapse_model == m)
            && self.sources.map_or(true, |s| s.contains(c.source))
            && self.targets.map_or(true, |t| t.contains(c.target))
    }
}

/// A connection as returned by queries
///
/// `rank`, `thread` and `local_index` locate the record and differ between
/// partitionings; everything else is partition independent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionView {
    pub source: NodeId,
    pub target: NodeId,
    pub synapse_model: SynapseModelId,
    pub weight: f64,
    pub delay: f64,
    pub creation: CreationIndex,
    pub rank: u32,
    pub thread: u32,
    pub local_index: u32,
}

impl ConnectionView {
    pub fn new(connection: &Connection, rank: usize) -> Self {
        Self {
            source: connection.source,
            target: connection.target,
            synapse_model: connection.synapse_model,
            weight: connection.weight,
            delay: connection.delay,
            creation: connection.creation,
            rank: rank as u32,
            thread: connection.id.thread,
            local_index: connection.id.index,
        }
    }

    /// Sort key shared by every partitioning
    #[inline]
    pub fn canonical_key(&self) -> (NodeId, NodeId, SynapseModelId, CreationIndex) {
        (self.source, self.target, self.synapse_model, self.creation)
    }
}

/// Sort views into canonical order
pub fn sort_canonical(views: &mut [ConnectionView]) {
    views.sort_unstable_by_key(ConnectionView::canonical_key);
}
