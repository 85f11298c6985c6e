// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{StructuresError, StructuresResult};

/// Globally unique element identifier.
///
/// Identifiers start at 1 and are handed out in strictly increasing order;
/// 0 is never a valid node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Checked constructor rejecting 0
    pub fn new(raw: u64) -> StructuresResult<Self> {
        if raw == 0 {
            return Err(StructuresError::UnknownNode(0));
        }
        Ok(NodeId(raw))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NodeId> for u64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}
