// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The core data types of Synaptome.
//!
//! - [`NodeId`]: globally unique, strictly increasing element identifier
//! - [`VirtualProcessMap`]: pure mapping from identifier to (rank, thread, local slot)
//! - [`NodeCollection`]: ordered set of identifiers stored as merged ranges

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod error;
pub mod node_collection;
mod node_id;
pub mod vp_map;

pub use error::{StructuresError, StructuresResult};
pub use node_collection::{NodeCollection, NodeRange};
pub use node_id::NodeId;
pub use vp_map::{VirtualProcessMap, VpAssignment};
