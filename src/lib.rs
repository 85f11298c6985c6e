// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synaptome - deterministic connectivity for parallel spiking networks
//!
//! Synaptome creates, stores, queries and removes the synaptic connections of
//! a spiking-network model whose nodes are distributed over ranks (processes)
//! and threads. The same seed and the same sequence of calls produce the same
//! connections whatever the partitioning.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! synaptome = "0.1"  # Default: parallel planning via rayon
//! ```
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use synaptome::prelude::*;
//!
//! let mut kernel = ConnectivityKernel::new(
//!     KernelConfig::with_partition(1, 4),
//!     Arc::new(SingleProcess),
//! )?;
//! let nodes = kernel.create_nodes(100)?;
//! kernel.connect(
//!     &nodes,
//!     &nodes,
//!     &ConnSpec::new(ConnRule::FixedIndegree { indegree: 10 }, Autapses::Forbid, Multapses::Forbid),
//!     &SynSpec::default().with_weight(ParameterSpec::Normal { mean: 1.0, std: 0.1 }),
//! )?;
//! let table = kernel.export_table(&ConnectionQuery::all())?;
//! print!("{}", table.to_csv()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! - **`parallel`** (default): plan and enumerate per-thread registries with rayon
//! - **`file-logging`**: rolling per-run log files
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: synaptome-config, synaptome-observability  │
//! │  (TOML config + overrides, tracing setup)               │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Data: synaptome-structures                             │
//! │  (NodeId, VirtualProcessMap, NodeCollection)            │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Storage: synaptome-runtime                             │
//! │  (per-thread ConnectionRegistry)                        │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Algorithms: synaptome-connectivity                     │
//! │  (rules, seeded streams, collectives, kernel)           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub use synaptome_config as config;
pub use synaptome_connectivity as connectivity;
pub use synaptome_observability as observability;
pub use synaptome_runtime as runtime;
pub use synaptome_structures as structures;

/// Install console logging from the `[logging]` section of `config`
///
/// Debug flags come from the process arguments and `SYNAPTOME_DEBUG`. An
/// already installed global subscriber is kept; an invalid level is still
/// reported.
pub fn init_logging(config: &config::SynaptomeConfig) -> anyhow::Result<()> {
    let flags = observability::parse_debug_flags();
    observability::build_filter(&flags, &config.logging)?;
    match observability::init_console_logging(&flags, &config.logging) {
        Ok(()) => Ok(()),
        Err(_) if tracing::dispatcher::has_been_set() => Ok(()),
        Err(err) => Err(err),
    }
}

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{KernelConfig, SynaptomeConfig};
    pub use crate::connectivity::{
        Autapses, Collective, ConnRule, ConnSpec, ConnectError, ConnectResult, ConnectionQuery,
        ConnectionTable, ConnectionView, ConnectivityKernel, DelayExtrema, DisconnectRule,
        DisconnectSpec, DistanceKernel, InProcessGroup, KernelConfigUpdate, Mask, Multapses,
        ParameterSpec, ParameterValue, Position, SingleProcess, SpatialRule, SynSpec,
    };
    pub use crate::runtime::{ConnectionStorage, SynapseModelId};
    pub use crate::structures::{NodeCollection, NodeId, VirtualProcessMap};
}
