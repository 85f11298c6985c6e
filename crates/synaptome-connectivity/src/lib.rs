// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synaptome Connectivity
//!
//! Builds, stores and queries the synaptic connections of a network whose
//! nodes are spread over ranks and threads.
//!
//! ## Architecture
//!
//! ```text
//! connect(sources, targets, ConnSpec, SynSpec)
//!         │
//!         ▼
//! ConnectionBuilder ── validate ──> per-thread plan (rayon) ──> agree ──> commit
//!         │                                                              │
//!   SeededStreams (call, purpose, index)                 ConnectionRegistry[t]
//!
//! get_connections(query) ── local enumerate ──> DistributedGather ──> sorted views
//! ```
//!
//! The resulting connection set depends only on the seed and the sequence of
//! calls, never on how many ranks or threads share the work: every random
//! draw comes from a stream keyed by what is being drawn, and query results
//! are returned in one canonical order.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod builder;
pub mod collective;
pub mod gather;
pub mod kernel;
pub mod parameters;
pub mod query;
pub mod rng;
pub mod rules;
pub mod synapse;
pub mod table;
pub mod types;

pub use builder::{BuildContext, ConnectionBuilder};
pub use collective::{
    Collective, CollectiveError, CollectiveOp, CollectiveResult, Communicator, Contribution,
    InProcessGroup, InProcessHandle, SingleProcess,
};
pub use gather::{DistributedGather, GatherState};
pub use kernel::{
    ConnectivityKernel, DelayExtrema, DisconnectRule, DisconnectSpec, KernelConfigUpdate,
    KernelStatus, VersionedConfig,
};
pub use parameters::{EdgeContext, ParameterSpec, ParameterValue};
pub use query::{sort_canonical, ConnectionQuery, ConnectionView};
pub use rng::{PairStream, SeededStreams, StreamKey, StreamPurpose};
pub use rules::{
    Autapses, ConnRule, ConnSpec, DistanceKernel, Mask, Multapses, Position, SpatialRule,
};
pub use synapse::{SynSpec, SynapseModelInfo, SynapseModelRegistry, BUILTIN_SYNAPSE_MODELS};
pub use table::{ConnectionRow, ConnectionTable, CSV_HEADER};
pub use types::{ConnectError, ConnectResult};
