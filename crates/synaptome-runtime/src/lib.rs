// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Synaptome Runtime
//!
//! Connection storage owned by a single worker thread.
//!
//! ## Architecture
//!
//! ```text
//! rank r
//! ├── thread 0 ── ConnectionRegistry (arena 0)
//! ├── thread 1 ── ConnectionRegistry (arena 1)
//! └── ...
//! ```
//!
//! Each registry is written only by the thread that owns the targets of its
//! connections, so no locking is needed inside a registry. Connections are
//! addressed by `(thread, index)` pairs ([`ConnectionId`]), never by pointer.
//! Removal tombstones a slot; slots are never reused until `clear`.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod connection;
pub mod error;
pub mod registry;
pub mod traits;

pub use connection::{Connection, ConnectionId, CreationIndex, NewConnection, SynapseModelId};
pub use error::{RuntimeError, RuntimeResult};
pub use registry::ConnectionRegistry;
pub use traits::ConnectionStorage;
