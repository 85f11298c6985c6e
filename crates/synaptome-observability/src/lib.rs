// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # synaptome-observability
//!
//! Logging infrastructure shared by all Synaptome crates, with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: per-run JSON log files with retention cleanup

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known crate names for debug flags (also the `tracing` targets they log under)
pub const KNOWN_CRATES: &[&str] = &[
    "synaptome-config",
    "synaptome-structures",
    "synaptome-runtime",
    "synaptome-connectivity",
];
