// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `synaptome.toml`.

use serde::{Deserialize, Serialize};

/// `[logging]` section, shared with the logging initializer
pub use synaptome_observability::{LogFormat, LoggingConfig};

/// Default global seed, shared by every rank of a run
pub const DEFAULT_RNG_SEED: u64 = 143_202_461;

/// Default simulation resolution in milliseconds
pub const DEFAULT_RESOLUTION_MS: f64 = 0.1;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SynaptomeConfig {
    pub kernel: KernelConfig,
    pub connectivity: ConnectivityConfig,
    pub logging: LoggingConfig,
}

/// Partitioning, seeding and timing of a run
///
/// The virtual process count is `num_ranks * threads_per_rank`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KernelConfig {
    pub num_ranks: usize,
    pub threads_per_rank: usize,
    pub rng_seed: u64,
    /// Simulation step in ms; also the smallest admissible connection delay
    pub resolution: f64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            num_ranks: 1,
            threads_per_rank: 1,
            rng_seed: DEFAULT_RNG_SEED,
            resolution: DEFAULT_RESOLUTION_MS,
        }
    }
}

impl KernelConfig {
    /// Total number of virtual processes
    pub fn total_vps(&self) -> usize {
        self.num_ranks * self.threads_per_rank
    }

    /// Convenience constructor used heavily by tests
    pub fn with_partition(num_ranks: usize, threads_per_rank: usize) -> Self {
        Self {
            num_ranks,
            threads_per_rank,
            ..Self::default()
        }
    }
}

/// Connection creation defaults
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub default_synapse_model: String,
    /// Initial per-thread arena capacity
    pub registry_capacity: usize,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            default_synapse_model: "static_synapse".to_string(),
            registry_capacity: 1024,
        }
    }
}

/// Log levels accepted by `logging.level`
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
