// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Connectivity kernel - the per-rank owner of nodes, registries and collectives.

## Architecture

```text
ConnectivityKernel (rank r)
├── VersionedConfig      partition, seed, resolution (locked once nodes exist)
├── VirtualProcessMap    id -> (rank, thread, local index)
├── SeededStreams        canonical random streams
├── registries[t]        one ConnectionRegistry per local thread
└── Communicator         collectives shared with the other ranks
```

Every rank builds its own kernel and must issue the same sequence of calls.
Mutations take `&mut self` and aggregate queries take `&self`, so a rank can
never mutate while one of its gathers is in flight; across ranks the
generation check in [`DistributedGather`] rejects a rank that fell out of
step.
*/

use crate::builder::{BuildContext, ConnectionBuilder};
use crate::collective::{Collective, Communicator};
use crate::gather::DistributedGather;
use crate::parameters::ParameterValue;
use crate::query::{sort_canonical, ConnectionQuery, ConnectionView, ResolvedQuery};
use crate::rng::SeededStreams;
use crate::rules::{ConnSpec, Position};
use crate::synapse::{SynSpec, SynapseModelRegistry};
use crate::table::ConnectionTable;
use crate::types::{ConnectError, ConnectResult};
use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use synaptome_config::{validate_config, KernelConfig, SynaptomeConfig};
use synaptome_runtime::{ConnectionRegistry, ConnectionStorage, NewConnection, SynapseModelId};
use synaptome_structures::{NodeCollection, NodeId, VirtualProcessMap, VpAssignment};
use tracing::{debug, info, warn};

/// Kernel configuration plus a version bumped on every accepted change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VersionedConfig {
    pub version: u64,
    pub kernel: KernelConfig,
}

/// Partial update for [`ConnectivityKernel::set_kernel_config`]
///
/// The rank count is fixed by the collective and cannot be changed here.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KernelConfigUpdate {
    pub threads_per_rank: Option<usize>,
    pub rng_seed: Option<u64>,
    pub resolution: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayExtrema {
    pub min_delay: f64,
    pub max_delay: f64,
}

impl DelayExtrema {
    fn cover(extrema: Option<DelayExtrema>, delay: f64) -> DelayExtrema {
        match extrema {
            None => DelayExtrema {
                min_delay: delay,
                max_delay: delay,
            },
            Some(e) => DelayExtrema {
                min_delay: e.min_delay.min(delay),
                max_delay: e.max_delay.max(delay),
            },
        }
    }
}

/// Cached global extrema; `stale` is set by every mutation on every rank
#[derive(Debug, Default)]
struct DelayCache {
    extrema: Option<DelayExtrema>,
    stale: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectRule {
    OneToOne,
    AllToAll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectSpec {
    pub rule: DisconnectRule,
    pub synapse_model: String,
}

impl DisconnectSpec {
    pub fn new(rule: DisconnectRule, synapse_model: impl Into<String>) -> Self {
        Self {
            rule,
            synapse_model: synapse_model.into(),
        }
    }
}

/// Snapshot returned by [`ConnectivityKernel::status`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelStatus {
    pub rank: usize,
    pub num_ranks: usize,
    pub threads_per_rank: usize,
    pub total_vps: usize,
    pub rng_seed: u64,
    pub resolution: f64,
    pub config_version: u64,
    pub node_count: u64,
    pub num_connections: u64,
    pub delay_extrema: Option<DelayExtrema>,
    pub connect_calls: u64,
    pub generation: u64,
    pub poisoned: Option<String>,
}

#[derive(Clone, Copy)]
enum Field {
    Weight,
    Delay,
}

pub struct ConnectivityKernel {
    config: VersionedConfig,
    vp_map: VirtualProcessMap,
    streams: SeededStreams,
    comm: Communicator,
    synapse_models: SynapseModelRegistry,
    default_synapse_model: String,
    registry_capacity: usize,
    registries: Vec<ConnectionRegistry>,
    next_node: u64,
    positions: AHashMap<NodeId, Position>,
    connect_calls: u64,
    generation: u64,
    delay_cache: Mutex<DelayCache>,
    poisoned: Option<String>,
}

impl ConnectivityKernel {
    pub fn new(config: KernelConfig, collective: Arc<dyn Collective>) -> ConnectResult<Self> {
        if collective.num_ranks() != config.num_ranks {
            return Err(ConnectError::BadParameter(format!(
                "configured for {} ranks but the collective has {}",
                config.num_ranks,
                collective.num_ranks()
            )));
        }
        if collective.rank() >= config.num_ranks {
            return Err(ConnectError::BadParameter(format!(
                "rank {} outside a group of {}",
                collective.rank(),
                config.num_ranks
            )));
        }
        check_resolution(config.resolution)?;
        let vp_map = VirtualProcessMap::new(config.num_ranks, config.threads_per_rank)?;
        let registry_capacity = synaptome_config::ConnectivityConfig::default().registry_capacity;

        let kernel = Self {
            config: VersionedConfig {
                version: 1,
                kernel: config,
            },
            registries: make_registries(config.threads_per_rank, registry_capacity),
            vp_map,
            streams: SeededStreams::new(config.rng_seed),
            comm: Communicator::new(collective),
            synapse_models: SynapseModelRegistry::builtin(),
            default_synapse_model: "static_synapse".to_string(),
            registry_capacity,
            next_node: 1,
            positions: AHashMap::new(),
            connect_calls: 0,
            generation: 0,
            delay_cache: Mutex::new(DelayCache::default()),
            poisoned: None,
        };
        info!(
            target: "synaptome-connectivity",
            "[KERNEL] rank {}/{} ready: {} threads, {} VPs, seed {}",
            kernel.rank(),
            config.num_ranks,
            config.threads_per_rank,
            kernel.vp_map.total_vps(),
            config.rng_seed
        );
        Ok(kernel)
    }

    /// Build from a loaded configuration file
    pub fn from_config(
        config: &SynaptomeConfig,
        collective: Arc<dyn Collective>,
    ) -> ConnectResult<Self> {
        validate_config(config).map_err(|e| ConnectError::BadParameter(e.to_string()))?;
        let mut kernel = Self::new(config.kernel, collective)?;
        kernel
            .synapse_models
            .lookup(&config.connectivity.default_synapse_model)?;
        kernel.default_synapse_model = config.connectivity.default_synapse_model.clone();
        kernel.registry_capacity = config.connectivity.registry_capacity;
        kernel.registries = make_registries(config.kernel.threads_per_rank, kernel.registry_capacity);
        Ok(kernel)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn num_ranks(&self) -> usize {
        self.comm.num_ranks()
    }

    pub fn config(&self) -> &VersionedConfig {
        &self.config
    }

    pub fn vp_map(&self) -> &VirtualProcessMap {
        &self.vp_map
    }

    pub fn synapse_models(&self) -> &SynapseModelRegistry {
        &self.synapse_models
    }

    /// Synapse spec using the configured default model
    pub fn default_syn_spec(&self) -> SynSpec {
        SynSpec::new(self.default_synapse_model.clone())
    }

    pub fn node_count(&self) -> u64 {
        self.next_node - 1
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connect_calls(&self) -> u64 {
        self.connect_calls
    }

    pub fn poison_reason(&self) -> Option<&str> {
        self.poisoned.as_deref()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Per-thread registries of this rank
    pub fn registries(&self) -> &[ConnectionRegistry] {
        &self.registries
    }

    fn ensure_mutable(&self, operation: &str) -> ConnectResult<()> {
        match &self.poisoned {
            Some(reason) => {
                warn!(
                    target: "synaptome-connectivity",
                    "[KERNEL] refused {} on poisoned kernel: {}",
                    operation,
                    reason
                );
                Err(ConnectError::KernelPoisoned(reason.clone()))
            }
            None => Ok(()),
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Change threads, seed or resolution before the first node exists
    pub fn set_kernel_config(&mut self, update: KernelConfigUpdate) -> ConnectResult<()> {
        self.ensure_mutable("set_kernel_config")?;
        let current = self.config.kernel;
        let next = KernelConfig {
            num_ranks: current.num_ranks,
            threads_per_rank: update.threads_per_rank.unwrap_or(current.threads_per_rank),
            rng_seed: update.rng_seed.unwrap_or(current.rng_seed),
            resolution: update.resolution.unwrap_or(current.resolution),
        };
        if next == current {
            return Ok(());
        }
        if self.node_count() > 0 {
            return Err(ConnectError::ConfigurationLocked(format!(
                "{} nodes already exist; reset before changing the kernel configuration",
                self.node_count()
            )));
        }
        check_resolution(next.resolution)?;
        let vp_map = VirtualProcessMap::new(next.num_ranks, next.threads_per_rank)?;

        self.vp_map = vp_map;
        self.streams = SeededStreams::new(next.rng_seed);
        self.registries = make_registries(next.threads_per_rank, self.registry_capacity);
        self.config = VersionedConfig {
            version: self.config.version + 1,
            kernel: next,
        };
        info!(
            target: "synaptome-connectivity",
            "[KERNEL] configuration v{}: {} threads/rank, seed {}, resolution {}",
            self.config.version,
            next.threads_per_rank,
            next.rng_seed,
            next.resolution
        );
        Ok(())
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Allocate `count` fresh, contiguous node ids
    pub fn create_nodes(&mut self, count: u64) -> ConnectResult<NodeCollection> {
        self.ensure_mutable("create_nodes")?;
        if count == 0 {
            return Err(ConnectError::BadParameter(
                "node count must be at least 1".to_string(),
            ));
        }
        let first = self.next_node;
        let last = first
            .checked_add(count - 1)
            .filter(|&last| last < u64::MAX)
            .ok_or_else(|| {
                ConnectError::BadParameter(format!(
                    "creating {count} nodes after id {} exhausts the id space",
                    first - 1
                ))
            })?;
        let nodes = NodeCollection::from_range(first, last)?;
        self.next_node = last + 1;
        debug!(
            target: "synaptome-connectivity",
            "[KERNEL] created nodes {}..={}",
            first,
            last
        );
        Ok(nodes)
    }

    /// Allocate one node per position
    pub fn create_spatial_nodes(&mut self, positions: &[Position]) -> ConnectResult<NodeCollection> {
        if let Some(bad) = positions.iter().find(|p| !p.is_finite()) {
            return Err(ConnectError::BadParameter(format!(
                "position {bad:?} is not finite"
            )));
        }
        let nodes = self.create_nodes(positions.len() as u64)?;
        for (id, position) in nodes.iter().zip(positions) {
            self.positions.insert(id, *position);
        }
        Ok(nodes)
    }

    pub fn position(&self, id: NodeId) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    fn check_node(&self, id: NodeId) -> ConnectResult<()> {
        if id.0 == 0 || id.0 >= self.next_node {
            return Err(ConnectError::UnknownNode(id.0));
        }
        Ok(())
    }

    fn check_collection(&self, nodes: &NodeCollection) -> ConnectResult<()> {
        match (nodes.first(), nodes.last()) {
            (Some(first), Some(last)) => {
                self.check_node(first)?;
                self.check_node(last)
            }
            _ => Ok(()),
        }
    }

    /// (vp, rank, thread, local index) of an existing node
    pub fn node_assignment(&self, id: NodeId) -> ConnectResult<VpAssignment> {
        self.check_node(id)?;
        Ok(self.vp_map.assign(id))
    }

    // ========================================================================
    // Connect / disconnect
    // ========================================================================

    /// Create connections from `sources` to `targets`
    ///
    /// Atomic across threads and ranks: either every rank commits its share
    /// or no registry changes anywhere. Must be called on every rank.
    pub fn connect(
        &mut self,
        sources: &NodeCollection,
        targets: &NodeCollection,
        conn_spec: &ConnSpec,
        syn_spec: &SynSpec,
    ) -> ConnectResult<()> {
        let call = self.connect_calls;
        // Local failures still take part in the agreement below
        let outcome = self
            .ensure_mutable("connect")
            .and_then(|()| self.check_collection(sources))
            .and_then(|()| self.check_collection(targets))
            .and_then(|()| {
                let env = BuildContext {
                    vp_map: &self.vp_map,
                    streams: &self.streams,
                    synapse_models: &self.synapse_models,
                    positions: &self.positions,
                    resolution: self.config.kernel.resolution,
                    rank: self.rank(),
                    call,
                };
                ConnectionBuilder::new(env, sources, targets, conn_spec, syn_spec)
                    .and_then(|builder| builder.plan())
            });

        let failures = if self.num_ranks() > 1 {
            let local = outcome.as_ref().err().map(ToString::to_string);
            self.comm.all_agree(local)?
        } else {
            Vec::new()
        };

        let pending = match outcome {
            Err(err) => {
                warn!(
                    target: "synaptome-connectivity",
                    "[CONNECT] {} ({} -> {} nodes, {}) failed: {}",
                    conn_spec.rule.name(),
                    sources.len(),
                    targets.len(),
                    syn_spec.model,
                    err
                );
                return Err(err);
            }
            Ok(_) if !failures.is_empty() => {
                let ranks: Vec<usize> = failures.iter().map(|(rank, _)| *rank).collect();
                let first_error = failures[0].1.clone();
                warn!(
                    target: "synaptome-connectivity",
                    "[CONNECT] {} rejected: planning failed on rank(s) {:?}: {}",
                    conn_spec.rule.name(),
                    ranks,
                    first_error
                );
                return Err(ConnectError::Rejected {
                    rule: conn_spec.rule.name().to_string(),
                    ranks,
                    first_error,
                });
            }
            Ok(pending) => pending,
        };

        let added = self.commit(pending);
        self.connect_calls += 1;
        self.generation += 1;
        info!(
            target: "synaptome-connectivity",
            "[CONNECT] call {} {}: {} -> {} nodes, {} local connections ({})",
            call,
            conn_spec.rule.name(),
            sources.len(),
            targets.len(),
            added,
            syn_spec.model
        );
        Ok(())
    }

    fn commit(&mut self, pending: Vec<Vec<NewConnection>>) -> usize {
        let mut local = self.delay_cache.lock();
        for connection in pending.iter().flatten() {
            local.extrema = Some(DelayExtrema::cover(local.extrema, connection.delay));
        }
        local.stale = true;
        drop(local);

        let added = pending.iter().map(Vec::len).sum();

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.registries
                .par_iter_mut()
                .zip(pending.into_par_iter())
                .for_each(|(registry, batch)| {
                    registry.insert_batch(batch);
                });
        }

        #[cfg(not(feature = "parallel"))]
        for (registry, batch) in self.registries.iter_mut().zip(pending) {
            registry.insert_batch(batch);
        }

        added
    }

    /// Remove connections of one synapse model between the given nodes
    ///
    /// Absent connections are ignored. Returns how many this rank removed.
    pub fn disconnect(
        &mut self,
        sources: &NodeCollection,
        targets: &NodeCollection,
        spec: &DisconnectSpec,
    ) -> ConnectResult<usize> {
        // Marked before any local refusal so all ranks agree on the next reduction
        self.delay_cache.lock().stale = true;
        self.ensure_mutable("disconnect")?;
        self.check_collection(sources)?;
        self.check_collection(targets)?;
        let model = self.synapse_models.lookup(&spec.synapse_model)?;
        if spec.rule == DisconnectRule::OneToOne && sources.len() != targets.len() {
            return Err(ConnectError::DimensionMismatch {
                sources: sources.len(),
                targets: targets.len(),
            });
        }

        let source_ids: Vec<NodeId> = sources.iter().collect();
        let target_ids: Vec<NodeId> = targets.iter().collect();
        let vp_map = &self.vp_map;
        let rank = self.comm.rank();
        let rule = spec.rule;

        let remove = |(thread, registry): (usize, &mut ConnectionRegistry)| -> usize {
            let vp = vp_map.vp_for(rank, thread);
            let mut removed = 0;
            for (j, &target) in target_ids.iter().enumerate() {
                if vp_map.vp_of(target) != vp {
                    continue;
                }
                removed += match rule {
                    DisconnectRule::OneToOne => registry.disconnect_pair(source_ids[j], target, model),
                    DisconnectRule::AllToAll => source_ids
                        .iter()
                        .map(|&source| registry.disconnect_pair(source, target, model))
                        .sum(),
                };
            }
            removed
        };

        #[cfg(feature = "parallel")]
        let removed: usize = {
            use rayon::prelude::*;
            self.registries.par_iter_mut().enumerate().map(remove).sum()
        };

        #[cfg(not(feature = "parallel"))]
        let removed: usize = self.registries.iter_mut().enumerate().map(remove).sum();

        self.generation += 1;
        info!(
            target: "synaptome-connectivity",
            "[DISCONNECT] {:?} {}: removed {} local connections",
            spec.rule,
            spec.synapse_model,
            removed
        );
        Ok(removed)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn resolve_query<'q>(&self, query: &'q ConnectionQuery) -> ConnectResult<ResolvedQuery<'q>> {
        let synapse_model = query
            .synapse_model
            .as_deref()
            .map(|name| self.synapse_models.lookup(name))
            .transpose()?;
        Ok(ResolvedQuery {
            sources: query.sources.as_ref(),
            targets: query.targets.as_ref(),
            synapse_model,
        })
    }

    fn collect_local(&self, query: &ResolvedQuery<'_>) -> Vec<ConnectionView> {
        let rank = self.rank();
        let per_registry = |registry: &ConnectionRegistry| -> Vec<ConnectionView> {
            registry
                .enumerate(|c| query.matches(c))
                .map(|c| ConnectionView::new(&c, rank))
                .collect()
        };

        #[cfg(feature = "parallel")]
        let parts: Vec<Vec<ConnectionView>> = {
            use rayon::prelude::*;
            self.registries.par_iter().map(per_registry).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let parts: Vec<Vec<ConnectionView>> = self.registries.iter().map(per_registry).collect();

        let mut views: Vec<ConnectionView> = parts.into_iter().flatten().collect();
        sort_canonical(&mut views);
        views
    }

    /// Matching connections stored on this rank, canonically sorted
    ///
    /// Not a collective.
    pub fn local_connections(&self, query: &ConnectionQuery) -> ConnectResult<Vec<ConnectionView>> {
        let resolved = self.resolve_query(query)?;
        Ok(self.collect_local(&resolved))
    }

    /// Matching connections of all ranks, canonically sorted
    ///
    /// Collective: every rank receives the same sequence.
    pub fn get_connections(&self, query: &ConnectionQuery) -> ConnectResult<Vec<ConnectionView>> {
        let resolved = self.resolve_query(query)?;
        let local = self.collect_local(&resolved);
        DistributedGather::new(&self.comm, self.generation).run(local)
    }

    /// Tabular form of [`get_connections`](Self::get_connections)
    pub fn export_table(&self, query: &ConnectionQuery) -> ConnectResult<ConnectionTable> {
        let views = self.get_connections(query)?;
        Ok(ConnectionTable::from_views(&views, &self.synapse_models))
    }

    /// Live connections on this rank
    pub fn local_num_connections(&self) -> usize {
        self.registries.iter().map(|r| r.valid_count()).sum()
    }

    /// Live connections on all ranks. Collective.
    pub fn num_connections(&self) -> ConnectResult<u64> {
        Ok(self.comm.all_reduce_sum(self.local_num_connections() as u64)?)
    }

    /// Live connections per synapse model on this rank
    pub fn local_counts_by_model(&self) -> AHashMap<SynapseModelId, usize> {
        let mut counts = AHashMap::new();
        for registry in &self.registries {
            for (model, n) in registry.counts_by_model() {
                *counts.entry(model).or_insert(0) += n;
            }
        }
        counts
    }

    /// Global smallest and largest delay, `None` without connections
    ///
    /// Collective. The cached value is reused until a mutation marks it
    /// stale; every rank marks it at the same calls, so either all ranks
    /// reduce or none do.
    pub fn delay_extrema(&self) -> ConnectResult<Option<DelayExtrema>> {
        let mut cache = self.delay_cache.lock();
        if !cache.stale {
            return Ok(cache.extrema);
        }
        let local = self
            .registries
            .iter()
            .filter_map(|r| r.local_delay_extrema())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (l, h)| {
                (lo.min(l), hi.max(h))
            });
        let min_delay = self.comm.all_reduce_min(local.0)?;
        let max_delay = self.comm.all_reduce_max(local.1)?;
        cache.extrema = min_delay.is_finite().then_some(DelayExtrema {
            min_delay,
            max_delay,
        });
        cache.stale = false;
        debug!(
            target: "synaptome-connectivity",
            "[KERNEL] delay extrema recomputed: {:?}",
            cache.extrema
        );
        Ok(cache.extrema)
    }

    /// Kernel snapshot. Collective.
    pub fn status(&self) -> ConnectResult<KernelStatus> {
        let num_connections = self.num_connections()?;
        let delay_extrema = self.delay_extrema()?;
        let kernel = self.config.kernel;
        Ok(KernelStatus {
            rank: self.rank(),
            num_ranks: kernel.num_ranks,
            threads_per_rank: kernel.threads_per_rank,
            total_vps: self.vp_map.total_vps(),
            rng_seed: kernel.rng_seed,
            resolution: kernel.resolution,
            config_version: self.config.version,
            node_count: self.node_count(),
            num_connections,
            delay_extrema,
            connect_calls: self.connect_calls,
            generation: self.generation,
            poisoned: self.poisoned.clone(),
        })
    }

    // ========================================================================
    // Connection parameters
    // ========================================================================

    /// Set the weight of every matching connection; returns the local count
    pub fn set_connection_weight(
        &mut self,
        query: &ConnectionQuery,
        value: ParameterValue,
    ) -> ConnectResult<usize> {
        self.set_connection_field(query, value, Field::Weight)
    }

    /// Set the delay of every matching connection; returns the local count
    pub fn set_connection_delay(
        &mut self,
        query: &ConnectionQuery,
        value: ParameterValue,
    ) -> ConnectResult<usize> {
        self.set_connection_field(query, value, Field::Delay)
    }

    fn check_field_value(&self, field: Field, value: f64) -> ConnectResult<()> {
        match field {
            Field::Weight if !value.is_finite() => Err(ConnectError::BadParameter(format!(
                "weight {value} is not finite"
            ))),
            Field::Delay if !value.is_finite() || value < self.config.kernel.resolution => {
                Err(ConnectError::BadDelay {
                    delay: value,
                    resolution: self.config.kernel.resolution,
                })
            }
            _ => Ok(()),
        }
    }

    fn set_connection_field(
        &mut self,
        query: &ConnectionQuery,
        value: ParameterValue,
        field: Field,
    ) -> ConnectResult<usize> {
        if matches!(field, Field::Delay) {
            self.delay_cache.lock().stale = true;
        }
        self.ensure_mutable("set_connection_parameter")?;
        let resolved = self.resolve_query(query)?;
        let matches = self.collect_local(&resolved);

        let values: Vec<f64> = match value {
            ParameterValue::Scalar(v) => {
                self.check_field_value(field, v)?;
                vec![v; matches.len()]
            }
            ParameterValue::Array(values) => {
                if self.num_ranks() > 1 {
                    return Err(ConnectError::NotImplemented(
                        "array-valued connection parameters with more than one rank".to_string(),
                    ));
                }
                if values.len() != matches.len() {
                    return Err(ConnectError::BadParameter(format!(
                        "{} values for {} matching connections",
                        values.len(),
                        matches.len()
                    )));
                }
                for &v in &values {
                    self.check_field_value(field, v)?;
                }
                values
            }
        };

        for (view, v) in matches.iter().zip(values) {
            let registry = &mut self.registries[view.thread as usize];
            let index = view.local_index as usize;
            match field {
                Field::Weight => registry.set_weight(index, v)?,
                Field::Delay => registry.set_delay(index, v)?,
            }
        }

        self.generation += 1;
        Ok(matches.len())
    }

    // ========================================================================
    // Failure containment
    // ========================================================================

    /// Refuse further mutation after an external numerical failure
    ///
    /// Reads keep working; mutations fail with `KernelPoisoned` until `reset`.
    pub fn mark_poisoned(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(
            target: "synaptome-connectivity",
            "[KERNEL] rank {} poisoned: {}",
            self.rank(),
            reason
        );
        self.poisoned = Some(reason);
    }

    /// Drop nodes, connections and counters; keeps the configuration
    pub fn reset(&mut self) {
        for registry in &mut self.registries {
            registry.clear();
        }
        self.next_node = 1;
        self.positions.clear();
        self.connect_calls = 0;
        self.generation = 0;
        *self.delay_cache.lock() = DelayCache::default();
        self.poisoned = None;
        info!(
            target: "synaptome-connectivity",
            "[KERNEL] rank {} reset",
            self.rank()
        );
    }
}

fn check_resolution(resolution: f64) -> ConnectResult<()> {
    if !resolution.is_finite() || resolution <= 0.0 {
        return Err(ConnectError::BadParameter(format!(
            "resolution {resolution} must be finite and positive"
        )));
    }
    Ok(())
}

fn make_registries(threads: usize, capacity: usize) -> Vec<ConnectionRegistry> {
    (0..threads)
        .map(|thread| ConnectionRegistry::new(thread, capacity))
        .collect()
}
