// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Connection rules.

Every rule enumerates candidate edges in a canonical order and gives each
accepted edge an ordinal that depends only on positions inside the source and
target collections:

| Rule                 | Ordinal of an edge           |
|----------------------|------------------------------|
| `one_to_one`         | `i`                          |
| `all_to_all`         | `j * |S| + i`                |
| `fixed_indegree`     | `j * k + m`                  |
| `fixed_outdegree`    | `i * k + m`                  |
| `fixed_total_number` | `m`                          |
| `pairwise_bernoulli` | `j * |S| + i`                |
| `spatial`            | `j * |S| + i`                |

`i` is a source position, `j` a target position and `m` the draw number.
A rule run for one virtual process only emits edges whose target that VP
owns.
*/

mod all_to_all;
mod bernoulli;
mod fixed_degree;
mod fixed_total;
mod one_to_one;
pub mod spatial;

use crate::rng::SeededStreams;
use crate::types::{ConnectError, ConnectResult};
use ahash::AHashMap;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use synaptome_structures::{NodeCollection, NodeId, VirtualProcessMap};

pub use spatial::{DistanceKernel, Mask, Position, SpatialRule};

/// Whether a node may connect to itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Autapses {
    Allow,
    Forbid,
}

/// Whether a rule may draw the same pair twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Multapses {
    Allow,
    Forbid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnRule {
    OneToOne,
    AllToAll,
    FixedIndegree { indegree: usize },
    FixedOutdegree { outdegree: usize },
    FixedTotalNumber { n: usize },
    PairwiseBernoulli { p: f64 },
    Spatial(SpatialRule),
}

impl ConnRule {
    pub fn name(&self) -> &'static str {
        match self {
            ConnRule::OneToOne => "one_to_one",
            ConnRule::AllToAll => "all_to_all",
            ConnRule::FixedIndegree { .. } => "fixed_indegree",
            ConnRule::FixedOutdegree { .. } => "fixed_outdegree",
            ConnRule::FixedTotalNumber { .. } => "fixed_total_number",
            ConnRule::PairwiseBernoulli { .. } => "pairwise_bernoulli",
            ConnRule::Spatial(_) => "spatial",
        }
    }

    /// Number of ordinals an array parameter must cover, if the rule has a
    /// fixed edge count
    pub fn ordinal_space(&self, num_sources: usize, num_targets: usize) -> Option<u64> {
        let (s, t) = (num_sources as u64, num_targets as u64);
        match *self {
            ConnRule::OneToOne => Some(s),
            ConnRule::AllToAll => Some(s * t),
            ConnRule::FixedIndegree { indegree } => Some(t * indegree as u64),
            ConnRule::FixedOutdegree { outdegree } => Some(s * outdegree as u64),
            ConnRule::FixedTotalNumber { n } => Some(n as u64),
            ConnRule::PairwiseBernoulli { .. } | ConnRule::Spatial(_) => None,
        }
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, ConnRule::Spatial(_))
    }
}

/// Rule plus the autapse and multapse policies, both stated explicitly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnSpec {
    pub rule: ConnRule,
    pub autapses: Autapses,
    pub multapses: Multapses,
}

impl ConnSpec {
    pub fn new(rule: ConnRule, autapses: Autapses, multapses: Multapses) -> Self {
        Self {
            rule,
            autapses,
            multapses,
        }
    }
}

/// An accepted edge before parameters are resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub source: NodeId,
    pub target: NodeId,
    pub ordinal: u64,
    pub distance: Option<f64>,
}

impl Candidate {
    fn new(source: NodeId, target: NodeId, ordinal: u64) -> Self {
        Self {
            source,
            target,
            ordinal,
            distance: None,
        }
    }
}

/// Everything a rule reads; identical on every rank
pub(crate) struct RuleContext<'a> {
    pub sources: &'a NodeCollection,
    pub targets: &'a NodeCollection,
    pub source_ids: &'a [NodeId],
    pub target_ids: &'a [NodeId],
    pub vp_map: &'a VirtualProcessMap,
    pub streams: &'a SeededStreams,
    pub call: u64,
    pub autapses: Autapses,
    pub multapses: Multapses,
    pub positions: &'a AHashMap<NodeId, Position>,
}

impl<'a> RuleContext<'a> {
    /// Target positions owned by `vp`
    fn local_targets(&self, vp: usize) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.target_ids
            .iter()
            .copied()
            .enumerate()
            .filter(move |&(_, id)| self.vp_map.vp_of(id) == vp)
    }

    #[inline]
    fn skips_autapse(&self, source: NodeId, target: NodeId) -> bool {
        self.autapses == Autapses::Forbid && source == target
    }

    /// Position of `id` in `pool` when autapses must be excluded from it
    fn excluded(&self, pool: &NodeCollection, id: NodeId) -> Option<usize> {
        match self.autapses {
            Autapses::Allow => None,
            Autapses::Forbid => pool.position(id),
        }
    }

    /// Nodes present in both collections, counted when autapses are forbidden
    fn autapse_pairs(&self) -> usize {
        match self.autapses {
            Autapses::Allow => 0,
            Autapses::Forbid => self.sources.intersection(self.targets).len(),
        }
    }
}

/// Draw `k` positions from `0..pool`, skipping `excluded`
fn draw_positions<R: Rng>(
    rng: &mut R,
    pool: usize,
    k: usize,
    multapses: Multapses,
    excluded: Option<usize>,
) -> Vec<usize> {
    if k == 0 || pool == 0 {
        return Vec::new();
    }
    let raw: Vec<usize> = match multapses {
        Multapses::Allow => (0..k).map(|_| rng.gen_range(0..pool)).collect(),
        Multapses::Forbid => index::sample(rng, pool, k).into_vec(),
    };
    raw.into_iter()
        .map(|r| match excluded {
            Some(e) if r >= e => r + 1,
            _ => r,
        })
        .collect()
}

/// Rank-independent checks run before any thread plans
pub(crate) fn validate(ctx: &RuleContext<'_>, rule: &ConnRule) -> ConnectResult<()> {
    let (num_sources, num_targets) = (ctx.source_ids.len(), ctx.target_ids.len());
    match rule {
        ConnRule::OneToOne => {
            if num_sources != num_targets {
                return Err(ConnectError::DimensionMismatch {
                    sources: num_sources,
                    targets: num_targets,
                });
            }
        }
        ConnRule::AllToAll => {}
        ConnRule::FixedIndegree { indegree } => {
            fixed_degree::validate(ctx, *indegree, num_sources, "indegree")?
        }
        ConnRule::FixedOutdegree { outdegree } => {
            fixed_degree::validate(ctx, *outdegree, num_targets, "outdegree")?
        }
        ConnRule::FixedTotalNumber { n } => fixed_total::validate(ctx, *n)?,
        ConnRule::PairwiseBernoulli { p } => bernoulli::validate_probability(*p)?,
        ConnRule::Spatial(spatial) => spatial.validate(ctx)?,
    }
    Ok(())
}

/// Accepted candidates whose targets `vp` owns, in canonical order
pub(crate) fn plan(ctx: &RuleContext<'_>, rule: &ConnRule, vp: usize) -> Vec<Candidate> {
    let mut out = Vec::new();
    match rule {
        ConnRule::OneToOne => one_to_one::plan(ctx, vp, &mut out),
        ConnRule::AllToAll => all_to_all::plan(ctx, vp, &mut out),
        ConnRule::FixedIndegree { indegree } => {
            fixed_degree::plan_indegree(ctx, *indegree, vp, &mut out)
        }
        ConnRule::FixedOutdegree { outdegree } => {
            fixed_degree::plan_outdegree(ctx, *outdegree, vp, &mut out)
        }
        ConnRule::FixedTotalNumber { n } => fixed_total::plan(ctx, *n, vp, &mut out),
        ConnRule::PairwiseBernoulli { p } => bernoulli::plan(ctx, *p, vp, &mut out),
        ConnRule::Spatial(spatial) => spatial.plan(ctx, vp, &mut out),
    }
    out
}
