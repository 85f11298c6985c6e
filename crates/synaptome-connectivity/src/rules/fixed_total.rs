// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Fixed total number rule - exactly `n` pairs drawn from the whole candidate space.

The draw is a single global stream. Every thread replays it in full and keeps
the pairs whose target it owns, so the total is `n` for any partitioning.
*/

use super::{Candidate, Multapses, RuleContext};
use crate::rng::StreamKey;
use crate::types::{ConnectError, ConnectResult};
use ahash::AHashSet;
use rand::Rng;

fn pool_size(ctx: &RuleContext<'_>) -> u64 {
    let full = ctx.source_ids.len() as u64 * ctx.target_ids.len() as u64;
    full - ctx.autapse_pairs() as u64
}

pub(super) fn validate(ctx: &RuleContext<'_>, n: usize) -> ConnectResult<()> {
    let pool = pool_size(ctx);
    if n > 0 && pool == 0 {
        return Err(ConnectError::InvalidDegree(format!(
            "{n} connections requested from an empty candidate space"
        )));
    }
    if ctx.multapses == Multapses::Forbid && n as u64 > pool {
        return Err(ConnectError::InvalidDegree(format!(
            "{n} connections exceed the {pool} distinct candidate pairs"
        )));
    }
    Ok(())
}

pub(super) fn plan(ctx: &RuleContext<'_>, n: usize, vp: usize, out: &mut Vec<Candidate>) {
    let (num_sources, num_targets) = (ctx.source_ids.len(), ctx.target_ids.len());
    if n == 0 || num_sources == 0 || num_targets == 0 {
        return;
    }
    let mut rng = ctx.streams.stream(StreamKey::global(ctx.call));
    let mut drawn: AHashSet<(usize, usize)> = AHashSet::new();
    let mut m = 0u64;
    while m < n as u64 {
        let j = rng.gen_range(0..num_targets);
        let i = rng.gen_range(0..num_sources);
        let (source, target) = (ctx.source_ids[i], ctx.target_ids[j]);
        if ctx.skips_autapse(source, target) {
            continue;
        }
        if ctx.multapses == Multapses::Forbid && !drawn.insert((i, j)) {
            continue;
        }
        if ctx.vp_map.vp_of(target) == vp {
            out.push(Candidate::new(source, target, m));
        }
        m += 1;
    }
}
