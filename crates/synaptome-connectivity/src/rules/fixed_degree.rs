// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Fixed in-degree and fixed out-degree rules.

In-degree draws are keyed by the target position, so a thread only draws for
the targets it owns. Out-degree draws are keyed by the source position; every
thread replays all of them and keeps the targets it owns.
*/

use super::{draw_positions, Candidate, Multapses, RuleContext};
use crate::rng::StreamKey;
use crate::types::{ConnectError, ConnectResult};

/// Degree `k` must fit the smallest pool any node sees
pub(super) fn validate(
    ctx: &RuleContext<'_>,
    k: usize,
    pool_len: usize,
    what: &str,
) -> ConnectResult<()> {
    let smallest_pool = if ctx.autapse_pairs() > 0 {
        pool_len.saturating_sub(1)
    } else {
        pool_len
    };
    if k > 0 && smallest_pool == 0 {
        return Err(ConnectError::InvalidDegree(format!(
            "{what} {k} requested from an empty candidate pool"
        )));
    }
    if ctx.multapses == Multapses::Forbid && k > smallest_pool {
        return Err(ConnectError::InvalidDegree(format!(
            "{what} {k} exceeds the candidate pool of {smallest_pool} without multapses"
        )));
    }
    Ok(())
}

pub(super) fn plan_indegree(ctx: &RuleContext<'_>, k: usize, vp: usize, out: &mut Vec<Candidate>) {
    let num_sources = ctx.source_ids.len();
    for (j, target) in ctx.local_targets(vp) {
        let excluded = ctx.excluded(ctx.sources, target);
        let pool = num_sources - usize::from(excluded.is_some());
        let mut rng = ctx.streams.stream(StreamKey::topology(ctx.call, j as u64));
        let drawn = draw_positions(&mut rng, pool, k, ctx.multapses, excluded);
        for (m, i) in drawn.into_iter().enumerate() {
            let ordinal = (j * k + m) as u64;
            out.push(Candidate::new(ctx.source_ids[i], target, ordinal));
        }
    }
}

pub(super) fn plan_outdegree(ctx: &RuleContext<'_>, k: usize, vp: usize, out: &mut Vec<Candidate>) {
    let num_targets = ctx.target_ids.len();
    for (i, &source) in ctx.source_ids.iter().enumerate() {
        let excluded = ctx.excluded(ctx.targets, source);
        let pool = num_targets - usize::from(excluded.is_some());
        let mut rng = ctx.streams.stream(StreamKey::topology(ctx.call, i as u64));
        let drawn = draw_positions(&mut rng, pool, k, ctx.multapses, excluded);
        for (m, j) in drawn.into_iter().enumerate() {
            let target = ctx.target_ids[j];
            if ctx.vp_map.vp_of(target) == vp {
                out.push(Candidate::new(source, target, (i * k + m) as u64));
            }
        }
    }
}
