// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Pairwise Bernoulli rule - each candidate pair is accepted independently.
*/

use super::{Candidate, RuleContext};
use crate::types::{ConnectError, ConnectResult};

pub(super) fn validate_probability(p: f64) -> ConnectResult<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(ConnectError::BadParameter(format!(
            "connection probability {p} outside [0, 1]"
        )));
    }
    Ok(())
}

pub(super) fn plan(ctx: &RuleContext<'_>, p: f64, vp: usize, out: &mut Vec<Candidate>) {
    let num_sources = ctx.source_ids.len() as u64;
    for (j, target) in ctx.local_targets(vp) {
        let mut pair = ctx.streams.pair_stream(ctx.call, j as u64);
        for (i, &source) in ctx.source_ids.iter().enumerate() {
            if ctx.skips_autapse(source, target) {
                continue;
            }
            if pair.uniform(i as u64) < p {
                out.push(Candidate::new(source, target, j as u64 * num_sources + i as u64));
            }
        }
    }
}
