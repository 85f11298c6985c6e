// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
All-to-all rule - Cartesian product of sources and targets.
*/

use super::{Candidate, RuleContext};

pub(super) fn plan(ctx: &RuleContext<'_>, vp: usize, out: &mut Vec<Candidate>) {
    let num_sources = ctx.source_ids.len() as u64;
    for (j, target) in ctx.local_targets(vp) {
        for (i, &source) in ctx.source_ids.iter().enumerate() {
            if ctx.skips_autapse(source, target) {
                continue;
            }
            out.push(Candidate::new(source, target, j as u64 * num_sources + i as u64));
        }
    }
}
