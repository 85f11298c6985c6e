// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
One-to-one rule - pairs sources and targets by position.
*/

use super::{Candidate, RuleContext};

pub(super) fn plan(ctx: &RuleContext<'_>, vp: usize, out: &mut Vec<Candidate>) {
    for (j, target) in ctx.local_targets(vp) {
        let source = ctx.source_ids[j];
        if ctx.skips_autapse(source, target) {
            continue;
        }
        out.push(Candidate::new(source, target, j as u64));
    }
}
