// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Spatial rule - pairwise Bernoulli weighted by geometry.

A candidate is first tested against the deterministic [`Mask`] on the
displacement `target - source`. Survivors are accepted with probability
`p * kernel(distance)`, using the same per-pair uniform as
`pairwise_bernoulli`.
*/

use super::{bernoulli, Candidate, RuleContext};
use crate::types::{ConnectError, ConnectResult};
use serde::{Deserialize, Serialize};

/// Node position; planar layers use `z = 0`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// `self - origin`
    pub fn displacement_from(&self, origin: &Position) -> Position {
        Position::new(self.x - origin.x, self.y - origin.y, self.z - origin.z)
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Region of admissible displacements, bounds inclusive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mask {
    Rectangular {
        lower_left: [f64; 2],
        upper_right: [f64; 2],
    },
    Circular {
        radius: f64,
    },
    Box {
        lower_left: [f64; 3],
        upper_right: [f64; 3],
    },
}

impl Mask {
    pub fn contains(&self, d: &Position) -> bool {
        match self {
            Mask::Rectangular {
                lower_left,
                upper_right,
            } => {
                (lower_left[0]..=upper_right[0]).contains(&d.x)
                    && (lower_left[1]..=upper_right[1]).contains(&d.y)
            }
            Mask::Circular { radius } => d.norm() <= *radius,
            Mask::Box {
                lower_left,
                upper_right,
            } => {
                (lower_left[0]..=upper_right[0]).contains(&d.x)
                    && (lower_left[1]..=upper_right[1]).contains(&d.y)
                    && (lower_left[2]..=upper_right[2]).contains(&d.z)
            }
        }
    }

    fn validate(&self) -> ConnectResult<()> {
        let ordered = |lo: &[f64], hi: &[f64]| lo.iter().zip(hi).all(|(l, h)| l <= h);
        let ok = match self {
            Mask::Rectangular {
                lower_left,
                upper_right,
            } => ordered(lower_left, upper_right),
            Mask::Circular { radius } => *radius >= 0.0,
            Mask::Box {
                lower_left,
                upper_right,
            } => ordered(lower_left, upper_right),
        };
        if ok {
            Ok(())
        } else {
            Err(ConnectError::BadParameter(format!("malformed mask {self:?}")))
        }
    }
}

/// Distance-dependent acceptance factor, clamped to `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceKernel {
    Constant,
    /// `c + a * d`
    Linear { a: f64, c: f64 },
    /// `exp(-d / tau)`
    Exponential { tau: f64 },
    /// `exp(-d^2 / (2 sigma^2))`
    Gaussian { sigma: f64 },
}

impl DistanceKernel {
    pub fn value(&self, distance: f64) -> f64 {
        let raw = match *self {
            DistanceKernel::Constant => 1.0,
            DistanceKernel::Linear { a, c } => c + a * distance,
            DistanceKernel::Exponential { tau } => (-distance / tau).exp(),
            DistanceKernel::Gaussian { sigma } => {
                (-(distance * distance) / (2.0 * sigma * sigma)).exp()
            }
        };
        raw.clamp(0.0, 1.0)
    }

    fn validate(&self) -> ConnectResult<()> {
        match *self {
            DistanceKernel::Exponential { tau } if !(tau > 0.0) => Err(
                ConnectError::BadParameter(format!("exponential kernel needs tau > 0, got {tau}")),
            ),
            DistanceKernel::Gaussian { sigma } if !(sigma > 0.0) => Err(
                ConnectError::BadParameter(format!("gaussian kernel needs sigma > 0, got {sigma}")),
            ),
            DistanceKernel::Linear { a, c } if !a.is_finite() || !c.is_finite() => Err(
                ConnectError::BadParameter("linear kernel needs finite coefficients".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialRule {
    pub p: f64,
    pub kernel: DistanceKernel,
    pub mask: Option<Mask>,
}

impl SpatialRule {
    pub fn new(p: f64, kernel: DistanceKernel) -> Self {
        Self {
            p,
            kernel,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub(super) fn validate(&self, ctx: &RuleContext<'_>) -> ConnectResult<()> {
        bernoulli::validate_probability(self.p)?;
        self.kernel.validate()?;
        if let Some(mask) = &self.mask {
            mask.validate()?;
        }
        let unplaced = ctx
            .source_ids
            .iter()
            .chain(ctx.target_ids)
            .find(|id| !ctx.positions.contains_key(*id));
        if let Some(id) = unplaced {
            return Err(ConnectError::BadParameter(format!(
                "spatial rule needs a position for node {id}"
            )));
        }
        Ok(())
    }

    pub(super) fn plan(&self, ctx: &RuleContext<'_>, vp: usize, out: &mut Vec<Candidate>) {
        let num_sources = ctx.source_ids.len() as u64;
        for (j, target) in ctx.local_targets(vp) {
            let Some(target_pos) = ctx.positions.get(&target) else {
                continue;
            };
            let mut pair = ctx.streams.pair_stream(ctx.call, j as u64);
            for (i, &source) in ctx.source_ids.iter().enumerate() {
                if ctx.skips_autapse(source, target) {
                    continue;
                }
                let Some(source_pos) = ctx.positions.get(&source) else {
                    continue;
                };
                let displacement = target_pos.displacement_from(source_pos);
                if let Some(mask) = &self.mask {
                    if !mask.contains(&displacement) {
                        continue;
                    }
                }
                let distance = displacement.norm();
                if pair.uniform(i as u64) < self.p * self.kernel.value(distance) {
                    out.push(Candidate {
                        source,
                        target,
                        ordinal: j as u64 * num_sources + i as u64,
                        distance: Some(distance),
                    });
                }
            }
        }
    }
}
