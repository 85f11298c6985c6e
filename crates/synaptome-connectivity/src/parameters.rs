// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Weight and delay specifications.

A [`ParameterSpec`] is resolved once per accepted edge. Random variants draw
from the edge's parameter stream (keyed by the edge ordinal), so the value an
edge receives does not depend on which thread or rank created it.
*/

use crate::types::{ConnectError, ConnectResult};
use rand::Rng;
use rand_distr::{Distribution, Exp, LogNormal, Normal};
use serde::{Deserialize, Serialize};

/// How a per-connection scalar is produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterSpec {
    Constant(f64),
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Exponential { lambda: f64 },
    /// `offset + slope * distance`; spatial rules only
    DistanceLinear { offset: f64, slope: f64 },
    /// One value per canonical ordinal
    Array(Vec<f64>),
}

impl From<f64> for ParameterSpec {
    fn from(value: f64) -> Self {
        ParameterSpec::Constant(value)
    }
}

/// What a spec may depend on besides the random stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeContext {
    pub ordinal: u64,
    pub distance: Option<f64>,
}

impl ParameterSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ParameterSpec::Constant(_) => "constant",
            ParameterSpec::Uniform { .. } => "uniform",
            ParameterSpec::Normal { .. } => "normal",
            ParameterSpec::LogNormal { .. } => "lognormal",
            ParameterSpec::Exponential { .. } => "exponential",
            ParameterSpec::DistanceLinear { .. } => "distance_linear",
            ParameterSpec::Array(_) => "array",
        }
    }

    /// Whether resolving this spec consumes random numbers
    pub fn is_random(&self) -> bool {
        matches!(
            self,
            ParameterSpec::Uniform { .. }
                | ParameterSpec::Normal { .. }
                | ParameterSpec::LogNormal { .. }
                | ParameterSpec::Exponential { .. }
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ParameterSpec::Array(_))
    }

    /// Check the distribution parameters without drawing
    pub fn validate(&self, name: &str) -> ConnectResult<()> {
        let bad = |msg: String| Err(ConnectError::BadParameter(format!("{name}: {msg}")));
        match *self {
            ParameterSpec::Constant(v) if !v.is_finite() => {
                bad(format!("constant {v} is not finite"))
            }
            ParameterSpec::Uniform { low, high }
                if !(low.is_finite() && high.is_finite() && low < high) =>
            {
                bad(format!("uniform requires finite low < high, got [{low}, {high})"))
            }
            ParameterSpec::Normal { mean, std }
                if !(mean.is_finite() && std.is_finite() && std >= 0.0) =>
            {
                bad(format!("normal requires finite mean and std >= 0, got ({mean}, {std})"))
            }
            ParameterSpec::LogNormal { mu, sigma }
                if !(mu.is_finite() && sigma.is_finite() && sigma >= 0.0) =>
            {
                bad(format!("lognormal requires finite mu and sigma >= 0, got ({mu}, {sigma})"))
            }
            ParameterSpec::Exponential { lambda } if !(lambda.is_finite() && lambda > 0.0) => {
                bad(format!("exponential requires lambda > 0, got {lambda}"))
            }
            ParameterSpec::DistanceLinear { offset, slope }
                if !(offset.is_finite() && slope.is_finite()) =>
            {
                bad(format!("distance_linear requires finite coefficients, got ({offset}, {slope})"))
            }
            ParameterSpec::Array(ref values) if values.iter().any(|v| !v.is_finite()) => {
                bad("array contains a non-finite value".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Value of one edge when no random numbers are needed
    pub fn fixed_value(&self, edge: EdgeContext) -> ConnectResult<Option<f64>> {
        let value = match self {
            ParameterSpec::Constant(v) => *v,
            ParameterSpec::DistanceLinear { offset, slope } => {
                let distance = edge.distance.ok_or_else(|| {
                    ConnectError::BadParameter(
                        "distance_linear requires a spatial rule".to_string(),
                    )
                })?;
                offset + slope * distance
            }
            ParameterSpec::Array(values) => {
                let index = edge.ordinal as usize;
                *values.get(index).ok_or(ConnectError::IndexOutOfRange {
                    index,
                    len: values.len(),
                })?
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// Resolve the value of one edge
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, edge: EdgeContext) -> ConnectResult<f64> {
        if let Some(value) = self.fixed_value(edge)? {
            return Ok(value);
        }
        let value = match self {
            ParameterSpec::Uniform { low, high } => rng.gen_range(*low..*high),
            ParameterSpec::Normal { mean, std } => Normal::new(*mean, *std)
                .map_err(|e| ConnectError::BadParameter(format!("normal: {e}")))?
                .sample(rng),
            ParameterSpec::LogNormal { mu, sigma } => LogNormal::new(*mu, *sigma)
                .map_err(|e| ConnectError::BadParameter(format!("lognormal: {e}")))?
                .sample(rng),
            ParameterSpec::Exponential { lambda } => Exp::new(*lambda)
                .map_err(|e| ConnectError::BadParameter(format!("exponential: {e}")))?
                .sample(rng),
            other => {
                return Err(ConnectError::BadParameter(format!(
                    "{} has no distribution",
                    other.kind()
                )))
            }
        };
        Ok(value)
    }
}

/// Value applied by `set_connection_weight` / `set_connection_delay`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Scalar(f64),
    /// One value per matching connection, in canonical order
    Array(Vec<f64>),
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Scalar(value)
    }
}
