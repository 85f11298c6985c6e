// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Synapse models known to the kernel and the per-call synapse specification.
*/

use crate::parameters::ParameterSpec;
use crate::types::{ConnectError, ConnectResult};
use serde::{Deserialize, Serialize};
use synaptome_runtime::SynapseModelId;

/// Models registered at kernel construction, in id order
pub const BUILTIN_SYNAPSE_MODELS: &[SynapseModelInfo] = &[
    SynapseModelInfo {
        name: "static_synapse",
        homogeneous_weight: false,
    },
    SynapseModelInfo {
        name: "static_synapse_hom_w",
        homogeneous_weight: true,
    },
    SynapseModelInfo {
        name: "stdp_synapse",
        homogeneous_weight: false,
    },
    SynapseModelInfo {
        name: "tsodyks_synapse",
        homogeneous_weight: false,
    },
    SynapseModelInfo {
        name: "bernoulli_synapse",
        homogeneous_weight: false,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynapseModelInfo {
    pub name: &'static str,
    /// Every connection of the model shares one weight
    pub homogeneous_weight: bool,
}

/// Name <-> id lookup for synapse models
#[derive(Debug, Clone)]
pub struct SynapseModelRegistry {
    models: Vec<SynapseModelInfo>,
}

impl Default for SynapseModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SynapseModelRegistry {
    pub fn builtin() -> Self {
        Self {
            models: BUILTIN_SYNAPSE_MODELS.to_vec(),
        }
    }

    pub fn lookup(&self, name: &str) -> ConnectResult<SynapseModelId> {
        self.models
            .iter()
            .position(|m| m.name == name)
            .map(|idx| SynapseModelId(idx as u16))
            .ok_or_else(|| ConnectError::UnknownSynapseModel(name.to_string()))
    }

    pub fn info(&self, id: SynapseModelId) -> Option<&SynapseModelInfo> {
        self.models.get(id.0 as usize)
    }

    pub fn name(&self, id: SynapseModelId) -> &'static str {
        self.info(id).map_or("<unknown>", |m| m.name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.models.iter().map(|m| m.name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Synapse part of a connect call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynSpec {
    pub model: String,
    pub weight: ParameterSpec,
    pub delay: ParameterSpec,
}

impl Default for SynSpec {
    fn default() -> Self {
        Self {
            model: "static_synapse".to_string(),
            weight: ParameterSpec::Constant(1.0),
            delay: ParameterSpec::Constant(1.0),
        }
    }
}

impl SynSpec {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_weight(mut self, weight: impl Into<ParameterSpec>) -> Self {
        self.weight = weight.into();
        self
    }

    pub fn with_delay(mut self, delay: impl Into<ParameterSpec>) -> Self {
        self.delay = delay.into();
        self
    }
}
