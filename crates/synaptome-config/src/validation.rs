// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures configuration values are within valid ranges before a kernel is
//! built from them.

use crate::{ConfigError, ConfigResult, SynaptomeConfig, LOG_LEVELS};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// All violations are collected and reported together.
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` with details if validation fails
pub fn validate_config(config: &SynaptomeConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_kernel(config, &mut errors);
    validate_connectivity(config, &mut errors);
    validate_logging(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_kernel(config: &SynaptomeConfig, errors: &mut Vec<ConfigValidationError>) {
    let kernel = &config.kernel;

    if kernel.num_ranks == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "kernel.num_ranks".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if kernel.threads_per_rank == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "kernel.threads_per_rank".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if !kernel.resolution.is_finite() || kernel.resolution <= 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "kernel.resolution".to_string(),
            reason: format!("must be finite and > 0 (got {})", kernel.resolution),
        });
    }
}

fn validate_connectivity(config: &SynaptomeConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.connectivity.default_synapse_model.trim().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "connectivity.default_synapse_model".to_string(),
        });
    }
}

fn validate_logging(config: &SynaptomeConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("'{}' is not one of {}", config.logging.level, LOG_LEVELS.join(", ")),
        });
    }
}
