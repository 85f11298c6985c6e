// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Error and result types for connectivity operations.
*/

use synaptome_runtime::RuntimeError;
use synaptome_structures::StructuresError;

/// Result type for connectivity operations
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Errors that can occur during connectivity operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectError {
    #[error("Dimension mismatch: {sources} sources vs {targets} targets")]
    DimensionMismatch { sources: usize, targets: usize },

    #[error("Unknown synapse model: {0}")]
    UnknownSynapseModel(String),

    #[error("Bad delay {delay}: must be finite and at least the resolution {resolution}")]
    BadDelay { delay: f64, resolution: f64 },

    #[error("Invalid degree: {0}")]
    InvalidDegree(String),

    #[error("Bad parameter: {0}")]
    BadParameter(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Configuration locked: {0}")]
    ConfigurationLocked(String),

    #[error("Collective failure: {0}")]
    CollectiveFailure(String),

    #[error("Kernel poisoned: {0}")]
    KernelPoisoned(String),

    #[error("Unknown node: {0}")]
    UnknownNode(u64),

    #[error("Index out of range: {index} (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{rule} rejected: planning failed on rank(s) {ranks:?}, first: {first_error}")]
    Rejected {
        rule: String,
        ranks: Vec<usize>,
        first_error: String,
    },

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Storage error: {0}")]
    Storage(#[from] RuntimeError),
}

impl From<StructuresError> for ConnectError {
    fn from(err: StructuresError) -> Self {
        match err {
            StructuresError::IndexOutOfRange { index, len } => {
                ConnectError::IndexOutOfRange { index, len }
            }
            StructuresError::BadParameters(msg) => ConnectError::BadParameter(msg),
            StructuresError::UnknownNode(id) => ConnectError::UnknownNode(id),
        }
    }
}

impl From<csv::Error> for ConnectError {
    fn from(err: csv::Error) -> Self {
        ConnectError::Export(err.to_string())
    }
}

impl From<crate::collective::CollectiveError> for ConnectError {
    fn from(err: crate::collective::CollectiveError) -> Self {
        ConnectError::CollectiveFailure(err.to_string())
    }
}
