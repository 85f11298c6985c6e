// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime error types

/// Errors raised by connection storage
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("Connection index {index} out of bounds (count: {count})")]
    InvalidIndex { index: usize, count: usize },

    #[error("Connection {0} has been disconnected")]
    Tombstoned(usize),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: f64 },
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
