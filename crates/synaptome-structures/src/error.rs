// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/// Errors raised by the core data types.
///
/// # Examples
/// ```
/// use synaptome_structures::{NodeCollection, StructuresError};
///
/// let nodes = NodeCollection::from_range(1, 3).unwrap();
/// assert!(matches!(
///     nodes.slice(0, 5, 1),
///     Err(StructuresError::IndexOutOfRange { .. })
/// ));
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructuresError {
    /// Slice or position outside the collection
    #[error("Index out of range: {index} (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Invalid parameters provided to a function
    #[error("Bad parameters: {0}")]
    BadParameters(String),

    /// Identifier 0 or an identifier never created
    #[error("Unknown node: {0}")]
    UnknownNode(u64),
}

/// Result type for core data operations
pub type StructuresResult<T> = Result<T, StructuresError>;
