// Copyright 2025 Cowtable Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for Cowtable
//!
//! This module defines all error types used throughout the storage engine.
//! Expected outcomes (end of a scan, a deferred delete, a failed snapshot
//! reconciliation) are carried by `bool`/`Option` returns; `Error` is for
//! caller mistakes the mutation API can reject.

use thiserror::Error;

use super::types::DataType;
use crate::storage::block::{BlockId, TupleAddress};

/// Result type alias for Cowtable operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Cowtable storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Tuple and block errors
    // =========================================================================
    /// No live tuple at the given address
    #[error("no live tuple at {0}")]
    TupleNotFound(TupleAddress),

    /// Block not found in the table's block directory
    #[error("{0} not found")]
    BlockNotFound(BlockId),

    /// Table column count mismatch
    #[error("table columns don't match, expected {expected}, got {got}")]
    TableColumnsNotMatch { expected: usize, got: usize },

    // =========================================================================
    // Constraint errors
    // =========================================================================
    /// NOT NULL constraint violation
    #[error("not null constraint failed for column {column}")]
    NotNullConstraint { column: String },

    /// Value type does not match the column type
    #[error("type mismatch for column {column}: expected {expected}, got {got}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        got: DataType,
    },

    // =========================================================================
    // Other errors
    // =========================================================================
    /// Internal error for unexpected conditions
    #[error("{message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new TableColumnsNotMatch error
    pub fn table_columns_not_match(expected: usize, got: usize) -> Self {
        Error::TableColumnsNotMatch { expected, got }
    }

    /// Create a new NotNullConstraint error
    pub fn not_null_constraint(column: impl Into<String>) -> Self {
        Error::NotNullConstraint {
            column: column.into(),
        }
    }

    /// Create a new TypeMismatch error
    pub fn type_mismatch(column: impl Into<String>, expected: DataType, got: DataType) -> Self {
        Error::TypeMismatch {
            column: column.into(),
            expected,
            got,
        }
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::TupleNotFound(_) | Error::BlockNotFound(_))
    }

    /// Check if this is a constraint violation error
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::NotNullConstraint { .. } | Error::TypeMismatch { .. }
        )
    }
}
