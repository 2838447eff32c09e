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

//! Core types for Cowtable
//!
//! This module contains the fundamental types used throughout the engine:
//!
//! - [`DataType`] - Column data types (INTEGER, TEXT, FLOAT, etc.)
//! - [`Value`] - Runtime values with type information
//! - [`Row`] - A tuple's column values
//! - [`Schema`] - Table schema definition
//! - [`SchemaColumn`] - Column definition
//! - [`Error`] - Error types for all storage operations

pub mod error;
pub mod row;
pub mod schema;
pub mod types;
pub mod value;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use row::Row;
pub use schema::{Schema, SchemaBuilder, SchemaColumn};
pub use types::DataType;
pub use value::{parse_timestamp, Value};

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Integration test: build a schema, validate rows against it
    #[test]
    fn test_schema_row_integration() {
        let schema = SchemaBuilder::new("users")
            .column("id", DataType::Integer)
            .column("name", DataType::Text)
            .nullable_column("email", DataType::Text)
            .column("active", DataType::Boolean)
            .build();

        let row = Row::from_values(vec![
            Value::integer(1),
            Value::text("Alice"),
            Value::text("alice@example.com"),
            Value::boolean(true),
        ]);
        assert!(schema.validate_row(&row).is_ok());

        let row = Row::from_values(vec![
            Value::integer(2),
            Value::text("Bob"),
            Value::null(DataType::Text),
            Value::boolean(false),
        ]);
        assert!(schema.validate_row(&row).is_ok());
    }
}
