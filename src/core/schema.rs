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

//! Schema types for Cowtable - table and column definitions

use std::fmt;
use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use super::error::{Error, Result};
use super::row::Row;
use super::types::DataType;

/// A column definition in a table schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    /// Unique identifier for the column (0-based index)
    pub id: usize,

    /// Column name
    pub name: String,

    /// Data type of the column
    pub data_type: DataType,

    /// Whether the column can contain NULL values
    pub nullable: bool,
}

impl SchemaColumn {
    /// Create a new column definition
    pub fn new(id: usize, name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            id,
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

impl fmt::Display for SchemaColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)?;
        if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

/// Table schema definition
#[derive(Debug)]
pub struct Schema {
    /// Name of the table
    pub table_name: String,

    /// Column definitions
    pub columns: Vec<SchemaColumn>,

    /// Cached column index map (lowercase name -> index) for O(1) column lookup
    column_index_map_cache: OnceLock<FxHashMap<String, usize>>,
}

impl Clone for Schema {
    fn clone(&self) -> Self {
        Self {
            table_name: self.table_name.clone(),
            columns: self.columns.clone(),
            column_index_map_cache: OnceLock::new(), // Recomputed lazily
        }
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.table_name == other.table_name && self.columns == other.columns
    }
}

impl Eq for Schema {}

impl Schema {
    /// Create a new schema with the given table name and columns
    pub fn new(table_name: impl Into<String>, columns: Vec<SchemaColumn>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
            column_index_map_cache: OnceLock::new(),
        }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if the schema has any columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Find a column index by name (case-insensitive)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let map = self.column_index_map_cache.get_or_init(|| {
            self.columns
                .iter()
                .enumerate()
                .map(|(i, col)| (col.name.to_lowercase(), i))
                .collect()
        });
        map.get(&name.to_lowercase()).copied()
    }

    /// Get a column by index
    pub fn get_column(&self, index: usize) -> Option<&SchemaColumn> {
        self.columns.get(index)
    }

    /// Validate a row against this schema
    ///
    /// Checks arity, NULL discipline and value types. A NULL value is
    /// accepted for nullable columns regardless of its type hint.
    pub fn validate_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::table_columns_not_match(
                self.columns.len(),
                row.len(),
            ));
        }
        for (column, value) in self.columns.iter().zip(row.iter()) {
            if value.is_null() {
                if !column.nullable {
                    return Err(Error::not_null_constraint(&column.name));
                }
                continue;
            }
            let got = value.data_type();
            if got != column.data_type {
                return Err(Error::type_mismatch(&column.name, column.data_type, got));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.table_name)?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", col)?;
        }
        write!(f, ")")
    }
}

/// Builder for constructing schemas
pub struct SchemaBuilder {
    table_name: String,
    columns: Vec<SchemaColumn>,
}

impl SchemaBuilder {
    /// Create a new builder for the given table name
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }

    /// Add a non-nullable column
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        let id = self.columns.len();
        self.columns
            .push(SchemaColumn::new(id, name, data_type, false));
        self
    }

    /// Add a nullable column
    pub fn nullable_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        let id = self.columns.len();
        self.columns
            .push(SchemaColumn::new(id, name, data_type, true));
        self
    }

    /// Build the schema
    pub fn build(self) -> Schema {
        Schema::new(self.table_name, self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    fn test_schema() -> Schema {
        SchemaBuilder::new("inventory")
            .column("id", DataType::Integer)
            .column("name", DataType::Text)
            .nullable_column("qty", DataType::Integer)
            .build()
    }

    #[test]
    fn test_schema_builder() {
        let schema = test_schema();
        assert_eq!(schema.column_count(), 3);
        assert_eq!(schema.columns[0].name, "id");
        assert!(!schema.columns[0].nullable);
        assert!(schema.columns[2].nullable);
    }

    #[test]
    fn test_column_index_lookup() {
        let schema = test_schema();
        assert_eq!(schema.column_index("name"), Some(1));
        assert_eq!(schema.column_index("NAME"), Some(1));
        assert_eq!(schema.column_index("missing"), None);
    }

    #[test]
    fn test_validate_row_ok() {
        let schema = test_schema();
        let row = Row::from_values(vec![
            Value::integer(1),
            Value::text("widget"),
            Value::null(DataType::Integer),
        ]);
        assert!(schema.validate_row(&row).is_ok());
    }

    #[test]
    fn test_validate_row_arity() {
        let schema = test_schema();
        let row = Row::from_values(vec![Value::integer(1)]);
        assert_eq!(
            schema.validate_row(&row),
            Err(Error::table_columns_not_match(3, 1))
        );
    }

    #[test]
    fn test_validate_row_null_constraint() {
        let schema = test_schema();
        let row = Row::from_values(vec![
            Value::integer(1),
            Value::null_unknown(),
            Value::integer(2),
        ]);
        assert_eq!(
            schema.validate_row(&row),
            Err(Error::not_null_constraint("name"))
        );
    }

    #[test]
    fn test_validate_row_type_mismatch() {
        let schema = test_schema();
        let row = Row::from_values(vec![
            Value::text("oops"),
            Value::text("widget"),
            Value::integer(2),
        ]);
        assert!(matches!(
            schema.validate_row(&row),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_schema_display() {
        let schema = test_schema();
        let s = schema.to_string();
        assert!(s.starts_with("inventory ("));
        assert!(s.contains("id INTEGER NOT NULL"));
        assert!(s.contains("qty INTEGER"));
    }
}
