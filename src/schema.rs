//! Declarative table shapes shared by the sinks and the load-script generator.

use arrow::datatypes::{DataType, Field, Schema};
use serde::Serialize;

/// Column type as the destination database should see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SemanticType {
    Text,
    Integer,
    Bigint,
    Real,
    Boolean,
    /// Timestamps stay as the source text; the database parses them on load.
    Timestamp,
    /// Serialized verbatim as JSON text.
    Json,
}

impl SemanticType {
    pub fn sql_name(self) -> &'static str {
        match self {
            SemanticType::Text => "TEXT",
            SemanticType::Integer => "INTEGER",
            SemanticType::Bigint => "BIGINT",
            SemanticType::Real => "REAL",
            SemanticType::Boolean => "BOOLEAN",
            SemanticType::Timestamp => "TIMESTAMP",
            SemanticType::Json => "JSON",
        }
    }

    pub fn arrow_type(self) -> DataType {
        match self {
            SemanticType::Text | SemanticType::Timestamp | SemanticType::Json => DataType::Utf8,
            SemanticType::Integer | SemanticType::Bigint => DataType::Int64,
            SemanticType::Real => DataType::Float64,
            SemanticType::Boolean => DataType::Boolean,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
}

/// Ordered column list of one output table.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct RowSchema {
    pub table: &'static str,
    pub columns: &'static [ColumnDef],
}

impl RowSchema {
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    /// Arrow schema for the parquet sink. Every column is nullable.
    pub fn to_arrow(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| Field::new(c.name, c.semantic_type.arrow_type(), true))
                .collect::<Vec<_>>(),
        )
    }
}

/// Declares a `RowSchema` constant with less boilerplate:
///
/// ```ignore
/// row_schema!(AUTHORS_IDS = "authors_ids" {
///     "author_id" => Text;
///     "mag" => Bigint;
/// });
/// ```
#[macro_export]
macro_rules! row_schema {
    ($ident:ident = $table:literal { $($name:literal => $ty:ident);* $(;)? }) => {
        pub static $ident: $crate::schema::RowSchema = $crate::schema::RowSchema {
            table: $table,
            columns: &[
                $($crate::schema::ColumnDef {
                    name: $name,
                    semantic_type: $crate::schema::SemanticType::$ty,
                },)*
            ],
        };
    };
}
