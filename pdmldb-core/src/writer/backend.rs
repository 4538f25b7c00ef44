//! The narrow seam between the writer and a SQL dialect.
//!
//! The writer drives schema evolution and inserts exclusively through
//! this trait; each backend owns its dialect's type strings, identifier
//! quoting and placeholder marshalling.

use crate::error::WriterError;

use super::table::{ColumnDefinition, TableDefinition};

/// A value bound to an insert parameter, already converted for the
/// column's SQL type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

/// A SQL dialect the writer can target.
///
/// Implementations are exclusive to the consumer thread; no interior
/// synchronization is required.
pub trait SqlBackend {
    /// Short dialect name for logs.
    fn dialect(&self) -> &'static str;

    /// Load a table's definition from the database catalog, or `None`
    /// when the table does not exist.
    fn introspect_table(&mut self, table: &str) -> Result<Option<TableDefinition>, WriterError>;

    /// Create a table with an auto-increment `_id` primary key plus the
    /// given columns.
    fn create_table(&mut self, table: &TableDefinition) -> Result<(), WriterError>;

    /// Add a column to an existing table.
    fn add_column(&mut self, table: &str, column: &ColumnDefinition) -> Result<(), WriterError>;

    /// Widen an existing column to the carried type.
    fn alter_column(&mut self, table: &str, column: &ColumnDefinition) -> Result<(), WriterError>;

    /// Add a foreign key from `table.column` to `referenced(_id)`.
    fn add_foreign_key(
        &mut self,
        table: &str,
        column: &str,
        referenced: &str,
        constraint: &str,
    ) -> Result<(), WriterError>;

    /// Insert a row and return its `_id`.
    fn insert_returning_id(
        &mut self,
        table: &str,
        columns: &[String],
        values: &[SqlValue],
    ) -> Result<i64, WriterError>;
}
