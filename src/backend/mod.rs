//! Concrete SQL backends and dispatch between them.

#[cfg(feature = "mysql")]
mod mysql;
mod sqlite;

#[cfg(feature = "mysql")]
pub use self::mysql::MysqlBackend;
pub use self::sqlite::SqliteBackend;

use pdmldb_core::writer::{ColumnDefinition, SqlBackend, SqlValue, TableDefinition};
use pdmldb_core::WriterError;

/// Enum of the available backends.
///
/// Enum dispatch keeps the writer monomorphic over one concrete type
/// while the dialect is chosen at runtime from the database argument.
pub enum AnyBackend {
    Sqlite(SqliteBackend),
    #[cfg(feature = "mysql")]
    Mysql(MysqlBackend),
}

impl AnyBackend {
    /// Connect from the `--database` argument: a `mysql://` URL or a
    /// SQLite path.
    pub fn connect(database: &str) -> Result<Self, WriterError> {
        if database.starts_with("mysql://") {
            #[cfg(feature = "mysql")]
            {
                return Ok(AnyBackend::Mysql(MysqlBackend::connect(database)?));
            }
            #[cfg(not(feature = "mysql"))]
            {
                return Err(WriterError::Database(
                    "MySQL support was not compiled in".to_string(),
                ));
            }
        }
        Ok(AnyBackend::Sqlite(SqliteBackend::open(database)?))
    }
}

/// Delegate SqlBackend methods to the inner backend.
macro_rules! delegate_backend {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            AnyBackend::Sqlite(b) => b.$method($($arg),*),
            #[cfg(feature = "mysql")]
            AnyBackend::Mysql(b) => b.$method($($arg),*),
        }
    };
}

impl SqlBackend for AnyBackend {
    fn dialect(&self) -> &'static str {
        delegate_backend!(self, dialect)
    }

    fn introspect_table(&mut self, table: &str) -> Result<Option<TableDefinition>, WriterError> {
        delegate_backend!(self, introspect_table, table)
    }

    fn create_table(&mut self, table: &TableDefinition) -> Result<(), WriterError> {
        delegate_backend!(self, create_table, table)
    }

    fn add_column(&mut self, table: &str, column: &ColumnDefinition) -> Result<(), WriterError> {
        delegate_backend!(self, add_column, table, column)
    }

    fn alter_column(&mut self, table: &str, column: &ColumnDefinition) -> Result<(), WriterError> {
        delegate_backend!(self, alter_column, table, column)
    }

    fn add_foreign_key(
        &mut self,
        table: &str,
        column: &str,
        referenced: &str,
        constraint: &str,
    ) -> Result<(), WriterError> {
        delegate_backend!(self, add_foreign_key, table, column, referenced, constraint)
    }

    fn insert_returning_id(
        &mut self,
        table: &str,
        columns: &[String],
        values: &[SqlValue],
    ) -> Result<i64, WriterError> {
        delegate_backend!(self, insert_returning_id, table, columns, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_selects_sqlite_for_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.db");
        let backend = AnyBackend::connect(path.to_str().unwrap()).unwrap();
        assert_eq!(backend.dialect(), "sqlite");
    }
}
