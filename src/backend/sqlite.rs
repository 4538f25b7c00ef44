//! SQLite backend.
//!
//! SQLite's type affinity already stores any widened value, so
//! `alter_column` is a no-op; and constraints cannot be added to an
//! existing table, so foreign keys are logged and skipped. The writer
//! still tracks the lattice so switching backends keeps the same
//! behavior.

use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use pdmldb_core::writer::{ColumnDefinition, SqlBackend, SqlType, SqlValue, TableDefinition};
use pdmldb_core::WriterError;

/// Writer backend over a SQLite database file.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open (creating if needed) a SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WriterError> {
        let conn = Connection::open(path.as_ref()).map_err(WriterError::database)?;
        Ok(Self { conn })
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn type_sql(sql_type: SqlType) -> &'static str {
    match sql_type {
        SqlType::Bit | SqlType::Int32 | SqlType::Int64 => "INTEGER",
        SqlType::Float => "REAL",
        // SQLite has no DECIMAL; TEXT keeps 20-digit values exact
        SqlType::BigNumeric => "TEXT",
        SqlType::Timestamp | SqlType::Guid | SqlType::String { .. } => "TEXT",
    }
}

/// Best-effort reverse mapping for catalog introspection.
fn type_from_decl(decl: &str) -> SqlType {
    match decl.to_ascii_uppercase().as_str() {
        "INTEGER" => SqlType::Int64,
        "REAL" => SqlType::Float,
        _ => SqlType::degraded(),
    }
}

fn bind(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Integer(*b as i64),
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::UInt(u) => match i64::try_from(*u) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Text(u.to_string()),
        },
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
    }
}

impl SqlBackend for SqliteBackend {
    fn dialect(&self) -> &'static str {
        "sqlite"
    }

    fn introspect_table(&mut self, table: &str) -> Result<Option<TableDefinition>, WriterError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote(table)))
            .map_err(WriterError::database)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })
            .map_err(WriterError::database)?;

        let mut def = TableDefinition::new(table);
        def.committed = true;
        let mut exists = false;
        for row in rows {
            let (name, decl) = row.map_err(WriterError::database)?;
            exists = true;
            if name == "_id" {
                continue;
            }
            def.columns.push(ColumnDefinition {
                name,
                sql_type: type_from_decl(&decl),
                committed: true,
            });
        }
        // PRAGMA returns no rows at all for a missing table
        if !exists {
            return Ok(None);
        }
        Ok(Some(def))
    }

    fn create_table(&mut self, table: &TableDefinition) -> Result<(), WriterError> {
        let mut columns = vec![format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            quote("_id")
        )];
        columns.extend(
            table
                .columns
                .iter()
                .map(|c| format!("{} {}", quote(&c.name), type_sql(c.sql_type))),
        );
        let sql = format!("CREATE TABLE {} ({})", quote(&table.name), columns.join(", "));
        self.conn
            .execute(&sql, [])
            .map_err(WriterError::database)?;
        Ok(())
    }

    fn add_column(&mut self, table: &str, column: &ColumnDefinition) -> Result<(), WriterError> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote(table),
            quote(&column.name),
            type_sql(column.sql_type)
        );
        self.conn
            .execute(&sql, [])
            .map_err(WriterError::database)?;
        Ok(())
    }

    fn alter_column(&mut self, table: &str, column: &ColumnDefinition) -> Result<(), WriterError> {
        // type affinity already admits the widened values
        debug!(table, column = %column.name, "sqlite: column widening is a no-op");
        Ok(())
    }

    fn add_foreign_key(
        &mut self,
        table: &str,
        column: &str,
        referenced: &str,
        _constraint: &str,
    ) -> Result<(), WriterError> {
        debug!(
            table,
            column, referenced, "sqlite: cannot add a foreign key to an existing table; skipped"
        );
        Ok(())
    }

    fn insert_returning_id(
        &mut self,
        table: &str,
        columns: &[String],
        values: &[SqlValue],
    ) -> Result<i64, WriterError> {
        if columns.is_empty() {
            let sql = format!("INSERT INTO {} DEFAULT VALUES", quote(table));
            self.conn
                .execute(&sql, [])
                .map_err(WriterError::database)?;
        } else {
            let names: Vec<String> = columns.iter().map(|c| quote(c)).collect();
            let placeholders: Vec<String> =
                (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(table),
                names.join(", "),
                placeholders.join(", ")
            );
            self.conn
                .execute(&sql, params_from_iter(values.iter().map(bind)))
                .map_err(WriterError::database)?;
        }
        Ok(self.conn.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_backend() -> SqliteBackend {
        SqliteBackend {
            conn: Connection::open_in_memory().unwrap(),
        }
    }

    fn text_column(name: &str) -> ColumnDefinition {
        ColumnDefinition {
            name: name.to_string(),
            sql_type: SqlType::String {
                wide: true,
                precision: 250,
            },
            committed: false,
        }
    }

    #[test]
    fn test_create_insert_and_introspect() {
        let mut backend = memory_backend();
        let mut def = TableDefinition::new("t");
        def.columns.push(text_column("c"));
        backend.create_table(&def).unwrap();

        let id = backend
            .insert_returning_id(
                "t",
                &["c".to_string()],
                &[SqlValue::Text("hello".into())],
            )
            .unwrap();
        assert_eq!(id, 1);
        let id = backend
            .insert_returning_id("t", &["c".to_string()], &[SqlValue::Null])
            .unwrap();
        assert_eq!(id, 2);

        let introspected = backend.introspect_table("t").unwrap().unwrap();
        assert_eq!(introspected.columns.len(), 1);
        assert_eq!(introspected.columns[0].name, "c");
        assert!(backend.introspect_table("missing").unwrap().is_none());
    }

    #[test]
    fn test_add_column_and_empty_insert() {
        let mut backend = memory_backend();
        let def = TableDefinition::new("t");
        backend.create_table(&def).unwrap();
        backend.add_column("t", &text_column("later")).unwrap();
        let id = backend.insert_returning_id("t", &[], &[]).unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_uint_beyond_i64_binds_as_text() {
        let mut backend = memory_backend();
        let mut def = TableDefinition::new("t");
        def.columns.push(ColumnDefinition {
            name: "big".to_string(),
            sql_type: SqlType::BigNumeric,
            committed: false,
        });
        backend.create_table(&def).unwrap();
        backend
            .insert_returning_id("t", &["big".to_string()], &[SqlValue::UInt(u64::MAX)])
            .unwrap();
        let text: String = backend
            .conn
            .query_row("SELECT big FROM t", [], |r| r.get(0))
            .unwrap();
        assert_eq!(text, u64::MAX.to_string());
    }
}
