//! # pdmldb-core
//!
//! Core engine for loading dissected packet captures into a relational
//! database. The dissector itself is external; this crate consumes its
//! two textual artifacts:
//!
//! - four tab-delimited schema catalogs (protocols, fields, value
//!   strings, decodes), parsed into a queryable [`schema::SchemaModel`]
//! - a streamed PDML packet document, reshaped per packet into related
//!   relational rows
//!
//! Rows flow through a bounded [`queue::RowQueue`] into the background
//! [`writer::DbWriter`], which discovers tables and columns on demand,
//! widens column types monotonically and maintains parent and
//! source-file links. SQL dialects plug in through the narrow
//! [`writer::SqlBackend`] trait; this crate carries no driver
//! dependencies.
//!
//! ## Pipeline
//!
//! ```text
//! catalogs ──> SchemaModel ─┐
//!                           v
//! PDML ──> PdmlReader ──> fixups + typing ──> flatten ──> RowQueue ──> DbWriter ──> SQL
//! ```

pub mod error;
pub mod filter;
pub mod fixup;
pub mod pdml;
pub mod queue;
pub mod row;
pub mod schema;
pub mod text;
pub mod value;
pub mod writer;

pub use error::{Error, FilterError, FixupError, PdmlError, Result, SchemaError, WriterError};
pub use filter::WriteFilter;
pub use fixup::FixupEngine;
pub use pdml::{PacketTransformer, TransformStats};
pub use queue::RowQueue;
pub use row::{ColumnValue, DataRow};
pub use schema::{FieldType, SchemaModel};
pub use value::TypedValue;
pub use writer::{
    ColumnDefinition, DbWriter, SqlBackend, SqlType, SqlValue, TableDefinition, WriterConfig,
    WriterStats,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
