//! Error types for pdmldb-core.
//!
//! Every subsystem has its own error enum; [`enum@Error`] wraps them all.
//! Most of these are never surfaced to the caller: the loader, typer and
//! transformer recover per line / per node / per packet and log instead.

use thiserror::Error;

/// Main error type for pdmldb-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error while loading the dissector schema catalogs
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Error while reading the PDML packet stream
    #[error("PDML error: {0}")]
    Pdml(#[from] PdmlError),

    /// Error while loading fixup rules
    #[error("fixup error: {0}")]
    Fixup(#[from] FixupError),

    /// Error while loading the write filter
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// Error in the database writer
    #[error("writer error: {0}")]
    Writer(#[from] WriterError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while parsing the dissector's schema catalogs.
///
/// These are per-line: the loader logs them and continues with the next
/// catalog line.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A catalog line had fewer columns than its record form requires
    #[error("malformed {catalog} line: {line:?}")]
    MalformedLine { catalog: &'static str, line: String },

    /// A field carried a type token outside the known FT_* set
    #[error("unknown field type token: {token}")]
    UnknownFieldType { token: String },

    /// An `F` record referenced a protocol that was never registered
    #[error("field {field} references unknown protocol {protocol}")]
    UnknownProtocol { field: String, protocol: String },

    /// Two registrations of the same protocol disagree on the filter name
    #[error("protocol {protocol} registered with conflicting filter names")]
    FilterNameConflict { protocol: String },

    /// Two registrations of the same field disagree on its type
    #[error("field {field} registered with conflicting types")]
    FieldTypeConflict { field: String },

    /// Two registrations of the same field disagree on the parent protocol
    #[error("field {field} registered under conflicting protocols")]
    FieldProtocolConflict { field: String },

    /// A value-string record referenced a field that was never registered
    #[error("value string references unknown field {field}")]
    UnknownField { field: String },

    /// An integer column could not be parsed
    #[error("invalid integer {text:?} in {catalog} line")]
    InvalidInteger { catalog: &'static str, text: String },
}

/// Errors raised while reading the PDML stream.
#[derive(Error, Debug)]
pub enum PdmlError {
    /// The underlying XML reader reported an error
    #[error("XML error: {0}")]
    Xml(#[from] xml::reader::Error),

    /// The document root was not a pdml element
    #[error("unexpected document root element: {element}")]
    UnexpectedRoot { element: String },
}

/// Errors raised while loading fixup rule files.
#[derive(Error, Debug)]
pub enum FixupError {
    /// The built-in rule blob did not start with the expected magic
    #[error("built-in rule blob has invalid magic header")]
    BadMagic,

    /// The rule file was not well-formed XML
    #[error("rule file XML error: {0}")]
    Xml(#[from] xml::reader::Error),

    /// The root element of the rule file was not <fixups>
    #[error("unexpected rule file root element: {element}")]
    UnexpectedRoot { element: String },

    /// Decompression of the built-in rule blob failed
    #[error("failed to inflate built-in rules: {0}")]
    Inflate(#[from] std::io::Error),
}

/// Errors raised while loading the write filter file.
#[derive(Error, Debug)]
pub enum FilterError {
    /// The filter file was not well-formed XML
    #[error("filter file XML error: {0}")]
    Xml(#[from] xml::reader::Error),

    /// The root element of the filter file was not <filter>
    #[error("unexpected filter file root element: {element}")]
    UnexpectedRoot { element: String },
}

/// Errors raised by the database writer and its backends.
#[derive(Error, Debug)]
pub enum WriterError {
    /// An error reported by the SQL backend
    #[error("database error: {0}")]
    Database(String),

    /// A geninfo row arrived without the columns needed for row info
    #[error("geninfo row is missing {column}")]
    MissingGeninfoColumn { column: &'static str },

    /// The consumer hit three consecutive failures and shut down
    #[error("writer failed after repeated consecutive errors")]
    ConsumerFailed,

    /// The consumer thread panicked
    #[error("writer thread panicked")]
    ConsumerPanicked,
}

impl WriterError {
    /// Wrap a backend driver error.
    pub fn database<E: std::fmt::Display>(err: E) -> Self {
        WriterError::Database(err.to_string())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
