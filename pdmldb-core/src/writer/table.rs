//! Table and column definitions, and the column-type widening lattice.
//!
//! Column types only ever move up the lattice:
//!
//! - strings grow in bucketed precision (250/500/1000/2000/4000, with
//!   8000 for the 8-bit family), never shrink
//! - `int32 → int64 → bignumeric(20,0)`
//! - incompatible transitions degrade to `string(4000)`, which is a
//!   fixed point

use crate::row::ColumnValue;
use crate::value::TypedValue;

/// Backend-agnostic SQL column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    /// Single bit / boolean
    Bit,
    Int32,
    Int64,
    /// NUMERIC(20,0); wide enough for unsigned 64-bit
    BigNumeric,
    Float,
    /// Seven-digit-fraction timestamp
    Timestamp,
    Guid,
    /// Variable-length string; `wide` selects the 16-bit character
    /// family (NVARCHAR) over the 8-bit one (VARCHAR)
    String { wide: bool, precision: u32 },
}

/// String precision buckets.
const BUCKETS: [u32; 5] = [250, 500, 1000, 2000, 4000];

/// Precision cap for the 16-bit string family.
pub const MAX_WIDE_PRECISION: u32 = 4000;
/// Precision cap for the 8-bit string family.
pub const MAX_NARROW_PRECISION: u32 = 8000;

impl SqlType {
    /// Smallest string bucket holding `len` characters.
    pub fn string_for_len(len: usize, wide: bool) -> SqlType {
        let cap = if wide { MAX_WIDE_PRECISION } else { MAX_NARROW_PRECISION };
        let precision = BUCKETS
            .iter()
            .copied()
            .find(|&b| len as u64 <= b as u64)
            .unwrap_or(cap)
            .min(cap);
        // the narrow family has one extra bucket beyond 4000
        let precision = if !wide && len as u64 > 4000 {
            MAX_NARROW_PRECISION
        } else {
            precision
        };
        SqlType::String { wide, precision }
    }

    /// The terminal degraded type.
    pub fn degraded() -> SqlType {
        SqlType::String {
            wide: true,
            precision: MAX_WIDE_PRECISION,
        }
    }

    /// Target type for a single typed value.
    pub fn for_value(value: &TypedValue) -> SqlType {
        match value {
            TypedValue::Bool(_) => SqlType::Bit,
            TypedValue::UInt8(_)
            | TypedValue::UInt16(_)
            | TypedValue::Int8(_)
            | TypedValue::Int16(_)
            | TypedValue::Int32(_) => SqlType::Int32,
            TypedValue::UInt32(_) | TypedValue::Int64(_) => SqlType::Int64,
            TypedValue::UInt64(_) => SqlType::BigNumeric,
            TypedValue::Float(_) | TypedValue::Double(_) | TypedValue::Duration(_) => {
                SqlType::Float
            }
            TypedValue::Timestamp(_) => SqlType::Timestamp,
            TypedValue::Guid(_) => SqlType::Guid,
            TypedValue::Text(s) => Self::string_for_len(s.chars().count(), true),
            // hex rendering is pure ASCII: the 8-bit family suffices
            TypedValue::Bytes(b) => Self::string_for_len(b.len() * 2, false),
            TypedValue::Ip(_) => Self::string_for_len(45, false),
        }
    }

    /// Target type for a column value; multi-value arrays are rendered
    /// text and need a string column.
    pub fn for_column_value(value: &ColumnValue) -> SqlType {
        match value {
            ColumnValue::Single(v) => Self::for_value(v),
            ColumnValue::Multi(_) => {
                Self::string_for_len(value.render_text().chars().count(), true)
            }
        }
    }

    fn is_string(&self) -> bool {
        matches!(self, SqlType::String { .. })
    }

    fn int_rank(&self) -> Option<u8> {
        match self {
            SqlType::Int32 => Some(0),
            SqlType::Int64 => Some(1),
            SqlType::BigNumeric => Some(2),
            _ => None,
        }
    }
}

/// Outcome of reconciling an existing column type with a required one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widening {
    /// The existing type already holds the value.
    Unchanged,
    /// Widen along the lattice to the carried type.
    Widen(SqlType),
    /// Incompatible transition: degrade to `string(4000)`.
    Degrade(SqlType),
}

/// Reconcile an existing column type with the type required by an
/// incoming value. Never narrows.
pub fn widen(existing: SqlType, required: SqlType) -> Widening {
    if existing == required {
        return Widening::Unchanged;
    }
    // string(4000) in the wide family is terminal
    if existing == SqlType::degraded() {
        return Widening::Unchanged;
    }
    match (existing, required) {
        (
            SqlType::String { wide: ew, precision: ep },
            SqlType::String { wide: rw, precision: rp },
        ) => {
            // mixing families settles on the wide one
            let wide = ew || rw;
            let cap = if wide { MAX_WIDE_PRECISION } else { MAX_NARROW_PRECISION };
            let precision = ep.max(rp).min(cap);
            if wide == ew && precision == ep {
                Widening::Unchanged
            } else {
                Widening::Widen(SqlType::String { wide, precision })
            }
        }
        (existing, required) if existing.is_string() => {
            // non-string value into a string column: keep the column,
            // growing precision for the rendered text if needed
            let SqlType::String { wide, .. } = existing else {
                return Widening::Degrade(SqlType::degraded());
            };
            let rendered = SqlType::string_for_len(rendered_width(required), wide);
            widen(existing, rendered)
        }
        (a, b) => match (a.int_rank(), b.int_rank()) {
            (Some(ra), Some(rb)) => {
                if rb <= ra {
                    Widening::Unchanged
                } else {
                    Widening::Widen(b)
                }
            }
            _ => Widening::Degrade(SqlType::degraded()),
        },
    }
}

/// Worst-case rendered text width of a non-string type.
fn rendered_width(ty: SqlType) -> usize {
    match ty {
        SqlType::Bit => 5,
        SqlType::Int32 => 11,
        SqlType::Int64 | SqlType::BigNumeric => 20,
        SqlType::Float => 24,
        SqlType::Timestamp => 27,
        SqlType::Guid => 36,
        SqlType::String { precision, .. } => precision as usize,
    }
}

/// One column of a discovered table.
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    /// Escaped column name.
    pub name: String,
    pub sql_type: SqlType,
    /// True once the column exists in the database.
    pub committed: bool,
}

/// A lazily discovered table.
#[derive(Debug, Clone, Default)]
pub struct TableDefinition {
    /// Escaped table name.
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    /// True once the table exists in the database.
    pub committed: bool,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            committed: false,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnDefinition> {
        self.columns.iter_mut().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(wide: bool, precision: u32) -> SqlType {
        SqlType::String { wide, precision }
    }

    #[test]
    fn test_string_buckets() {
        assert_eq!(SqlType::string_for_len(10, true), s(true, 250));
        assert_eq!(SqlType::string_for_len(250, true), s(true, 250));
        assert_eq!(SqlType::string_for_len(251, true), s(true, 500));
        assert_eq!(SqlType::string_for_len(1500, true), s(true, 2000));
        assert_eq!(SqlType::string_for_len(5000, true), s(true, 4000));
        assert_eq!(SqlType::string_for_len(5000, false), s(false, 8000));
    }

    #[test]
    fn test_string_precision_grows_only() {
        assert_eq!(
            widen(s(true, 250), s(true, 2000)),
            Widening::Widen(s(true, 2000))
        );
        assert_eq!(widen(s(true, 2000), s(true, 500)), Widening::Unchanged);
    }

    #[test]
    fn test_int_path() {
        assert_eq!(widen(SqlType::Int32, SqlType::Int64), Widening::Widen(SqlType::Int64));
        assert_eq!(
            widen(SqlType::Int64, SqlType::BigNumeric),
            Widening::Widen(SqlType::BigNumeric)
        );
        assert_eq!(widen(SqlType::Int64, SqlType::Int32), Widening::Unchanged);
        assert_eq!(widen(SqlType::BigNumeric, SqlType::Int64), Widening::Unchanged);
    }

    #[test]
    fn test_incompatible_degrades_to_terminal_string() {
        assert_eq!(
            widen(SqlType::Float, SqlType::Int32),
            Widening::Degrade(SqlType::degraded())
        );
        assert_eq!(
            widen(SqlType::Int32, SqlType::Float),
            Widening::Degrade(SqlType::degraded())
        );
        assert_eq!(
            widen(SqlType::Int32, s(true, 250)),
            Widening::Degrade(SqlType::degraded())
        );
        // and the terminal string absorbs everything
        assert_eq!(widen(SqlType::degraded(), SqlType::Int32), Widening::Unchanged);
        assert_eq!(
            widen(SqlType::degraded(), s(true, 250)),
            Widening::Unchanged
        );
    }

    #[test]
    fn test_non_string_into_string_column_grows_in_family() {
        // an int arriving in a string(250) column fits the rendering
        assert_eq!(widen(s(true, 250), SqlType::Int64), Widening::Unchanged);
        // a narrow family column widens its precision, not its family
        assert_eq!(widen(s(false, 250), SqlType::Guid), Widening::Unchanged);
    }

    #[test]
    fn test_type_for_value() {
        assert_eq!(SqlType::for_value(&TypedValue::UInt8(1)), SqlType::Int32);
        assert_eq!(SqlType::for_value(&TypedValue::UInt32(1)), SqlType::Int64);
        assert_eq!(
            SqlType::for_value(&TypedValue::UInt64(1)),
            SqlType::BigNumeric
        );
        assert_eq!(
            SqlType::for_value(&TypedValue::Text("x".repeat(300))),
            s(true, 500)
        );
        assert_eq!(
            SqlType::for_value(&TypedValue::Bytes(vec![0u8; 200])),
            s(false, 500)
        );
    }
}
