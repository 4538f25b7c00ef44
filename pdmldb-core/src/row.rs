//! Relational rows produced by flattening.
//!
//! A [`DataRow`] is owned by the transformer until it is enqueued, then
//! exclusively by the writer. Child rows are written after their parent
//! so the parent's `_id` is known.

use crate::value::TypedValue;

/// A column value: single, or a one-level multi-value array built from
/// repeated column names within a row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Single(TypedValue),
    Multi(Vec<TypedValue>),
}

impl ColumnValue {
    /// Render for string binding; arrays render as `{ a, b }`.
    pub fn render_text(&self) -> String {
        match self {
            ColumnValue::Single(v) => v.render_text(),
            ColumnValue::Multi(vs) => {
                let parts: Vec<String> = vs.iter().map(TypedValue::render_text).collect();
                format!("{{ {} }}", parts.join(", "))
            }
        }
    }

    /// True when any element is a byte sequence.
    pub fn is_binary(&self) -> bool {
        match self {
            ColumnValue::Single(v) => v.is_binary(),
            ColumnValue::Multi(vs) => vs.iter().any(TypedValue::is_binary),
        }
    }
}

/// One row bound for the database, with its child rows.
#[derive(Debug, Clone, Default)]
pub struct DataRow {
    /// Logical (pre-escaping) table name.
    pub table: String,
    /// Ordered columns; names are logical, repeated pushes accumulate
    /// into a multi-value array.
    pub columns: Vec<(String, ColumnValue)>,
    pub child_rows: Vec<DataRow>,
}

impl DataRow {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            child_rows: Vec::new(),
        }
    }

    /// Add a value; a repeated column name turns the column into a
    /// multi-value array and appends.
    pub fn push_value(&mut self, name: &str, value: TypedValue) {
        if let Some((_, existing)) = self.columns.iter_mut().find(|(n, _)| n == name) {
            match existing {
                ColumnValue::Single(old) => {
                    let old = std::mem::replace(old, TypedValue::Bool(false));
                    *existing = ColumnValue::Multi(vec![old, value]);
                }
                ColumnValue::Multi(vs) => vs.push(value),
            }
        } else {
            self.columns
                .push((name.to_string(), ColumnValue::Single(value)));
        }
    }

    /// Look up a column by logical name.
    pub fn column(&self, name: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Text of a single-valued column, if present.
    pub fn column_text(&self, name: &str) -> Option<String> {
        match self.column(name)? {
            ColumnValue::Single(TypedValue::Text(s)) => Some(s.clone()),
            ColumnValue::Single(v) => Some(v.render_text()),
            ColumnValue::Multi(_) => None,
        }
    }

    /// Integer value of a single-valued column, if present.
    pub fn column_i64(&self, name: &str) -> Option<i64> {
        match self.column(name)? {
            ColumnValue::Single(v) => v.as_i64(),
            ColumnValue::Multi(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.child_rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_column_becomes_array() {
        let mut row = DataRow::new("t");
        row.push_value("c", TypedValue::UInt8(1));
        row.push_value("c", TypedValue::UInt8(2));
        row.push_value("c", TypedValue::UInt8(3));
        assert_eq!(row.columns.len(), 1);
        assert_eq!(
            row.column("c"),
            Some(&ColumnValue::Multi(vec![
                TypedValue::UInt8(1),
                TypedValue::UInt8(2),
                TypedValue::UInt8(3),
            ]))
        );
    }

    #[test]
    fn test_array_rendering() {
        let cv = ColumnValue::Multi(vec![
            TypedValue::Text("a".into()),
            TypedValue::UInt8(7),
        ]);
        assert_eq!(cv.render_text(), "{ a, 7 }");
    }

    #[test]
    fn test_column_lookups() {
        let mut row = DataRow::new("t");
        row.push_value("num", TypedValue::UInt16(42));
        row.push_value("file", TypedValue::Text("x.pcap".into()));
        assert_eq!(row.column_i64("num"), Some(42));
        assert_eq!(row.column_text("file").as_deref(), Some("x.pcap"));
        assert_eq!(row.column_i64("missing"), None);
    }
}
