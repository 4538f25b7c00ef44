//! Typed field values.
//!
//! A [`TypedValue`] is the tagged variant carried from the packet
//! transformer into the database writer: one leaf value, or one element
//! of a multi-value column.

mod typer;

pub use typer::type_value;

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::text::print_hex;

/// A typed leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Bool(bool),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    /// Absolute timestamp, UTC
    Timestamp(DateTime<Utc>),
    /// Relative duration in seconds
    Duration(f64),
    Text(String),
    Bytes(Vec<u8>),
    Ip(IpAddr),
    Guid(Uuid),
}

impl TypedValue {
    /// Store an unsigned value in the smallest variant that fits.
    pub fn smallest_unsigned(value: u64) -> Self {
        if let Ok(v) = u8::try_from(value) {
            TypedValue::UInt8(v)
        } else if let Ok(v) = u16::try_from(value) {
            TypedValue::UInt16(v)
        } else if let Ok(v) = u32::try_from(value) {
            TypedValue::UInt32(v)
        } else {
            TypedValue::UInt64(value)
        }
    }

    /// Store a signed value in the smallest variant that fits.
    pub fn smallest_signed(value: i64) -> Self {
        if let Ok(v) = i8::try_from(value) {
            TypedValue::Int8(v)
        } else if let Ok(v) = i16::try_from(value) {
            TypedValue::Int16(v)
        } else if let Ok(v) = i32::try_from(value) {
            TypedValue::Int32(v)
        } else {
            TypedValue::Int64(value)
        }
    }

    /// Try to get the value as an i64. `None` for non-integers and for
    /// unsigned values beyond the i64 range.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::UInt8(v) => Some(*v as i64),
            TypedValue::UInt16(v) => Some(*v as i64),
            TypedValue::UInt32(v) => Some(*v as i64),
            TypedValue::UInt64(v) => i64::try_from(*v).ok(),
            TypedValue::Int8(v) => Some(*v as i64),
            TypedValue::Int16(v) => Some(*v as i64),
            TypedValue::Int32(v) => Some(*v as i64),
            TypedValue::Int64(v) => Some(*v),
            TypedValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Try to get the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Float(v) => Some(*v as f64),
            TypedValue::Double(v) => Some(*v),
            TypedValue::Duration(v) => Some(*v),
            TypedValue::UInt64(v) => Some(*v as f64),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// True for byte-sequence values.
    pub fn is_binary(&self) -> bool {
        matches!(self, TypedValue::Bytes(_))
    }

    /// Render the value as text, as used for string columns and
    /// multi-value array elements. Bytes render as lowercase hex,
    /// timestamps in the SQL serialization format.
    pub fn render_text(&self) -> String {
        match self {
            TypedValue::Bool(b) => b.to_string(),
            TypedValue::UInt8(v) => v.to_string(),
            TypedValue::UInt16(v) => v.to_string(),
            TypedValue::UInt32(v) => v.to_string(),
            TypedValue::UInt64(v) => v.to_string(),
            TypedValue::Int8(v) => v.to_string(),
            TypedValue::Int16(v) => v.to_string(),
            TypedValue::Int32(v) => v.to_string(),
            TypedValue::Int64(v) => v.to_string(),
            TypedValue::Float(v) => v.to_string(),
            TypedValue::Double(v) => v.to_string(),
            TypedValue::Timestamp(ts) => format_sql_timestamp(ts),
            TypedValue::Duration(v) => v.to_string(),
            TypedValue::Text(s) => s.clone(),
            TypedValue::Bytes(b) => print_hex(b),
            TypedValue::Ip(addr) => addr.to_string(),
            TypedValue::Guid(g) => g.to_string(),
        }
    }
}

impl std::fmt::Display for TypedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render_text())
    }
}

/// Format a timestamp as `yyyy-MM-dd HH:mm:ss.fffffff` (seven
/// fractional digits, i.e. 100 ns ticks).
pub fn format_sql_timestamp(ts: &DateTime<Utc>) -> String {
    use chrono::Timelike;
    format!(
        "{}.{:07}",
        ts.format("%Y-%m-%d %H:%M:%S"),
        ts.nanosecond() % 1_000_000_000 / 100
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_smallest_fit() {
        assert_eq!(TypedValue::smallest_unsigned(200), TypedValue::UInt8(200));
        assert_eq!(TypedValue::smallest_unsigned(300), TypedValue::UInt16(300));
        assert_eq!(
            TypedValue::smallest_unsigned(70_000),
            TypedValue::UInt32(70_000)
        );
        assert_eq!(
            TypedValue::smallest_unsigned(u64::MAX),
            TypedValue::UInt64(u64::MAX)
        );
        assert_eq!(TypedValue::smallest_signed(-5), TypedValue::Int8(-5));
        assert_eq!(TypedValue::smallest_signed(1000), TypedValue::Int16(1000));
        assert_eq!(
            TypedValue::smallest_signed(i64::MIN),
            TypedValue::Int64(i64::MIN)
        );
    }

    #[test]
    fn test_as_i64_overflow() {
        assert_eq!(TypedValue::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(TypedValue::UInt64(5).as_i64(), Some(5));
    }

    #[test]
    fn test_render_text() {
        assert_eq!(TypedValue::Bytes(vec![0xde, 0xad]).render_text(), "dead");
        assert_eq!(TypedValue::Bool(true).render_text(), "true");
        assert_eq!(
            TypedValue::Ip("10.0.0.1".parse().unwrap()).render_text(),
            "10.0.0.1"
        );
    }

    #[test]
    fn test_format_sql_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 12, 40, 45).unwrap()
            + chrono::Duration::nanoseconds(123_456_700);
        assert_eq!(format_sql_timestamp(&ts), "2024-01-15 12:40:45.1234567");
    }
}
