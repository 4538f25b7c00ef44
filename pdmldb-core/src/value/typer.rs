//! Conversion of raw PDML attribute strings into typed values.
//!
//! The typer never fails a packet: any conversion problem degrades the
//! node to text and keeps the raw attribute.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::schema::{DisplayBase, Field, FieldType, SchemaModel, ValueString};
use crate::text::{parse_hex, strip_hex_prefix};

use super::TypedValue;

/// Type a leaf's `show`/`value` attributes against the schema.
///
/// Returns the typed value and, when the field has a matching
/// value-string entry, its label. An unknown field types as text; a
/// conversion failure degrades to text of `value` when `show` is a
/// case-insensitive suffix of `name`, else of `show`.
pub fn type_value(
    schema: &SchemaModel,
    name: Option<&str>,
    show: Option<&str>,
    value: Option<&str>,
) -> (Option<TypedValue>, Option<String>) {
    let field = name.and_then(|n| schema.field(n));
    let field_type = field.map(|f| f.field_type).unwrap_or(FieldType::Text);
    let base = field.map(|f| f.display_base).unwrap_or_default();

    match convert(field_type, base, show, value) {
        Ok(Some(typed)) => {
            let label = lookup_label(field, &typed);
            (Some(typed), label)
        }
        Ok(None) => (None, None),
        Err(()) => (degrade(name, show, value), None),
    }
}

fn convert(
    field_type: FieldType,
    base: DisplayBase,
    show: Option<&str>,
    value: Option<&str>,
) -> Result<Option<TypedValue>, ()> {
    match field_type {
        FieldType::Text | FieldType::Opaque => {
            Ok(show.map(|s| TypedValue::Text(s.to_string())))
        }
        FieldType::Bool => {
            let Some(s) = show else { return Ok(None) };
            Ok(Some(match s {
                "1" => TypedValue::Bool(true),
                "0" => TypedValue::Bool(false),
                other => TypedValue::Text(other.to_string()),
            }))
        }
        FieldType::UInt8 | FieldType::UInt16 | FieldType::UInt32 | FieldType::UInt64 => {
            let Some(s) = show else { return Ok(None) };
            if base == DisplayBase::None {
                return Ok(Some(TypedValue::Text(s.to_string())));
            }
            let v = if base.is_hex() {
                u64::from_le_bytes(hex_le_bytes(s)?)
            } else {
                s.trim().parse().map_err(|_| ())?
            };
            Ok(Some(TypedValue::smallest_unsigned(v)))
        }
        FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64 => {
            let Some(s) = show else { return Ok(None) };
            if base == DisplayBase::None {
                return Ok(Some(TypedValue::Text(s.to_string())));
            }
            let v = if base.is_hex() {
                i64::from_le_bytes(hex_le_bytes(s)?)
            } else {
                s.trim().parse().map_err(|_| ())?
            };
            Ok(Some(TypedValue::smallest_signed(v)))
        }
        FieldType::Float => {
            let Some(s) = show else { return Ok(None) };
            Ok(Some(TypedValue::Float(s.trim().parse().map_err(|_| ())?)))
        }
        FieldType::Double => {
            let Some(s) = show else { return Ok(None) };
            Ok(Some(TypedValue::Double(s.trim().parse().map_err(|_| ())?)))
        }
        FieldType::AbsoluteTime => {
            let Some(s) = show else { return Ok(None) };
            Ok(Some(TypedValue::Timestamp(parse_pdml_timestamp(s)?)))
        }
        FieldType::RelativeTime => {
            let Some(s) = show else { return Ok(None) };
            Ok(Some(TypedValue::Duration(
                s.trim().parse().map_err(|_| ())?,
            )))
        }
        FieldType::Bytes => {
            let bytes = match value {
                Some(v) => parse_hex(v).ok_or(())?,
                None => Vec::new(),
            };
            Ok(Some(TypedValue::Bytes(bytes)))
        }
        FieldType::IpAddr => {
            if let Some(addr) = show.and_then(|s| s.trim().parse::<IpAddr>().ok()) {
                return Ok(Some(TypedValue::Ip(addr)));
            }
            let bytes = value.and_then(parse_hex).ok_or(())?;
            let addr = match bytes.len() {
                4 => IpAddr::V4(Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])),
                16 => {
                    let mut arr = [0u8; 16];
                    arr.copy_from_slice(&bytes);
                    IpAddr::V6(Ipv6Addr::from(arr))
                }
                _ => return Err(()),
            };
            Ok(Some(TypedValue::Ip(addr)))
        }
        FieldType::Guid => {
            let Some(s) = show else { return Ok(None) };
            Ok(Some(TypedValue::Guid(
                Uuid::parse_str(s.trim()).map_err(|_| ())?,
            )))
        }
    }
}

/// Decode a hex-rendered `show` into 8 little-endian bytes.
///
/// The digit pairs become a byte array that is zero-padded on the right
/// to 8 bytes and reinterpreted little-endian, matching the original
/// byte-reinterpretation of hex displays.
fn hex_le_bytes(show: &str) -> Result<[u8; 8], ()> {
    let digits = strip_hex_prefix(show.trim()).unwrap_or_else(|| show.trim());
    let bytes = parse_hex(digits).ok_or(())?;
    if bytes.len() > 8 {
        return Err(());
    }
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(&bytes);
    Ok(buf)
}

/// Parse the dissector's `MMM d, yyyy HH:mm:ss.fffffff…` timestamp.
///
/// Fractional digits beyond 7 are truncated, trailing text (time zone
/// names) is ignored, and the time is taken as local and converted to
/// UTC.
fn parse_pdml_timestamp(show: &str) -> Result<DateTime<Utc>, ()> {
    let (main, rest) = match show.find('.') {
        Some(i) => (&show[..i], &show[i + 1..]),
        None => (show, ""),
    };
    let frac: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .take(7)
        .collect();
    let composed = if frac.is_empty() {
        main.trim_end().to_string()
    } else {
        format!("{}.{}", main, frac)
    };
    let naive =
        NaiveDateTime::parse_from_str(&composed, "%b %e, %Y %H:%M:%S%.f").map_err(|_| ())?;
    let local = Local.from_local_datetime(&naive).earliest().ok_or(())?;
    Ok(local.with_timezone(&Utc))
}

fn degrade(name: Option<&str>, show: Option<&str>, value: Option<&str>) -> Option<TypedValue> {
    let show_is_name_suffix = match (name, show) {
        (Some(n), Some(s)) => n.to_ascii_lowercase().ends_with(&s.to_ascii_lowercase()),
        _ => false,
    };
    let raw = if show_is_name_suffix { value } else { show };
    raw.map(|s| TypedValue::Text(s.to_string()))
}

fn lookup_label(field: Option<&Field>, typed: &TypedValue) -> Option<String> {
    let field = field?;
    match typed {
        TypedValue::Bool(b) => field.values.iter().find_map(|v| match v {
            ValueString::Boolean {
                true_label,
                false_label,
            } => Some(if *b { true_label } else { false_label }.clone()),
            _ => None,
        }),
        TypedValue::UInt8(_)
        | TypedValue::UInt16(_)
        | TypedValue::UInt32(_)
        | TypedValue::UInt64(_)
        | TypedValue::Int8(_)
        | TypedValue::Int16(_)
        | TypedValue::Int32(_)
        | TypedValue::Int64(_) => {
            let v = typed.as_i64()?;
            let single = field.values.iter().find_map(|e| match e {
                ValueString::Single { value, label } if *value == v => Some(label.clone()),
                _ => None,
            });
            single.or_else(|| {
                field.values.iter().find_map(|e| match e {
                    ValueString::Range { lo, hi, label } if *lo <= v && v <= *hi => {
                        Some(label.clone())
                    }
                    _ => None,
                })
            })
        }
        _ => None,
    }
}
