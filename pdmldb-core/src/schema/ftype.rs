//! Semantic field types and display bases.
//!
//! The dissector describes every field with an `FT_*` type token and a
//! `BASE_*` rendering hint; both map onto closed enums here. The token
//! table is lossless: a token outside it fails the catalog line.

use crate::error::SchemaError;

/// Semantic type of a dissector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Boolean (true/false)
    Bool,
    /// Unsigned 8-bit integer
    UInt8,
    /// Unsigned 16-bit integer
    UInt16,
    /// Unsigned 32-bit integer
    UInt32,
    /// Unsigned 64-bit integer
    UInt64,
    /// Signed 8-bit integer
    Int8,
    /// Signed 16-bit integer
    Int16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// 32-bit floating point
    Float,
    /// 64-bit floating point
    Double,
    /// Absolute timestamp (UTC)
    AbsoluteTime,
    /// Relative duration (seconds)
    RelativeTime,
    /// Text string
    Text,
    /// Byte sequence
    Bytes,
    /// IP address, v4 or v6
    IpAddr,
    /// GUID
    Guid,
    /// Opaque string (ether, OID, IPX, PCRE)
    Opaque,
}

impl FieldType {
    /// Map a dissector `FT_*` token onto a semantic type.
    ///
    /// `FT_NUM_TYPES` and any unknown token fail the line.
    pub fn from_token(token: &str) -> Result<Self, SchemaError> {
        Ok(match token {
            "FT_BOOLEAN" => FieldType::Bool,
            "FT_UINT8" => FieldType::UInt8,
            "FT_UINT16" => FieldType::UInt16,
            "FT_UINT24" | "FT_UINT32" => FieldType::UInt32,
            "FT_UINT64" | "FT_EUI64" => FieldType::UInt64,
            "FT_INT8" => FieldType::Int8,
            "FT_INT16" => FieldType::Int16,
            "FT_INT24" | "FT_INT32" => FieldType::Int32,
            "FT_INT64" => FieldType::Int64,
            "FT_FLOAT" => FieldType::Float,
            "FT_DOUBLE" => FieldType::Double,
            "FT_ABSOLUTE_TIME" => FieldType::AbsoluteTime,
            "FT_RELATIVE_TIME" => FieldType::RelativeTime,
            "FT_STRING" | "FT_STRINGZ" | "FT_EBCDIC" | "FT_UINT_STRING" => FieldType::Text,
            "FT_BYTES" | "FT_UINT_BYTES" => FieldType::Bytes,
            "FT_IPv4" | "FT_IPv6" => FieldType::IpAddr,
            "FT_GUID" => FieldType::Guid,
            "FT_ETHER" | "FT_IPXNET" | "FT_OID" | "FT_PCRE" => FieldType::Opaque,
            "FT_NONE" | "FT_PROTOCOL" => FieldType::Text,
            "FT_FRAMENUM" => FieldType::UInt32,
            _ => {
                return Err(SchemaError::UnknownFieldType {
                    token: token.to_string(),
                })
            }
        })
    }

    /// True for the unsigned integer widths.
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            FieldType::UInt8 | FieldType::UInt16 | FieldType::UInt32 | FieldType::UInt64
        )
    }

    /// True for the signed integer widths.
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64
        )
    }
}

/// Rendering hint attached to numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayBase {
    #[default]
    None,
    Dec,
    Hex,
    Oct,
    DecHex,
    HexDec,
    Custom,
    /// Anything the dissector emits that we do not recognize
    Other,
}

impl DisplayBase {
    /// Parse a `BASE_*` token. Unknown tokens map to [`DisplayBase::Other`],
    /// which is rendered as decimal.
    pub fn from_token(token: &str) -> Self {
        match token {
            "BASE_NONE" => DisplayBase::None,
            "BASE_DEC" => DisplayBase::Dec,
            "BASE_HEX" => DisplayBase::Hex,
            "BASE_OCT" => DisplayBase::Oct,
            "BASE_DEC_HEX" => DisplayBase::DecHex,
            "BASE_HEX_DEC" => DisplayBase::HexDec,
            "BASE_CUSTOM" => DisplayBase::Custom,
            _ => DisplayBase::Other,
        }
    }

    /// True when the `show` attribute is rendered as hex digits.
    pub fn is_hex(&self) -> bool {
        matches!(self, DisplayBase::Hex | DisplayBase::HexDec)
    }
}
