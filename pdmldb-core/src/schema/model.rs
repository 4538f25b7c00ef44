//! In-memory registry of protocols, fields and value strings.
//!
//! The registry owns everything by value; parent links (field →
//! protocol) are short-name keys resolved through the registry, never
//! owning pointers. Protocol short names are case-insensitive keys.
//! The model is populated by the schema loader and immutable afterwards.

use std::collections::HashMap;

use crate::error::SchemaError;

use super::{DisplayBase, FieldType};

/// A protocol registered by the dissector.
#[derive(Debug, Clone)]
pub struct Protocol {
    pub short_name: String,
    pub long_name: String,
    pub filter_name: String,
    /// Short names of this protocol's fields, in registration order.
    pub fields: Vec<String>,
}

/// A dissector field.
#[derive(Debug, Clone)]
pub struct Field {
    pub short_name: String,
    pub long_name: String,
    pub description: String,
    pub display_base: DisplayBase,
    /// Opaque bitmask string from the catalog; kept verbatim.
    pub bitmask: String,
    pub field_type: FieldType,
    /// Short name of the owning protocol.
    pub protocol: String,
    /// Value-string entries, in registration order.
    pub values: Vec<ValueString>,
}

/// A value-string entry attached to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueString {
    /// One integer value mapped to a label
    Single { value: i64, label: String },
    /// An inclusive integer range mapped to a label
    Range { lo: i64, hi: i64, label: String },
    /// Labels for a boolean field
    Boolean {
        true_label: String,
        false_label: String,
    },
}

/// Queryable model of the dissector's schema.
#[derive(Debug, Default)]
pub struct SchemaModel {
    /// Keyed by lowercased protocol short name.
    protocols: HashMap<String, Protocol>,
    /// Keyed by field short name.
    fields: HashMap<String, Field>,
}

/// Concatenate two labels with " / " when they differ.
fn merge_label(existing: &mut String, incoming: &str) {
    if existing != incoming && !incoming.is_empty() {
        existing.push_str(" / ");
        existing.push_str(incoming);
    }
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a protocol, merging with an existing registration.
    ///
    /// Merging concatenates differing long names with " / " and rejects
    /// filter-name conflicts.
    pub fn register_protocol(
        &mut self,
        long_name: &str,
        short_name: &str,
        filter_name: &str,
    ) -> Result<(), SchemaError> {
        let key = short_name.to_ascii_lowercase();
        match self.protocols.get_mut(&key) {
            Some(existing) => {
                if !existing.filter_name.eq_ignore_ascii_case(filter_name) {
                    return Err(SchemaError::FilterNameConflict {
                        protocol: short_name.to_string(),
                    });
                }
                merge_label(&mut existing.long_name, long_name);
            }
            None => {
                self.protocols.insert(
                    key,
                    Protocol {
                        short_name: short_name.to_string(),
                        long_name: long_name.to_string(),
                        filter_name: filter_name.to_string(),
                        fields: Vec::new(),
                    },
                );
            }
        }
        Ok(())
    }

    /// Register a field under an existing protocol.
    ///
    /// The parent protocol and the type are fixed across merges; a
    /// conflicting re-registration fails and leaves the first intact.
    #[allow(clippy::too_many_arguments)]
    pub fn register_field(
        &mut self,
        long_name: &str,
        short_name: &str,
        field_type: FieldType,
        protocol_short: &str,
        description: &str,
        display_base: DisplayBase,
        bitmask: &str,
    ) -> Result<(), SchemaError> {
        let proto_key = protocol_short.to_ascii_lowercase();
        if !self.protocols.contains_key(&proto_key) {
            return Err(SchemaError::UnknownProtocol {
                field: short_name.to_string(),
                protocol: protocol_short.to_string(),
            });
        }
        match self.fields.get_mut(short_name) {
            Some(existing) => {
                if existing.field_type != field_type {
                    return Err(SchemaError::FieldTypeConflict {
                        field: short_name.to_string(),
                    });
                }
                if !existing.protocol.eq_ignore_ascii_case(protocol_short) {
                    return Err(SchemaError::FieldProtocolConflict {
                        field: short_name.to_string(),
                    });
                }
                merge_label(&mut existing.long_name, long_name);
                merge_label(&mut existing.description, description);
            }
            None => {
                self.fields.insert(
                    short_name.to_string(),
                    Field {
                        short_name: short_name.to_string(),
                        long_name: long_name.to_string(),
                        description: description.to_string(),
                        display_base,
                        bitmask: bitmask.to_string(),
                        field_type,
                        protocol: protocol_short.to_string(),
                        values: Vec::new(),
                    },
                );
                if let Some(proto) = self.protocols.get_mut(&proto_key) {
                    proto.fields.push(short_name.to_string());
                }
            }
        }
        Ok(())
    }

    /// Add a value-string entry to a field, merging duplicate keys.
    pub fn add_value_string(
        &mut self,
        field_short: &str,
        entry: ValueString,
    ) -> Result<(), SchemaError> {
        let field = self
            .fields
            .get_mut(field_short)
            .ok_or_else(|| SchemaError::UnknownField {
                field: field_short.to_string(),
            })?;
        for existing in &mut field.values {
            match (existing, &entry) {
                (
                    ValueString::Single { value: a, label },
                    ValueString::Single { value: b, label: new },
                ) if a == b => {
                    merge_label(label, new);
                    return Ok(());
                }
                (
                    ValueString::Range { lo: a, hi: b, label },
                    ValueString::Range { lo: c, hi: d, label: new },
                ) if a == c && b == d => {
                    merge_label(label, new);
                    return Ok(());
                }
                (
                    ValueString::Boolean { true_label, false_label },
                    ValueString::Boolean { true_label: t, false_label: f },
                ) => {
                    merge_label(true_label, t);
                    merge_label(false_label, f);
                    return Ok(());
                }
                _ => {}
            }
        }
        field.values.push(entry);
        Ok(())
    }

    /// Look up a protocol by short name (case-insensitive).
    pub fn protocol(&self, short_name: &str) -> Option<&Protocol> {
        self.protocols.get(&short_name.to_ascii_lowercase())
    }

    /// Look up a field by short name.
    pub fn field(&self, short_name: &str) -> Option<&Field> {
        self.fields.get(short_name)
    }

    /// Number of registered protocols.
    pub fn protocol_count(&self) -> usize {
        self.protocols.len()
    }

    /// Number of registered fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with_proto() -> SchemaModel {
        let mut m = SchemaModel::new();
        m.register_protocol("Transmission Control Protocol", "TCP", "tcp")
            .unwrap();
        m
    }

    #[test]
    fn test_protocol_lookup_case_insensitive() {
        let m = model_with_proto();
        assert!(m.protocol("tcp").is_some());
        assert!(m.protocol("Tcp").is_some());
        assert!(m.protocol("udp").is_none());
    }

    #[test]
    fn test_protocol_merge_idempotent() {
        let mut m = model_with_proto();
        m.register_protocol("Transmission Control Protocol", "tcp", "tcp")
            .unwrap();
        let p = m.protocol("tcp").unwrap();
        assert_eq!(p.long_name, "Transmission Control Protocol");
    }

    #[test]
    fn test_protocol_merge_concatenates_long_names() {
        let mut m = model_with_proto();
        m.register_protocol("TCP (renamed)", "tcp", "tcp").unwrap();
        assert_eq!(
            m.protocol("tcp").unwrap().long_name,
            "Transmission Control Protocol / TCP (renamed)"
        );
    }

    #[test]
    fn test_protocol_filter_name_conflict() {
        let mut m = model_with_proto();
        assert!(m
            .register_protocol("Transmission Control Protocol", "tcp", "other")
            .is_err());
    }

    #[test]
    fn test_field_requires_known_protocol() {
        let mut m = model_with_proto();
        let err = m.register_field(
            "Source Port",
            "udp.srcport",
            FieldType::UInt16,
            "udp",
            "",
            DisplayBase::Dec,
            "0",
        );
        assert!(matches!(err, Err(SchemaError::UnknownProtocol { .. })));
    }

    #[test]
    fn test_field_type_conflict_keeps_first() {
        let mut m = model_with_proto();
        m.register_field(
            "Source Port",
            "tcp.srcport",
            FieldType::UInt16,
            "tcp",
            "",
            DisplayBase::Dec,
            "0",
        )
        .unwrap();
        let err = m.register_field(
            "Source Port",
            "tcp.srcport",
            FieldType::Text,
            "tcp",
            "",
            DisplayBase::Dec,
            "0",
        );
        assert!(matches!(err, Err(SchemaError::FieldTypeConflict { .. })));
        assert_eq!(
            m.field("tcp.srcport").unwrap().field_type,
            FieldType::UInt16
        );
    }

    #[test]
    fn test_value_string_merge() {
        let mut m = model_with_proto();
        m.register_field(
            "Flags",
            "tcp.flags",
            FieldType::UInt8,
            "tcp",
            "",
            DisplayBase::Hex,
            "0",
        )
        .unwrap();
        m.add_value_string(
            "tcp.flags",
            ValueString::Single { value: 2, label: "SYN".into() },
        )
        .unwrap();
        m.add_value_string(
            "tcp.flags",
            ValueString::Single { value: 2, label: "Syn set".into() },
        )
        .unwrap();
        let f = m.field("tcp.flags").unwrap();
        assert_eq!(f.values.len(), 1);
        assert_eq!(
            f.values[0],
            ValueString::Single { value: 2, label: "SYN / Syn set".into() }
        );
    }

    #[test]
    fn test_value_string_unknown_field() {
        let mut m = model_with_proto();
        assert!(m
            .add_value_string(
                "tcp.nope",
                ValueString::Boolean {
                    true_label: "yes".into(),
                    false_label: "no".into()
                }
            )
            .is_err());
    }
}
