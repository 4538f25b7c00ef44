//! Fixup rule file loading.
//!
//! Rule files are XML: a `<fixups>` root with `<constant>`, `<prefix>`,
//! `<speculative>` and `<template>` children. The built-in rule set is
//! packaged as a blob with a four-byte magic header followed by a raw
//! deflate payload.

use std::io::Read;

use flate2::read::DeflateDecoder;
use tracing::warn;
use xml::reader::{EventReader, XmlEvent};

use crate::error::FixupError;

use super::FixupEngine;

/// Magic header of the packaged rule blob.
pub const BUILTIN_MAGIC: [u8; 4] = [0x53, 0x49, 0x47, 0x4d];

static BUILTIN_RULES: &[u8] = include_bytes!("builtin_rules.bin");

/// Load the built-in rule set packaged with the binary.
///
/// Returns the number of rules registered.
pub fn load_builtin_rules(engine: &mut FixupEngine) -> Result<usize, FixupError> {
    if BUILTIN_RULES.len() < 4 || BUILTIN_RULES[..4] != BUILTIN_MAGIC {
        return Err(FixupError::BadMagic);
    }
    let mut xml = Vec::new();
    DeflateDecoder::new(&BUILTIN_RULES[4..]).read_to_end(&mut xml)?;
    load_rules(xml.as_slice(), engine)
}

/// Load rules from an XML rule file, augmenting whatever is already
/// registered. Returns the number of rules registered; rules that fail
/// to compile are logged and skipped.
pub fn load_rules<R: Read>(reader: R, engine: &mut FixupEngine) -> Result<usize, FixupError> {
    let parser = EventReader::new(reader);
    let mut count = 0usize;
    let mut saw_root = false;
    for event in parser {
        let XmlEvent::StartElement {
            name, attributes, ..
        } = event?
        else {
            continue;
        };
        let local = name.local_name.as_str();
        if !saw_root {
            if local != "fixups" {
                return Err(FixupError::UnexpectedRoot {
                    element: local.to_string(),
                });
            }
            saw_root = true;
            continue;
        }
        let attr = |key: &str| {
            attributes
                .iter()
                .find(|a| a.name.local_name == key)
                .map(|a| a.value.as_str())
        };
        let protocols = attr("protocol").unwrap_or("");
        match local {
            "constant" => match (attr("text"), attr("name")) {
                (Some(text), Some(name)) => {
                    engine.add_constant(protocols, text, name);
                    count += 1;
                }
                _ => warn!("skipping constant rule without text/name"),
            },
            "prefix" => match (attr("text"), attr("name")) {
                (Some(text), Some(name)) => {
                    engine.add_prefix(protocols, text, name);
                    count += 1;
                }
                _ => warn!("skipping prefix rule without text/name"),
            },
            "speculative" => match (attr("text"), attr("name")) {
                (Some(text), Some(name)) => {
                    engine.add_constant(protocols, text, name);
                    engine.add_prefix(protocols, text, name);
                    count += 1;
                }
                _ => warn!("skipping speculative rule without text/name"),
            },
            "template" => {
                let result = engine.add_template(
                    protocols,
                    attr("parentName"),
                    attr("name"),
                    attr("show"),
                    attr("showname"),
                    attr("value"),
                    attr("nameFormat"),
                    attr("valueFormat"),
                );
                match result {
                    Ok(()) => count += 1,
                    Err(err) => warn!(error = %err, "skipping template rule with bad regex"),
                }
            }
            other => warn!(element = other, "ignoring unknown rule element"),
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdml::Attributes;

    #[test]
    fn test_load_rules_from_xml() {
        let xml = r#"<?xml version="1.0"?>
            <fixups>
              <constant protocol="eth" text="Destination: Broadcast" name="eth.dst.bc"/>
              <prefix protocol="http" text="Request Method" name="http.request.method"/>
              <speculative protocol="smb" text="Padding" name="padding"/>
              <template protocol="dns" show="^Queries$" nameFormat="$(parentNamePrefix)queries"/>
            </fixups>"#;
        let mut engine = FixupEngine::new();
        let count = load_rules(xml.as_bytes(), &mut engine).unwrap();
        assert_eq!(count, 4);
        assert!(engine.protocol_count() >= 4);
    }

    #[test]
    fn test_bad_regex_rule_skipped() {
        let xml = r#"<fixups>
              <template protocol="x" show="([unclosed" nameFormat="n"/>
              <constant protocol="x" text="T" name="n"/>
            </fixups>"#;
        let mut engine = FixupEngine::new();
        let count = load_rules(xml.as_bytes(), &mut engine).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_wrong_root_element() {
        let mut engine = FixupEngine::new();
        let err = load_rules("<rules/>".as_bytes(), &mut engine);
        assert!(matches!(err, Err(FixupError::UnexpectedRoot { .. })));
    }

    #[test]
    fn test_builtin_rules_load() {
        let mut engine = FixupEngine::new();
        let count = load_builtin_rules(&mut engine).unwrap();
        assert!(count > 0);
        // the packaged set repairs the classic broadcast node
        let mut attrs = Attributes {
            show: Some("Destination: Broadcast".into()),
            ..Attributes::default()
        };
        engine.apply(Some("eth"), None, &mut attrs);
        assert_eq!(attrs.name.as_deref(), Some("eth.dst.bc"));
    }
}
