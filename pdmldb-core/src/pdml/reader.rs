//! Streaming PDML reader.
//!
//! Pulls XML events and materializes one packet subtree at a time; the
//! rest of the document is never held in memory. Nested `<proto>`
//! elements are promoted to siblings at packet level, and after a node
//! closes, children outside its expected child set are pruned away.
//!
//! The stream regularly ends mid-document (the dissector's exit code is
//! not checked), so reader errors after the prolog are treated as end
//! of input rather than failures.

use std::io::Read;

use tracing::warn;
use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, XmlEvent};

use crate::error::PdmlError;
use crate::fixup::FixupEngine;
use crate::schema::SchemaModel;
use crate::text::parse_i64;
use crate::value::type_value;

use super::{NodeKind, PacketTree, TreeNode};

/// Streaming reader over a PDML document.
pub struct PdmlReader<R: Read> {
    parser: EventReader<R>,
    saw_root: bool,
    done: bool,
}

impl<R: Read> PdmlReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            parser: EventReader::new(source),
            saw_root: false,
            done: false,
        }
    }

    /// Read the next `<packet>` subtree, applying fixups and value
    /// typing while building it. Returns `None` at end of input,
    /// including truncated input.
    pub fn next_packet(
        &mut self,
        schema: &SchemaModel,
        fixups: &FixupEngine,
    ) -> Result<Option<PacketTree>, PdmlError> {
        if self.done {
            return Ok(None);
        }
        loop {
            match self.parser.next() {
                Ok(XmlEvent::StartElement { name, .. }) => {
                    if !self.saw_root {
                        if name.local_name != "pdml" {
                            return Err(PdmlError::UnexpectedRoot {
                                element: name.local_name,
                            });
                        }
                        self.saw_root = true;
                        continue;
                    }
                    if name.local_name == "packet" {
                        return Ok(Some(self.read_packet(schema, fixups)));
                    }
                    // a stray non-packet element below the root: ignored
                }
                Ok(XmlEvent::EndDocument) => {
                    self.done = true;
                    return Ok(None);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "PDML stream ended unexpectedly");
                    self.done = true;
                    return Ok(None);
                }
            }
        }
    }

    /// Build the tree for the packet whose start tag was just consumed.
    fn read_packet(&mut self, schema: &SchemaModel, fixups: &FixupEngine) -> PacketTree {
        let mut tree = PacketTree::new();
        let root = tree.root();
        let mut stack: Vec<usize> = vec![root];

        loop {
            match self.parser.next() {
                Ok(XmlEvent::StartElement {
                    name, attributes, ..
                }) => {
                    let kind = match name.local_name.as_str() {
                        "proto" => NodeKind::Proto,
                        "field" => NodeKind::Field,
                        other => NodeKind::Other(other.to_string()),
                    };
                    // nested protos are promoted to packet level
                    let current = stack.last().copied().unwrap_or(root);
                    let parent = if kind == NodeKind::Proto { root } else { current };

                    let mut node = TreeNode::new(kind);
                    extract_attributes(&mut node, &attributes);
                    node.protocol =
                        if node.kind == NodeKind::Proto && tree.node(parent).protocol.is_none() {
                            node.attrs.name.clone()
                        } else {
                            tree.node(parent).protocol.clone()
                        };

                    if !matches!(node.kind, NodeKind::Other(_)) {
                        let parent_name = tree.node(parent).attrs.name.clone();
                        fixups.apply(
                            node.protocol.as_deref(),
                            parent_name.as_deref(),
                            &mut node.attrs,
                        );
                        if node.kind == NodeKind::Field {
                            let (typed, label) = type_value(
                                schema,
                                node.attrs.name.as_deref().filter(|n| !n.is_empty()),
                                node.attrs.show.as_deref(),
                                node.attrs.value.as_deref(),
                            );
                            node.typed = typed;
                            node.typed_label = label;
                        }
                    }

                    let idx = tree.attach(parent, node);
                    stack.push(idx);
                }
                Ok(XmlEvent::EndElement { .. }) => {
                    if let Some(idx) = stack.pop() {
                        tree.prune_children(idx);
                    }
                    if stack.is_empty() {
                        return tree;
                    }
                }
                Ok(XmlEvent::EndDocument) => {
                    // truncated mid-packet: keep what was built
                    self.done = true;
                    return tree;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "PDML stream truncated inside a packet");
                    self.done = true;
                    return tree;
                }
            }
        }
    }
}

fn extract_attributes(node: &mut TreeNode, attributes: &[OwnedAttribute]) {
    for attr in attributes {
        match attr.name.local_name.as_str() {
            "name" => {
                node.attrs.name = Some(attr.value.clone()).filter(|v| !v.is_empty());
            }
            "showname" => node.attrs.showname = Some(attr.value.clone()),
            "show" => node.attrs.show = Some(attr.value.clone()),
            "value" => node.attrs.value = Some(attr.value.clone()),
            "size" => node.size = parse_i64(&attr.value).unwrap_or(0),
            "pos" => node.pos = parse_i64(&attr.value).unwrap_or(0),
            "hide" => node.hidden = attr.value == "yes",
            _ => {}
        }
    }
}
