//! Flattening of packet trees into relational rows.
//!
//! Each node becomes at most one [`DataRow`]. Named leaves turn into
//! columns, nameless leaves into an ordered `<table>._value` child-row
//! sequence, and branches recurse into child rows (with an `_index`
//! column when nameless). Table names merge the parent's table with the
//! node's filtered name, eliding the overlapping dotted segments.

use crate::row::DataRow;
use crate::text::{combine_names, filter_name};
use crate::value::TypedValue;

use super::PacketTree;

/// Flatten one packet into its top-level rows.
///
/// The row flattened from the `geninfo` protocol gains a `file` column
/// with the capture path and is always first in the result.
pub fn flatten_packet(tree: &PacketTree, source_file: &str) -> Vec<DataRow> {
    let mut geninfo: Option<DataRow> = None;
    let mut others: Vec<DataRow> = Vec::new();
    for &child in &tree.node(tree.root()).children {
        if let Some(row) = flatten_node(tree, child, None, "") {
            if row.table == "geninfo" && geninfo.is_none() {
                geninfo = Some(row);
            } else {
                others.push(row);
            }
        }
    }
    let mut rows = Vec::with_capacity(others.len() + 1);
    if let Some(mut info) = geninfo {
        info.push_value("file", TypedValue::Text(source_file.to_string()));
        rows.push(info);
    }
    rows.extend(others);
    rows
}

/// Flatten a node into zero or one row.
fn flatten_node(
    tree: &PacketTree,
    idx: usize,
    parent_row_name: Option<&str>,
    prefix: &str,
) -> Option<DataRow> {
    let node = tree.node(idx);

    let row_name = node
        .attrs
        .name
        .as_deref()
        .map(filter_name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| match parent_row_name {
            Some(parent) => format!("{parent}._group"),
            None => "_group".to_string(),
        });
    let table = combine_names(prefix, &row_name);

    let mut row = DataRow::new(&table);
    let mut nameless_leaves = 0i32;
    let mut nameless_branches = 0i32;

    for &child_idx in &node.children {
        let child = tree.node(child_idx);
        let named = child
            .attrs
            .name
            .as_deref()
            .map(filter_name)
            .is_some_and(|n| !n.is_empty());

        if child.children.is_empty() {
            // leaf
            if named {
                let column = filter_name(child.attrs.name.as_deref().unwrap_or(""));
                if let Some(value) = child.typed.clone() {
                    row.push_value(&column, value);
                    if let Some(label) = child.typed_label.clone() {
                        row.push_value(&format!("{column}_string"), TypedValue::Text(label));
                    }
                }
            } else {
                if let Some(value) = child.typed.clone() {
                    let mut value_row = DataRow::new(format!("{table}._value"));
                    value_row.push_value("_index", TypedValue::Int32(nameless_leaves));
                    value_row.push_value("_value", value);
                    row.child_rows.push(value_row);
                }
                nameless_leaves += 1;
            }
        } else {
            // branch
            if named {
                if let Some(child_row) = flatten_node(tree, child_idx, Some(&row_name), &table) {
                    row.child_rows.push(child_row);
                }
            } else {
                if let Some(mut child_row) = flatten_node(tree, child_idx, Some(&row_name), &table)
                {
                    child_row.push_value("_index", TypedValue::Int32(nameless_branches));
                    row.child_rows.push(child_row);
                }
                nameless_branches += 1;
            }
        }
    }

    if let Some(value) = node.typed.clone() {
        row.push_value("_value", value);
        if let Some(label) = node.typed_label.clone() {
            row.push_value("_string", TypedValue::Text(label));
        }
    }

    if row.is_empty() {
        None
    } else {
        Some(row)
    }
}
