//! Loader for the four tab-delimited dissector catalogs.
//!
//! Each catalog line is split on tabs with an upper bound on the field
//! count, so the last column may itself contain tabs. Per-line failures
//! are logged and skipped; the loader always leaves a (possibly
//! partial) schema behind.

use std::io::BufRead;

use tracing::{debug, warn};

use crate::error::SchemaError;
use crate::text::parse_i64;

use super::{DisplayBase, FieldType, SchemaModel, ValueString};

/// Per-catalog load statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadStats {
    pub lines: u64,
    pub skipped: u64,
}

impl LoadStats {
    fn skip(&mut self, catalog: &'static str, err: &SchemaError) {
        self.skipped += 1;
        warn!(catalog, error = %err, "skipping catalog line");
    }
}

/// Iterate catalog lines, skipping blanks; an I/O error ends the
/// stream and leaves the schema partial.
fn catalog_lines<R: BufRead>(reader: R) -> impl Iterator<Item = String> {
    reader
        .lines()
        .map_while(|line| match line {
            Ok(l) => Some(l),
            Err(err) => {
                warn!(error = %err, "catalog read error, stopping");
                None
            }
        })
        .filter(|l| !l.is_empty())
}

/// Load the `protocols` catalog: `longName \t shortName \t filterName`.
pub fn load_protocols<R: BufRead>(model: &mut SchemaModel, reader: R) -> LoadStats {
    let mut stats = LoadStats::default();
    for line in catalog_lines(reader) {
        stats.lines += 1;
        let cols: Vec<&str> = line.splitn(3, '\t').collect();
        let result = match cols.as_slice() {
            [long, short, filter] => model.register_protocol(long, short, filter),
            _ => Err(SchemaError::MalformedLine {
                catalog: "protocols",
                line: line.clone(),
            }),
        };
        if let Err(err) = result {
            stats.skip("protocols", &err);
        }
    }
    stats
}

/// Load the `fields` catalog.
///
/// `F` records carry a full field definition; `P` records register a
/// parent protocol on the fly, with the filter name defaulting to the
/// lowercased short name.
pub fn load_fields<R: BufRead>(model: &mut SchemaModel, reader: R) -> LoadStats {
    let mut stats = LoadStats::default();
    for line in catalog_lines(reader) {
        stats.lines += 1;
        if let Err(err) = load_field_line(model, &line) {
            stats.skip("fields", &err);
        }
    }
    stats
}

fn load_field_line(model: &mut SchemaModel, line: &str) -> Result<(), SchemaError> {
    let malformed = || SchemaError::MalformedLine {
        catalog: "fields",
        line: line.to_string(),
    };
    match line.split('\t').next() {
        Some("F") => {
            let cols: Vec<&str> = line.splitn(8, '\t').collect();
            let [_, long, short, token, parent, description, base, bitmask] = cols.as_slice()
            else {
                return Err(malformed());
            };
            let field_type = FieldType::from_token(token)?;
            model.register_field(
                long,
                short,
                field_type,
                parent,
                description,
                DisplayBase::from_token(base),
                bitmask,
            )
        }
        Some("P") => {
            let cols: Vec<&str> = line.splitn(3, '\t').collect();
            let [_, long, short] = cols.as_slice() else {
                return Err(malformed());
            };
            model.register_protocol(long, short, &short.to_ascii_lowercase())
        }
        _ => Err(malformed()),
    }
}

/// Load the `values` catalog: `V` (single), `R` (range) and `T`
/// (boolean) records.
pub fn load_values<R: BufRead>(model: &mut SchemaModel, reader: R) -> LoadStats {
    let mut stats = LoadStats::default();
    for line in catalog_lines(reader) {
        stats.lines += 1;
        if let Err(err) = load_value_line(model, &line) {
            stats.skip("values", &err);
        }
    }
    stats
}

fn load_value_line(model: &mut SchemaModel, line: &str) -> Result<(), SchemaError> {
    let malformed = || SchemaError::MalformedLine {
        catalog: "values",
        line: line.to_string(),
    };
    let int = |text: &str| {
        parse_i64(text).ok_or_else(|| SchemaError::InvalidInteger {
            catalog: "values",
            text: text.to_string(),
        })
    };
    match line.split('\t').next() {
        Some("V") => {
            let cols: Vec<&str> = line.splitn(4, '\t').collect();
            let [_, field, value, label] = cols.as_slice() else {
                return Err(malformed());
            };
            model.add_value_string(
                field,
                ValueString::Single {
                    value: int(value)?,
                    label: label.to_string(),
                },
            )
        }
        Some("R") => {
            let cols: Vec<&str> = line.splitn(5, '\t').collect();
            let [_, field, lo, hi, label] = cols.as_slice() else {
                return Err(malformed());
            };
            model.add_value_string(
                field,
                ValueString::Range {
                    lo: int(lo)?,
                    hi: int(hi)?,
                    label: label.to_string(),
                },
            )
        }
        Some("T") => {
            let cols: Vec<&str> = line.splitn(4, '\t').collect();
            let [_, field, true_label, false_label] = cols.as_slice() else {
                return Err(malformed());
            };
            model.add_value_string(
                field,
                ValueString::Boolean {
                    true_label: true_label.to_string(),
                    false_label: false_label.to_string(),
                },
            )
        }
        _ => Err(malformed()),
    }
}

/// Read the `decodes` catalog. Reserved: the records are accepted and
/// discarded.
pub fn load_decodes<R: BufRead>(reader: R) -> LoadStats {
    let mut stats = LoadStats::default();
    for _line in catalog_lines(reader) {
        stats.lines += 1;
    }
    debug!(lines = stats.lines, "decodes catalog read and discarded");
    stats
}
