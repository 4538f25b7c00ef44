//! Table and column write filtering.
//!
//! Rules come from an XML file: a `<filter>` root with `<tables>` and
//! `<columns>` sections holding `<allow>`/`<deny>` children carrying
//! regex attributes. All matching rules apply in declaration order and
//! the last match wins; names with no matching rule are allowed.

use std::io::Read;

use regex::Regex;
use tracing::warn;
use xml::reader::{EventReader, XmlEvent};

use crate::error::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Allow,
    Deny,
}

#[derive(Debug)]
struct TableRule {
    action: Action,
    table: Option<Regex>,
}

#[derive(Debug)]
struct ColumnRule {
    action: Action,
    table: Option<Regex>,
    column: Option<Regex>,
}

/// Compiled write filter. The default filter allows everything.
#[derive(Debug, Default)]
pub struct WriteFilter {
    tables: Vec<TableRule>,
    columns: Vec<ColumnRule>,
}

fn matches(regex: &Option<Regex>, text: &str) -> bool {
    regex.as_ref().map_or(true, |r| r.is_match(text))
}

impl WriteFilter {
    /// Filter that allows every table and column.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Should rows for this (logical) table be written?
    pub fn allow_table(&self, table: &str) -> bool {
        let mut allowed = true;
        for rule in &self.tables {
            if matches(&rule.table, table) {
                allowed = rule.action == Action::Allow;
            }
        }
        allowed
    }

    /// Should this (logical) column be written?
    pub fn allow_column(&self, table: &str, column: &str) -> bool {
        let mut allowed = true;
        for rule in &self.columns {
            if matches(&rule.table, table) && matches(&rule.column, column) {
                allowed = rule.action == Action::Allow;
            }
        }
        allowed
    }

    /// Parse a filter file. Rules whose regexes fail to compile are
    /// logged and skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, FilterError> {
        let parser = EventReader::new(reader);
        let mut filter = WriteFilter::default();
        let mut saw_root = false;
        let mut section: Option<&'static str> = None;

        for event in parser {
            match event? {
                XmlEvent::StartElement {
                    name, attributes, ..
                } => {
                    let local = name.local_name.as_str();
                    if !saw_root {
                        if local != "filter" {
                            return Err(FilterError::UnexpectedRoot {
                                element: local.to_string(),
                            });
                        }
                        saw_root = true;
                        continue;
                    }
                    match local {
                        "tables" => section = Some("tables"),
                        "columns" => section = Some("columns"),
                        "allow" | "deny" => {
                            let action = if local == "allow" {
                                Action::Allow
                            } else {
                                Action::Deny
                            };
                            let attr = |key: &str| {
                                attributes
                                    .iter()
                                    .find(|a| a.name.local_name == key)
                                    .map(|a| a.value.as_str())
                            };
                            let compile = |src: Option<&str>| -> Result<Option<Regex>, ()> {
                                match src {
                                    None => Ok(None),
                                    Some(s) => match Regex::new(s) {
                                        Ok(r) => Ok(Some(r)),
                                        Err(err) => {
                                            warn!(regex = s, error = %err, "skipping filter rule");
                                            Err(())
                                        }
                                    },
                                }
                            };
                            match section {
                                Some("tables") => {
                                    if let Ok(table) = compile(attr("tableName")) {
                                        filter.tables.push(TableRule { action, table });
                                    }
                                }
                                Some("columns") => {
                                    if let (Ok(table), Ok(column)) =
                                        (compile(attr("tableName")), compile(attr("columnName")))
                                    {
                                        filter.columns.push(ColumnRule {
                                            action,
                                            table,
                                            column,
                                        });
                                    }
                                }
                                _ => warn!("filter rule outside tables/columns section"),
                            }
                        }
                        other => warn!(element = other, "ignoring unknown filter element"),
                    }
                }
                XmlEvent::EndElement { name } => {
                    if matches!(name.local_name.as_str(), "tables" | "columns") {
                        section = None;
                    }
                }
                _ => {}
            }
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allows_everything() {
        let filter = WriteFilter::allow_all();
        assert!(filter.allow_table("anything"));
        assert!(filter.allow_column("anything", "any"));
    }

    #[test]
    fn test_last_match_wins() {
        let xml = r#"<filter>
              <tables>
                <deny tableName=".*"/>
                <allow tableName="^geninfo$"/>
              </tables>
            </filter>"#;
        let filter = WriteFilter::from_reader(xml.as_bytes()).unwrap();
        assert!(filter.allow_table("geninfo"));
        assert!(!filter.allow_table("eth"));
    }

    #[test]
    fn test_column_rules() {
        let xml = r#"<filter>
              <columns>
                <deny tableName="^http$" columnName="cookie"/>
              </columns>
            </filter>"#;
        let filter = WriteFilter::from_reader(xml.as_bytes()).unwrap();
        assert!(!filter.allow_column("http", "http.cookie"));
        assert!(filter.allow_column("http", "http.host"));
        assert!(filter.allow_column("tcp", "cookie"));
    }

    #[test]
    fn test_bad_regex_rule_skipped() {
        let xml = r#"<filter>
              <tables>
                <deny tableName="([bad"/>
                <deny tableName="^eth$"/>
              </tables>
            </filter>"#;
        let filter = WriteFilter::from_reader(xml.as_bytes()).unwrap();
        assert!(!filter.allow_table("eth"));
        assert!(filter.allow_table("ip"));
    }

    #[test]
    fn test_wrong_root() {
        assert!(WriteFilter::from_reader("<nope/>".as_bytes()).is_err());
    }
}
