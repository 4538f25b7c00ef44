//! Name-rewriting rules for dissector output.
//!
//! The dissector leaves many generated nodes nameless or misnamed;
//! fixup rules repair or synthesize the `name`/`show`/`value`
//! attributes before flattening. Three rule kinds exist, all keyed by
//! protocol short name:
//!
//! - *constant*: exact `show` match on a nameless node assigns a name
//!   and clears the value
//! - *prefix*: `show` starting with `"text:"` assigns a name and keeps
//!   the remainder as the value
//! - *template*: regex matchers over the node attributes with templated
//!   `$(key)` substitution into a new name and value
//!
//! A compressed built-in rule set ships with the binary; an external
//! rule file augments it.

mod file;

pub use file::{load_builtin_rules, load_rules, BUILTIN_MAGIC};

use std::collections::HashMap;

use regex::Regex;

use crate::pdml::Attributes;
use crate::text::normalize_name;

/// A `show`-prefix rule.
#[derive(Debug, Clone)]
struct PrefixRule {
    text: String,
    name: String,
}

/// A regex template rule.
#[derive(Debug, Clone)]
struct TemplateRule {
    parent_name: Option<Regex>,
    name: Option<Regex>,
    show: Option<Regex>,
    showname: Option<Regex>,
    value: Option<Regex>,
    name_format: Option<String>,
    value_format: Option<String>,
}

/// Rules registered for one protocol.
#[derive(Debug, Default)]
struct ProtocolRules {
    /// Keyed by the exact `show` text.
    constants: HashMap<String, String>,
    prefixes: Vec<PrefixRule>,
    templates: Vec<TemplateRule>,
}

/// The fixups engine: per-protocol rule sets applied to each node.
#[derive(Debug, Default)]
pub struct FixupEngine {
    rules: HashMap<String, ProtocolRules>,
}

impl FixupEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constant rule for one or more protocols
    /// (comma-separated short names).
    pub fn add_constant(&mut self, protocols: &str, text: &str, name: &str) {
        for proto in split_protocols(protocols) {
            self.rules
                .entry(proto)
                .or_default()
                .constants
                .insert(text.to_string(), name.to_string());
        }
    }

    /// Register a prefix rule for one or more protocols.
    pub fn add_prefix(&mut self, protocols: &str, text: &str, name: &str) {
        for proto in split_protocols(protocols) {
            self.rules.entry(proto).or_default().prefixes.push(PrefixRule {
                text: text.to_string(),
                name: name.to_string(),
            });
        }
    }

    /// Register a template rule for one or more protocols. Matchers are
    /// regex sources; `None` means match-all.
    #[allow(clippy::too_many_arguments)]
    pub fn add_template(
        &mut self,
        protocols: &str,
        parent_name: Option<&str>,
        name: Option<&str>,
        show: Option<&str>,
        showname: Option<&str>,
        value: Option<&str>,
        name_format: Option<&str>,
        value_format: Option<&str>,
    ) -> Result<(), regex::Error> {
        let compile = |src: Option<&str>| src.map(Regex::new).transpose();
        let rule = TemplateRule {
            parent_name: compile(parent_name)?,
            name: compile(name)?,
            show: compile(show)?,
            showname: compile(showname)?,
            value: compile(value)?,
            name_format: name_format.map(str::to_string),
            value_format: value_format.map(str::to_string),
        };
        for proto in split_protocols(protocols) {
            self.rules
                .entry(proto)
                .or_default()
                .templates
                .push(rule.clone());
        }
        Ok(())
    }

    /// Number of protocols with at least one rule.
    pub fn protocol_count(&self) -> usize {
        self.rules.len()
    }

    /// Apply the rules for `protocol` to a node's attributes.
    ///
    /// Constant is tried first, then prefix (short-circuiting on a
    /// hit), then every template rule in declared order.
    pub fn apply(
        &self,
        protocol: Option<&str>,
        parent_name: Option<&str>,
        attrs: &mut Attributes,
    ) {
        let Some(proto) = protocol else { return };
        let Some(rules) = self.rules.get(&proto.to_ascii_lowercase()) else {
            return;
        };

        if !attrs.has_name() {
            if let Some(show) = attrs.show.clone() {
                if let Some(name) = rules.constants.get(&show) {
                    attrs.name = Some(name.clone());
                    attrs.showname = Some(show);
                    attrs.show = None;
                    attrs.value = None;
                } else if let Some(rule) = rules
                    .prefixes
                    .iter()
                    .find(|r| prefix_matches(&show, &r.text))
                {
                    let rest = show[rule.text.len() + 1..].trim_start().to_string();
                    attrs.name = Some(rule.name.clone());
                    attrs.showname = Some(show);
                    attrs.show = Some(rest.clone());
                    attrs.value = Some(rest);
                }
            }
        }

        for template in &rules.templates {
            template.apply(parent_name, attrs);
        }
    }
}

fn split_protocols(protocols: &str) -> impl Iterator<Item = String> + '_ {
    protocols
        .split(',')
        .map(|p| p.trim().to_ascii_lowercase())
        .filter(|p| !p.is_empty())
}

fn prefix_matches(show: &str, text: &str) -> bool {
    show.strip_prefix(text)
        .is_some_and(|rest| rest.starts_with(':'))
}

impl TemplateRule {
    fn apply(&self, parent_name: Option<&str>, attrs: &mut Attributes) {
        // every provided matcher must match; captures accumulate in order
        let mut keys: Vec<(String, String)> = Vec::new();
        let matchers: [(&Option<Regex>, &str); 5] = [
            (&self.parent_name, parent_name.unwrap_or("")),
            (&self.name, attrs.name.as_deref().unwrap_or("")),
            (&self.show, attrs.show.as_deref().unwrap_or("")),
            (&self.showname, attrs.showname.as_deref().unwrap_or("")),
            (&self.value, attrs.value.as_deref().unwrap_or("")),
        ];
        for (regex, text) in matchers {
            let Some(regex) = regex else { continue };
            let Some(caps) = regex.captures(text) else {
                return;
            };
            for cap_name in regex.capture_names().flatten() {
                if let Some(m) = caps.name(cap_name) {
                    keys.push((cap_name.to_string(), m.as_str().to_string()));
                }
            }
        }

        // implicit keys go after the captures so they shadow same-named
        // ones on lookup (last occurrence wins)
        let parent = parent_name.unwrap_or("");
        keys.push(("parentName".into(), parent.to_string()));
        keys.push((
            "parentNamePrefix".into(),
            if parent.is_empty() {
                String::new()
            } else {
                format!("{parent}.")
            },
        ));
        keys.push(("name".into(), attrs.name.clone().unwrap_or_default()));
        keys.push(("show".into(), attrs.show.clone().unwrap_or_default()));
        keys.push((
            "showname".into(),
            attrs.showname.clone().unwrap_or_default(),
        ));
        keys.push(("value".into(), attrs.value.clone().unwrap_or_default()));

        let new_name = self
            .name_format
            .as_deref()
            .map(|f| normalize_name(&expand(f, &keys)));
        let new_value = self.value_format.as_deref().map(|f| expand(f, &keys));

        // unconditional overwrite, even when only one format exists
        attrs.name = new_name.clone();
        attrs.showname = new_name;
        attrs.show = new_value.clone();
        attrs.value = new_value;
    }
}

/// Expand `$(key)` tokens against the accumulated key list. Unknown
/// keys expand to the empty string.
fn expand(format: &str, keys: &[(String, String)]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut rest = format;
    while let Some(start) = rest.find("$(") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find(')') {
            Some(end) => {
                let key = &after[..end];
                if let Some((_, v)) = keys.iter().rev().find(|(k, _)| k == key) {
                    out.push_str(v);
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(
        name: Option<&str>,
        showname: Option<&str>,
        show: Option<&str>,
        value: Option<&str>,
    ) -> Attributes {
        Attributes {
            name: name.map(str::to_string),
            showname: showname.map(str::to_string),
            show: show.map(str::to_string),
            value: value.map(str::to_string),
        }
    }

    #[test]
    fn test_constant_rule() {
        let mut engine = FixupEngine::new();
        engine.add_constant("eth", "Destination: Broadcast", "eth.dst.bc");
        let mut a = attrs(None, None, Some("Destination: Broadcast"), Some("ff"));
        engine.apply(Some("eth"), None, &mut a);
        assert_eq!(a.name.as_deref(), Some("eth.dst.bc"));
        assert_eq!(a.showname.as_deref(), Some("Destination: Broadcast"));
        assert_eq!(a.show, None);
        assert_eq!(a.value, None);
    }

    #[test]
    fn test_constant_requires_nameless_node() {
        let mut engine = FixupEngine::new();
        engine.add_constant("eth", "Destination: Broadcast", "eth.dst.bc");
        let mut a = attrs(
            Some("eth.dst"),
            None,
            Some("Destination: Broadcast"),
            None,
        );
        engine.apply(Some("eth"), None, &mut a);
        assert_eq!(a.name.as_deref(), Some("eth.dst"));
    }

    #[test]
    fn test_prefix_rule() {
        let mut engine = FixupEngine::new();
        engine.add_prefix("http", "Request Method", "http.request.method");
        let mut a = attrs(None, None, Some("Request Method: GET"), None);
        engine.apply(Some("http"), None, &mut a);
        assert_eq!(a.name.as_deref(), Some("http.request.method"));
        assert_eq!(a.showname.as_deref(), Some("Request Method: GET"));
        assert_eq!(a.show.as_deref(), Some("GET"));
        assert_eq!(a.value.as_deref(), Some("GET"));
    }

    #[test]
    fn test_constant_short_circuits_prefix() {
        let mut engine = FixupEngine::new();
        engine.add_constant("x", "A: B", "x.const");
        engine.add_prefix("x", "A", "x.pre");
        let mut a = attrs(None, None, Some("A: B"), None);
        engine.apply(Some("x"), None, &mut a);
        assert_eq!(a.name.as_deref(), Some("x.const"));
    }

    #[test]
    fn test_protocol_list_registration() {
        let mut engine = FixupEngine::new();
        engine.add_constant("eth, ip", "Padding", "pad");
        let mut a = attrs(None, None, Some("Padding"), None);
        engine.apply(Some("ip"), None, &mut a);
        assert_eq!(a.name.as_deref(), Some("pad"));
        let mut b = attrs(None, None, Some("Padding"), None);
        engine.apply(Some("ETH"), None, &mut b);
        assert_eq!(b.name.as_deref(), Some("pad"));
    }

    #[test]
    fn test_template_rule_with_captures() {
        let mut engine = FixupEngine::new();
        engine
            .add_template(
                "dns",
                None,
                None,
                Some(r"^(?P<kind>Queries|Answers)$"),
                None,
                None,
                Some("$(parentNamePrefix)$(kind)"),
                Some("$(show)"),
            )
            .unwrap();
        let mut a = attrs(None, None, Some("Queries"), None);
        engine.apply(Some("dns"), Some("dns"), &mut a);
        assert_eq!(a.name.as_deref(), Some("dns.queries"));
        assert_eq!(a.showname.as_deref(), Some("dns.queries"));
        assert_eq!(a.show.as_deref(), Some("Queries"));
        assert_eq!(a.value.as_deref(), Some("Queries"));
    }

    #[test]
    fn test_template_normalizes_name_output() {
        let mut engine = FixupEngine::new();
        engine
            .add_template(
                "x",
                None,
                None,
                None,
                None,
                None,
                Some("Foo  Bar-_baz"),
                None,
            )
            .unwrap();
        let mut a = attrs(None, None, Some("whatever"), Some("v"));
        engine.apply(Some("x"), None, &mut a);
        assert_eq!(a.name.as_deref(), Some("foo.bar.baz"));
        // value format absent: show and value are overwritten with None
        assert_eq!(a.show, None);
        assert_eq!(a.value, None);
    }

    #[test]
    fn test_template_implicit_keys_shadow_captures() {
        let mut engine = FixupEngine::new();
        engine
            .add_template(
                "x",
                None,
                None,
                Some(r"^(?P<show>\w+)"),
                None,
                None,
                None,
                Some("$(show) again"),
            )
            .unwrap();
        let mut a = attrs(None, None, Some("first rest"), None);
        engine.apply(Some("x"), None, &mut a);
        // the implicit "show" key (full attribute) wins over the capture
        assert_eq!(a.value.as_deref(), Some("first rest again"));
    }

    #[test]
    fn test_template_non_matching_regex_skips_rule() {
        let mut engine = FixupEngine::new();
        engine
            .add_template(
                "x",
                None,
                Some("^must.match$"),
                None,
                None,
                None,
                Some("newname"),
                None,
            )
            .unwrap();
        let mut a = attrs(Some("other"), None, Some("s"), None);
        engine.apply(Some("x"), None, &mut a);
        assert_eq!(a.name.as_deref(), Some("other"));
    }

    #[test]
    fn test_later_templates_overwrite_earlier() {
        let mut engine = FixupEngine::new();
        engine
            .add_template("x", None, None, None, None, None, Some("first"), None)
            .unwrap();
        engine
            .add_template("x", None, None, None, None, None, Some("second"), None)
            .unwrap();
        let mut a = attrs(None, None, Some("s"), None);
        engine.apply(Some("x"), None, &mut a);
        assert_eq!(a.name.as_deref(), Some("second"));
    }

    #[test]
    fn test_expand_unknown_key_is_empty() {
        assert_eq!(expand("a$(missing)b", &[]), "ab");
        assert_eq!(expand("plain", &[]), "plain");
        assert_eq!(expand("$(unclosed", &[]), "$(unclosed");
    }
}
