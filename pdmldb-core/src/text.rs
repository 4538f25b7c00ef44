//! Small text utilities shared across the pipeline.
//!
//! Everything here is a pure function over strings: integer parsing in
//! the dissector's notations, hex encoding, the two name-mangling rules
//! (the flatten filter and the fixup normalizer) and dotted-name
//! combination.

/// Parse a signed integer in decimal, `0x…` or `&h…` notation.
pub fn parse_i64(text: &str) -> Option<i64> {
    let t = text.trim();
    if let Some(hex) = strip_hex_prefix(t) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        t.parse().ok()
    }
}

/// Parse an unsigned integer in decimal, `0x…` or `&h…` notation.
pub fn parse_u64(text: &str) -> Option<u64> {
    let t = text.trim();
    if let Some(hex) = strip_hex_prefix(t) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        t.parse().ok()
    }
}

/// Strip a `0x` or `&h` prefix (either case), if present.
pub fn strip_hex_prefix(text: &str) -> Option<&str> {
    if text.len() < 2 {
        return None;
    }
    let (prefix, rest) = text.split_at(2);
    match prefix {
        "0x" | "0X" | "&h" | "&H" => Some(rest),
        _ => None,
    }
}

/// Decode an even-length hex string into bytes.
///
/// The empty string decodes to an empty vector. Odd length or non-hex
/// characters return `None`.
pub fn parse_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks_exact(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push((hi * 16 + lo) as u8);
    }
    Some(out)
}

/// Encode bytes as lowercase hex.
pub fn print_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// The flatten name filter.
///
/// Keeps alphanumerics (lowercased), maps `.`, space, `_` and `-` to
/// `.`, and drops everything else. Idempotent: filtering a filtered
/// name is a no-op.
pub fn filter_name(name: &str) -> String {
    name.chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if matches!(c, '.' | ' ' | '_' | '-') {
                Some('.')
            } else {
                None
            }
        })
        .collect()
}

/// The fixup name normalizer.
///
/// Keeps alphanumerics (lowercased); any run of other characters
/// collapses to a single `.`; a trailing `.` is trimmed.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dot = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dot = false;
        } else if !last_dot {
            out.push('.');
            last_dot = true;
        }
    }
    while out.ends_with('.') {
        out.pop();
    }
    out
}

/// Merge a dotted naming prefix with a dotted row name.
///
/// The longest contiguous dotted suffix of `prefix` that equals a
/// dotted prefix of `suffix` is elided, so `a.b.c` + `b.c.d` becomes
/// `a.b.c.d`. The result never has two identical adjacent segments at
/// the join boundary.
pub fn combine_names(prefix: &str, suffix: &str) -> String {
    if prefix.is_empty() {
        return suffix.to_string();
    }
    if suffix.is_empty() {
        return prefix.to_string();
    }
    let pre: Vec<&str> = prefix.split('.').collect();
    let suf: Vec<&str> = suffix.split('.').collect();
    let max = pre.len().min(suf.len());
    let mut overlap = 0;
    for k in (1..=max).rev() {
        if pre[pre.len() - k..] == suf[..k] {
            overlap = k;
            break;
        }
    }
    let mut out = String::with_capacity(prefix.len() + suffix.len() + 1);
    out.push_str(prefix);
    for seg in &suf[overlap..] {
        out.push('.');
        out.push_str(seg);
    }
    out
}
