//! SQL identifier escaping and length limiting.

/// Maximum identifier length after escaping.
pub const MAX_IDENTIFIER_LEN: usize = 96;

/// Escape a logical name into a safe SQL identifier.
///
/// Every non-alphanumeric character becomes `_`; names beyond
/// [`MAX_IDENTIFIER_LEN`] lose a contiguous span near the middle,
/// replaced by `___`, so the leading and trailing segments stay
/// readable. Deterministic for the same input.
pub fn escape_identifier(name: &str) -> String {
    let escaped: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    truncate_identifier(&escaped)
}

fn truncate_identifier(name: &str) -> String {
    if name.len() <= MAX_IDENTIFIER_LEN {
        return name.to_string();
    }
    let keep = MAX_IDENTIFIER_LEN - 3;
    let head = keep / 2;
    let tail = keep - head;
    format!("{}___{}", &name[..head], &name[name.len() - tail..])
}
