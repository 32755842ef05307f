//! Hierarchical key-prefix derivation
//!
//! Keys are grouped by their separator-delimited structure with every digit
//! folded to `0`, so `user:1000:profile` and `user:2000:profile` land in the
//! same `user:0000` group.

/// Default separator characters
pub const DEFAULT_SEPARATORS: &str = ":;,_-& ";

/// Replace every ASCII digit with `'0'`
pub fn normalize_digits(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_digit() { '0' } else { c })
        .collect()
}

/// Derive the deduplicated set of prefixes for `key`
///
/// Each prefix is the cumulative key up to a separator, with trailing
/// separators trimmed. The segment after the last separator is not a prefix
/// of its own; a key without any separator is its own single prefix. Empty
/// results are dropped. Order follows first occurrence.
pub fn derive_prefixes(key: &str, separators: &str) -> Vec<String> {
    let is_sep = |c: char| separators.contains(c);
    let normalized = normalize_digits(key);

    let mut raw = Vec::new();
    if !normalized.contains(is_sep) {
        raw.push(normalized);
    } else {
        let mut cumulative = String::with_capacity(normalized.len());
        let mut rest = normalized.as_str();
        while let Some(idx) = rest.find(is_sep) {
            // separators may be multi-byte when configured so
            let sep_len = rest[idx..].chars().next().map_or(1, char::len_utf8);
            let end = idx + sep_len;
            cumulative.push_str(&rest[..end]);
            raw.push(cumulative.clone());
            rest = &rest[end..];
        }
    }

    let mut prefixes: Vec<String> = Vec::with_capacity(raw.len());
    for prefix in raw {
        let trimmed = prefix.trim_end_matches(is_sep);
        if trimmed.is_empty() || prefixes.iter().any(|p| p == trimmed) {
            continue;
        }
        prefixes.push(trimmed.to_string());
    }
    prefixes
}
