//! Key extraction from `ioreg` plist-style text output.
//!
//! Registry dumps render properties as `"Key" = value` (entry level) or
//! `"Key"=value` (inside inline dictionaries). Both spellings appear in the
//! same dump, so the scanner accepts either.

/// All unsigned integer values recorded under `key`, in document order.
pub fn quoted_key_values(output: &str, key: &str) -> Vec<u64> {
    let needle = format!("\"{key}\"");
    let mut values = Vec::new();
    let mut rest = output;
    while let Some(pos) = rest.find(&needle) {
        rest = &rest[pos + needle.len()..];
        let after = rest.trim_start();
        let Some(after_eq) = after.strip_prefix('=') else {
            continue;
        };
        let number = after_eq.trim_start();
        let digits: &str = number
            .split(|c: char| !c.is_ascii_digit())
            .next()
            .unwrap_or("");
        if let Ok(value) = digits.parse::<u64>() {
            values.push(value);
        }
    }
    values
}

/// First unsigned integer value recorded under `key`, if any.
pub fn quoted_key_value(output: &str, key: &str) -> Option<u64> {
    quoted_key_values(output, key).into_iter().next()
}
