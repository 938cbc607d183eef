//! Baseline schema handling.

/// Splits a schema script into statements on `;`.
///
/// Each piece is trimmed and empty pieces are dropped, so doubled and
/// trailing delimiters produce nothing. Delimiters inside string literals or
/// comments are not special.
pub fn split_statements(script: &str) -> Vec<String> {
    script
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .map(String::from)
        .collect()
}
