//! Natural-key and field normalization for imported contacts.

use std::collections::BTreeSet;

/// Canonicalize an email address for matching: trimmed and lower-cased.
///
/// Total over any input; whether the result is a valid address is checked
/// separately by the executor.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Collapse `None`, `""` and whitespace-only text into `None`, trimming the rest.
pub fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Owned variant of [`blank_to_none`] used when building the write form of a record.
pub fn normalize_optional_text(value: Option<String>) -> Option<String> {
    blank_to_none(value.as_deref()).map(str::to_string)
}

/// Source tags as a set: trimmed, blanks dropped, duplicates removed.
pub fn source_set<'a, I>(tags: I) -> BTreeSet<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    tags.into_iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Minimal shape check applied before a candidate reaches the store.
pub fn looks_like_email(normalized: &str) -> bool {
    match normalized.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
