//! Keyword-to-tag classification over free text.

use crate::keywords::KeywordTable;

/// Tags whose keywords occur in `text`, in table order.
///
/// Matching is a case-insensitive substring test, so a keyword also matches
/// inside longer words ("cert" matches "certificate"). A tag appears at most
/// once however many of its keywords match. An empty result means the text
/// is unmatched.
pub fn extract_tags(text: &str, table: &KeywordTable) -> Vec<String> {
    let haystack = text.to_lowercase();

    table
        .iter()
        .filter(|(_, keywords)| {
            keywords
                .iter()
                .any(|keyword| haystack.contains(keyword.as_str()))
        })
        .map(|(tag, _)| tag.to_string())
        .collect()
}
