//! Name expansion and keyword-based tagging for FDR event schemas.
//!
//! This crate provides:
//! - [`expand_name`] — CamelCase event names to space-separated words
//! - [`KeywordTable`] — immutable tag → keyword mapping, merged from YAML sources
//! - [`extract_tags`] — substring-based tag classification over free text
//!
//! Everything here is pure: no I/O outside [`load_keyword_table`] and
//! [`load_tag_file`], and no shared mutable state.

mod classify;
mod expand;
mod keywords;

pub use classify::extract_tags;
pub use expand::expand_name;
pub use keywords::{KeywordTable, TagKeywords, TagLoadOutcome, load_keyword_table, load_tag_file};
