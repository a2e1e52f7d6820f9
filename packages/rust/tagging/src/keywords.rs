//! Keyword tables: tag name → keywords, merged from YAML sources.
//!
//! A table is built once at configuration time and never mutated afterwards.
//! Merging is a union: a later source can add tags and keywords but never
//! removes a keyword an earlier source contributed.

use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::{debug, info, warn};

use fdrdict_shared::{FdrError, Result};

/// The keyword table shipped with the crate.
const BUNDLED_TAGS: &str = include_str!("../tags/default_tags.yaml");

/// Pseudo-path used in errors about the bundled table.
const BUNDLED_ORIGIN: &str = "<bundled default_tags.yaml>";

// ---------------------------------------------------------------------------
// KeywordTable
// ---------------------------------------------------------------------------

/// One tag and its keywords, lower-cased and deduplicated in first-seen order.
///
/// Surrounding whitespace is kept: `" pe "` only matches `pe` as a separate
/// word, not inside "type".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagKeywords {
    pub tag: String,
    pub keywords: Vec<String>,
}

/// Ordered mapping from tag name to keyword set.
///
/// Iteration order is the order in which tags were first seen across the
/// merged sources, which is also the order tags appear in classification
/// results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordTable {
    tags: Vec<TagKeywords>,
}

impl KeywordTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(tag, keywords)` pairs, merging repeated tags.
    pub fn from_pairs<I, T, K, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, K)>,
        T: Into<String>,
        K: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for (tag, keywords) in pairs {
            table.union_tag(tag.into(), keywords);
        }
        table
    }

    /// The table bundled with the crate.
    pub fn bundled() -> Result<Self> {
        let (table, _warnings) = Self::from_yaml_str(BUNDLED_TAGS, Path::new(BUNDLED_ORIGIN))?;
        Ok(table)
    }

    /// Parse a YAML mapping of `tag: [keyword, ...]`.
    ///
    /// Entries that are not a list of strings are skipped and reported in the
    /// returned warnings. A document that is not a mapping at all, or is not
    /// valid YAML, is a [`FdrError::TagLoad`]. An empty document yields an
    /// empty table.
    pub fn from_yaml_str(source: &str, origin: &Path) -> Result<(Self, Vec<String>)> {
        let doc: Value = serde_yaml::from_str(source).map_err(|e| FdrError::TagLoad {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;

        let mapping = match doc {
            Value::Null => return Ok((Self::new(), vec!["empty tag file".to_string()])),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(FdrError::TagLoad {
                    path: origin.to_path_buf(),
                    message: format!("expected a mapping of tag to keyword list, got {}", kind(&other)),
                });
            }
        };

        let mut table = Self::new();
        let mut warnings = Vec::new();

        for (key, words) in mapping {
            let Some(tag) = scalar_to_string(&key) else {
                warnings.push(format!("skipping entry with non-string tag {}", kind(&key)));
                continue;
            };

            let items = match words {
                Value::Sequence(items) => items,
                other => {
                    warnings.push(format!(
                        "tag '{tag}' has invalid format ({}), skipping",
                        kind(&other)
                    ));
                    continue;
                }
            };

            let mut keywords = Vec::with_capacity(items.len());
            for item in &items {
                match scalar_to_string(item) {
                    Some(word) => keywords.push(word),
                    None => warnings.push(format!("tag '{tag}': skipping non-string keyword")),
                }
            }

            table.union_tag(tag, keywords);
        }

        Ok((table, warnings))
    }

    /// Union `other` onto this table. Tags new to `self` are appended in
    /// `other`'s order; shared tags gain any keywords they were missing.
    pub fn merge(mut self, other: KeywordTable) -> Self {
        for entry in other.tags {
            self.union_tag(entry.tag, entry.keywords);
        }
        self
    }

    /// Iterate `(tag, keywords)` in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tags.iter().map(|t| (t.tag.as_str(), t.keywords.as_slice()))
    }

    /// Keywords for a tag, if present.
    pub fn get(&self, tag: &str) -> Option<&[String]> {
        self.tags
            .iter()
            .find(|t| t.tag == tag)
            .map(|t| t.keywords.as_slice())
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn keyword_count(&self) -> usize {
        self.tags.iter().map(|t| t.keywords.len()).sum()
    }

    fn union_tag<K, S>(&mut self, tag: String, keywords: K)
    where
        K: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let index = match self.tags.iter().position(|t| t.tag == tag) {
            Some(index) => index,
            None => {
                self.tags.push(TagKeywords {
                    tag,
                    keywords: Vec::new(),
                });
                self.tags.len() - 1
            }
        };

        let existing = &mut self.tags[index].keywords;
        for keyword in keywords {
            // Blank keywords would match every text.
            if keyword.as_ref().trim().is_empty() {
                continue;
            }
            let normalized = keyword.as_ref().to_lowercase();
            if !existing.contains(&normalized) {
                existing.push(normalized);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Loading from files
// ---------------------------------------------------------------------------

/// Result of loading keyword sources from disk.
#[derive(Debug)]
pub struct TagLoadOutcome {
    /// The merged table from every source that loaded.
    pub table: KeywordTable,
    /// Files that contributed to the table, in merge order.
    pub loaded: Vec<PathBuf>,
    /// One error per file that could not be used. These never abort the load.
    pub failures: Vec<FdrError>,
}

/// Load the keyword table: the bundled defaults (if `include_defaults`), then
/// each file in `files` unioned on top, in order.
///
/// A missing or malformed file is recorded in [`TagLoadOutcome::failures`] and
/// the remaining sources still apply.
pub fn load_keyword_table(files: &[PathBuf], include_defaults: bool) -> Result<TagLoadOutcome> {
    let mut table = if include_defaults {
        KeywordTable::bundled()?
    } else {
        KeywordTable::new()
    };
    let mut loaded = Vec::new();
    let mut failures = Vec::new();

    for path in files {
        match load_tag_file(path) {
            Ok(file_table) => {
                debug!(path = %path.display(), tags = file_table.len(), "merging tag file");
                table = table.merge(file_table);
                loaded.push(path.clone());
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping tag file");
                failures.push(e);
            }
        }
    }

    info!(
        tags = table.len(),
        keywords = table.keyword_count(),
        files = loaded.len(),
        failed = failures.len(),
        "keyword table ready"
    );

    Ok(TagLoadOutcome {
        table,
        loaded,
        failures,
    })
}

/// Load a single YAML tag file.
pub fn load_tag_file(path: &Path) -> Result<KeywordTable> {
    let content = std::fs::read_to_string(path).map_err(|e| FdrError::TagLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let (table, warnings) = KeywordTable::from_yaml_str(&content, path)?;
    for warning in &warnings {
        warn!(path = %path.display(), "{warning}");
    }

    Ok(table)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
