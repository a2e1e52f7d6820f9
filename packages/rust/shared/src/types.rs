//! Core domain types for the FDR event dictionary.

use std::cmp::Ordering;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// CatalogEntry
// ---------------------------------------------------------------------------

/// One event-schema record from the schema-events catalog.
///
/// Only `id`, `name`, and `description` are interpreted. Everything else is
/// carried through unchanged, including keys this type does not know about.
/// Opaque provenance keys such as `base_id` and `version` live in `extra`,
/// so a `null` value survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Numeric-string identifier, unique within a catalog.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// CamelCase short identifier (e.g. `ProcessRollup2`).
    #[serde(default, deserialize_with = "string_or_null")]
    pub name: String,
    /// Free-text description, empty when the vendor provides none.
    #[serde(default, deserialize_with = "string_or_null")]
    pub description: String,
    /// Platform family (`windows`, `linux`, `mac`, ...). Not validated.
    #[serde(default, deserialize_with = "string_or_null")]
    pub platform: String,
    /// Schema fields in vendor order. A `null` list reads as empty.
    #[serde(default, deserialize_with = "vec_or_null")]
    pub fields: Vec<EventField>,
    /// Human-readable expansion of `name`; set by tagging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_expanded: Option<String>,
    /// Topical tags in first-match order; set by tagging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Unrecognised keys, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogEntry {
    /// Minimal entry, mostly useful for fixtures.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            platform: String::new(),
            fields: Vec::new(),
            name_expanded: None,
            tags: None,
            extra: Map::new(),
        }
    }

    /// Builder-style description setter.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder-style platform setter.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }
}

/// A field within an event schema. Never interpreted, only passed through.
///
/// The vendor record (`id`, `name`, `optional`, `version_added`, ...) is kept
/// as-is, nulls included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventField {
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl EventField {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// EntryStub
// ---------------------------------------------------------------------------

/// An id discovered during enumeration, not yet hydrated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryStub {
    pub id: String,
}

impl EntryStub {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// An ordered collection of catalog entries, always sorted by numeric id.
///
/// Ids that are not unsigned integers sort after all numeric ids,
/// lexicographically among themselves.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Vec<CatalogEntry>")]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Build a catalog, sorting entries by id. The sort is stable.
    pub fn new(mut entries: Vec<CatalogEntry>) -> Self {
        entries.sort_by(|a, b| compare_ids(&a.id, &b.id));
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CatalogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<CatalogEntry> {
        self.entries
    }
}

impl From<Vec<CatalogEntry>> for Catalog {
    fn from(entries: Vec<CatalogEntry>) -> Self {
        Self::new(entries)
    }
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Order two entry ids by numeric value, falling back to string order.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// An entry that matched no tag during enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedEntry {
    pub id: String,
    pub name: String,
}

/// An id whose detail record could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub id: String,
    /// Last error seen for this id.
    pub reason: String,
    /// Number of attempts made before giving up.
    pub attempts: u32,
}

// ---------------------------------------------------------------------------
// Lenient field decoding
// ---------------------------------------------------------------------------

fn string_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn vec_or_null<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
