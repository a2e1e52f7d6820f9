//! Tag enrichment over a whole catalog.

use tracing::{info, instrument};

use fdrdict_shared::{Catalog, CatalogEntry, UnmatchedEntry};
use fdrdict_tagging::{KeywordTable, expand_name, extract_tags};

/// Text the classifier sees for an entry: its description followed by the
/// expanded name. Platform and fields are not part of it.
pub fn candidate_text(description: &str, name_expanded: &str) -> String {
    format!("{description} {name_expanded}")
}

/// Return a copy of `entry` with `name_expanded` and `tags` set.
///
/// Both fields are derived from `name` and `description` only, so tagging
/// an already-tagged entry gives the same result.
pub fn tag_entry(entry: &CatalogEntry, table: &KeywordTable) -> CatalogEntry {
    let name_expanded = expand_name(&entry.name);
    let tags = extract_tags(&candidate_text(&entry.description, &name_expanded), table);

    let mut tagged = entry.clone();
    tagged.name_expanded = Some(name_expanded);
    tagged.tags = Some(tags);
    tagged
}

/// Tag every entry, returning the new catalog and the entries no tag matched.
///
/// Unmatched entries stay in the catalog with an empty tag list. The report
/// follows catalog order.
#[instrument(skip_all, fields(entries = catalog.len(), tags = table.len()))]
pub fn tag_dictionary(catalog: &Catalog, table: &KeywordTable) -> (Catalog, Vec<UnmatchedEntry>) {
    let mut unmatched = Vec::new();

    let entries: Vec<CatalogEntry> = catalog
        .iter()
        .map(|entry| {
            let tagged = tag_entry(entry, table);
            if tagged.tags.as_ref().is_none_or(Vec::is_empty) {
                unmatched.push(UnmatchedEntry {
                    id: tagged.id.clone(),
                    name: tagged.name.clone(),
                });
            }
            tagged
        })
        .collect();

    info!(
        tagged = entries.len() - unmatched.len(),
        unmatched = unmatched.len(),
        "tagging complete"
    );

    (Catalog::new(entries), unmatched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> KeywordTable {
        KeywordTable::from_pairs([
            ("file", vec!["file", "manifest"]),
            ("download", vec!["download"]),
            ("info", vec!["info", "config"]),
            ("unix", vec!["linux", "unix"]),
        ])
    }

    #[test]
    fn test_sys_config_info_end_to_end() {
        let catalog = Catalog::new(vec![
            CatalogEntry::new("1", "SysConfigInfo").with_platform("linux"),
        ]);
        let (tagged, unmatched) = tag_dictionary(&catalog, &table());

        let entry = &tagged.entries()[0];
        assert_eq!(entry.name_expanded.as_deref(), Some("Sys Config Info"));
        // Platform is not part of the candidate text, so "unix" does not match.
        assert_eq!(entry.tags, Some(vec!["info".to_string()]));
        assert!(unmatched.is_empty());
    }

    #[test]
    fn test_description_drives_tags() {
        let entry = CatalogEntry::new("2", "LFODownloadActor")
            .with_description("Sent when a manifest file was downloaded.");
        let tagged = tag_entry(&entry, &table());

        assert_eq!(
            tagged.tags,
            Some(vec!["file".to_string(), "download".to_string()])
        );
        assert_eq!(tagged.name_expanded.as_deref(), Some("LFO Download Actor"));
    }

    #[test]
    fn test_unmatched_reported_and_kept() {
        let catalog = Catalog::new(vec![
            CatalogEntry::new("3", "Heartbeat").with_description("Periodic check-in."),
            CatalogEntry::new("1", "FileWritten"),
        ]);
        let (tagged, unmatched) = tag_dictionary(&catalog, &table());

        assert_eq!(tagged.len(), 2);
        assert_eq!(
            unmatched,
            vec![UnmatchedEntry {
                id: "3".into(),
                name: "Heartbeat".into()
            }]
        );
        assert_eq!(tagged.entries()[1].tags, Some(Vec::new()));
    }

    #[test]
    fn test_retagging_is_idempotent() {
        let catalog = Catalog::new(vec![
            CatalogEntry::new("1", "ConfigStateUpdate").with_description("A file changed."),
            CatalogEntry::new("2", "Heartbeat"),
        ]);
        let (once, unmatched_once) = tag_dictionary(&catalog, &table());
        let (twice, unmatched_twice) = tag_dictionary(&once, &table());

        assert_eq!(once, twice);
        assert_eq!(unmatched_once, unmatched_twice);
    }

    #[test]
    fn test_input_catalog_untouched() {
        let catalog = Catalog::new(vec![CatalogEntry::new("1", "FileWritten")]);
        let _ = tag_dictionary(&catalog, &table());
        assert!(catalog.entries()[0].tags.is_none());
        assert!(catalog.entries()[0].name_expanded.is_none());
    }

    #[test]
    fn test_candidate_text_joins_with_space() {
        assert_eq!(candidate_text("", "Sys Config Info"), " Sys Config Info");
        assert_eq!(candidate_text("Desc.", "Name"), "Desc. Name");
    }
}
