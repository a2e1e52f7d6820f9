//! Catalog assembler.
//!
//! Joins the enumerated id list with the hydrated detail records and
//! produces the one ordered, duplicate-free [`Catalog`] handed to every
//! downstream consumer.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, instrument, warn};

use fdrdict_shared::{Catalog, CatalogEntry, EntryStub, FdrError, Result};

/// Output of a successful assembly.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// Entries sorted by ascending numeric id.
    pub catalog: Catalog,
    /// Stub ids with no detail record, in enumeration order.
    pub missing: Vec<String>,
}

/// Build the catalog from enumerated stubs and fetched details.
///
/// Details are keyed by id with the last record for an id winning. Stubs
/// without a detail are left out of the catalog and listed in
/// [`Assembly::missing`]; details for ids that were never enumerated are
/// ignored. Fails only when stubs were given but nothing could be assembled.
#[instrument(skip_all, fields(stubs = stubs.len(), details = details.len()))]
pub fn assemble(stubs: &[EntryStub], details: Vec<CatalogEntry>) -> Result<Assembly> {
    let mut by_id: HashMap<String, CatalogEntry> = HashMap::with_capacity(details.len());
    for entry in details {
        if let Some(previous) = by_id.insert(entry.id.clone(), entry) {
            debug!(id = %previous.id, "duplicate detail record, keeping the later one");
        }
    }

    let mut seen = HashSet::with_capacity(stubs.len());
    let mut entries = Vec::with_capacity(stubs.len());
    let mut missing = Vec::new();

    for stub in stubs {
        if !seen.insert(stub.id.as_str()) {
            continue;
        }
        match by_id.remove(&stub.id) {
            Some(entry) => entries.push(entry),
            None => missing.push(stub.id.clone()),
        }
    }

    if !by_id.is_empty() {
        warn!(
            count = by_id.len(),
            "detail records for ids that were never enumerated, ignoring"
        );
    }

    if entries.is_empty() && !stubs.is_empty() {
        return Err(FdrError::Assembly(format!(
            "no detail records for any of the {} enumerated ids",
            seen.len()
        )));
    }

    let catalog = Catalog::new(entries);
    info!(entries = catalog.len(), missing = missing.len(), "catalog assembled");

    Ok(Assembly { catalog, missing })
}
