//! End-to-end workflows: `generate` (fetch → assemble → write), `tag`
//! (read → enrich → write) and `validate` (authenticate → one-id page).

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use url::Url;

use fdrdict_fetcher::{CancelToken, FalconClient, FetchProgress, SchemaFetcher};
use fdrdict_shared::{
    Credentials, FdrError, FetchConfig, Result, SkippedEntry, UnmatchedEntry, compare_ids,
};
use fdrdict_tagging::load_keyword_table;

use crate::assembler::assemble;
use crate::enrichment::tag_dictionary;
use crate::store::{read_catalog, write_catalog};

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting workflow status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each enumeration page.
    fn ids_enumerated(&self, so_far: usize, reported_total: Option<u64>);
    /// Called after each detail request finishes.
    fn entry_fetched(&self, done: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn ids_enumerated(&self, _so_far: usize, _reported_total: Option<u64>) {}
    fn entry_fetched(&self, _done: usize, _total: usize) {}
}

/// Adapts a `ProgressReporter` to the fetcher's `FetchProgress` interface.
struct PipelineFetchProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl FetchProgress for PipelineFetchProgress<'_> {
    fn page_scanned(&self, ids_so_far: usize, reported_total: Option<u64>) {
        self.inner.ids_enumerated(ids_so_far, reported_total);
    }

    fn entry_hydrated(&self, done: usize, total: usize) {
        self.inner.entry_fetched(done, total);
    }
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

/// Configuration for [`generate_catalog`].
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub fetch: FetchConfig,
    pub credentials: Credentials,
    /// Catalog file to write.
    pub output_path: PathBuf,
}

/// Result of [`generate_catalog`].
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub output_path: PathBuf,
    /// Entries written.
    pub entry_count: usize,
    /// Ids enumerated (before hydration).
    pub enumerated: usize,
    /// Total claimed by the server on the first page.
    pub reported_total: Option<u64>,
    /// Ids left out of the catalog, sorted by id.
    pub skipped: Vec<SkippedEntry>,
    pub generated_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Fetch the full catalog and write it to `config.output_path`.
///
/// 1. Authenticate
/// 2. Enumerate ids
/// 3. Hydrate details
/// 4. Assemble
/// 5. Write (only if not cancelled)
#[instrument(skip_all, fields(base_url = %config.fetch.base_url, output = %config.output_path.display()))]
pub async fn generate_catalog(
    config: &GenerateConfig,
    cancel: CancelToken,
    progress: &dyn ProgressReporter,
) -> Result<GenerateResult> {
    let start = Instant::now();
    let fetch_progress = PipelineFetchProgress { inner: progress };

    // --- Phase 1: Authenticate ---
    progress.phase("Authenticating");
    let client = FalconClient::authenticate(&config.fetch, &config.credentials).await?;
    let fetcher = SchemaFetcher::new(client, &config.fetch).with_cancel(cancel.clone());

    // --- Phase 2: Enumerate ---
    progress.phase("Enumerating event schemas");
    let enumeration = fetcher
        .fetch_all(config.fetch.page_size, &fetch_progress)
        .await?;

    // --- Phase 3: Hydrate ---
    progress.phase("Fetching schema details");
    let hydration = fetcher.hydrate(&enumeration.stubs, &fetch_progress).await?;

    // --- Phase 4: Assemble ---
    progress.phase("Assembling catalog");
    let assembly = assemble(&enumeration.stubs, hydration.entries)?;

    let mut skipped = hydration.skipped;
    for id in assembly.missing {
        if !skipped.iter().any(|s| s.id == id) {
            skipped.push(SkippedEntry {
                id,
                reason: "no detail record returned for this id".into(),
                attempts: 1,
            });
        }
    }
    skipped.sort_by(|a, b| compare_ids(&a.id, &b.id));

    // --- Phase 5: Write ---
    if cancel.is_cancelled() {
        return Err(FdrError::Cancelled);
    }
    progress.phase("Writing catalog");
    write_catalog(&config.output_path, &assembly.catalog)?;

    let result = GenerateResult {
        output_path: config.output_path.clone(),
        entry_count: assembly.catalog.len(),
        enumerated: enumeration.stubs.len(),
        reported_total: enumeration.reported_total,
        skipped,
        generated_at: Utc::now(),
        elapsed: start.elapsed(),
    };

    if !result.skipped.is_empty() {
        warn!(
            skipped = result.skipped.len(),
            "catalog is incomplete, some ids could not be fetched"
        );
    }

    info!(
        entries = result.entry_count,
        enumerated = result.enumerated,
        skipped = result.skipped.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "generate complete"
    );

    Ok(result)
}

// ---------------------------------------------------------------------------
// tag
// ---------------------------------------------------------------------------

/// Configuration for [`tag_catalog_file`].
#[derive(Debug, Clone)]
pub struct TagConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Extra keyword files merged onto the table, in order.
    pub tag_files: Vec<PathBuf>,
    /// Start from the bundled keyword table.
    pub include_defaults: bool,
}

/// Result of [`tag_catalog_file`].
#[derive(Debug, Clone)]
pub struct TagResult {
    pub output_path: PathBuf,
    pub entry_count: usize,
    /// Entries with no tag, in catalog order.
    pub unmatched: Vec<UnmatchedEntry>,
    /// Keyword files that merged successfully.
    pub loaded_tag_files: Vec<PathBuf>,
    /// One message per keyword file that could not be used.
    pub tag_file_errors: Vec<String>,
    pub tag_count: usize,
}

impl TagResult {
    pub fn tagged_count(&self) -> usize {
        self.entry_count - self.unmatched.len()
    }
}

/// Tag an existing catalog file and write the result.
#[instrument(skip_all, fields(input = %config.input_path.display(), output = %config.output_path.display()))]
pub fn tag_catalog_file(config: &TagConfig, progress: &dyn ProgressReporter) -> Result<TagResult> {
    progress.phase("Loading keyword tables");
    let outcome = load_keyword_table(&config.tag_files, config.include_defaults)?;
    if outcome.table.is_empty() {
        return Err(FdrError::validation(
            "keyword table is empty: no tag file could be loaded and defaults are disabled",
        ));
    }
    let tag_file_errors: Vec<String> = outcome.failures.iter().map(ToString::to_string).collect();

    progress.phase("Reading catalog");
    let catalog = read_catalog(&config.input_path)?;

    progress.phase("Tagging entries");
    let (tagged, unmatched) = tag_dictionary(&catalog, &outcome.table);

    progress.phase("Writing catalog");
    write_catalog(&config.output_path, &tagged)?;

    Ok(TagResult {
        output_path: config.output_path.clone(),
        entry_count: tagged.len(),
        unmatched,
        loaded_tag_files: outcome.loaded,
        tag_file_errors,
        tag_count: outcome.table.len(),
    })
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// What a successful credential check found.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub base_url: Url,
    /// Catalog size claimed by the server.
    pub reported_total: Option<u64>,
}

/// Authenticate and request a single id to prove the credentials carry the
/// required scope.
#[instrument(skip_all, fields(base_url = %fetch.base_url))]
pub async fn validate_credentials(
    fetch: &FetchConfig,
    credentials: &Credentials,
) -> Result<ValidationReport> {
    let client = FalconClient::authenticate(fetch, credentials).await?;
    let page = client.query_page(1, 0).await?;

    info!(reported_total = ?page.reported_total, "credentials valid");

    Ok(ValidationReport {
        base_url: client.base_url().clone(),
        reported_total: page.reported_total,
    })
}
