//! Two-phase catalog fetch: paginated id enumeration, then concurrent
//! per-id hydration.
//!
//! Enumeration is sequential because each page's offset depends on the
//! previous page's size. Hydration fans out to a bounded pool of tasks and
//! funnels every result back through a single collector, so no shared
//! mutable state crosses task boundaries.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use fdrdict_shared::{
    CatalogEntry, EntryStub, FdrError, FetchConfig, MAX_PAGE_SIZE, Result, SkippedEntry,
    compare_ids,
};

use crate::cancel::CancelToken;
use crate::client::FalconClient;
use crate::retry::{RetryExhausted, RetryPolicy};

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Receives progress while a fetch runs. Called from the collecting task only.
pub trait FetchProgress: Send + Sync {
    /// A page of ids arrived. `reported_total` is whatever the server claimed.
    fn page_scanned(&self, ids_so_far: usize, reported_total: Option<u64>);
    /// One detail request finished, successfully or not.
    fn entry_hydrated(&self, done: usize, total: usize);
}

/// No-op progress sink.
pub struct SilentFetchProgress;

impl FetchProgress for SilentFetchProgress {
    fn page_scanned(&self, _ids_so_far: usize, _reported_total: Option<u64>) {}
    fn entry_hydrated(&self, _done: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Output of the enumeration phase.
#[derive(Debug, Clone)]
pub struct Enumeration {
    /// Ids in the order the server returned them.
    pub stubs: Vec<EntryStub>,
    /// Total from the first page's pagination metadata, if any.
    pub reported_total: Option<u64>,
    /// Query requests issued, including a trailing empty page.
    pub pages: u32,
}

/// Output of the hydration phase.
#[derive(Debug, Clone, Default)]
pub struct Hydration {
    /// Fetched records in completion order.
    pub entries: Vec<CatalogEntry>,
    /// Ids that exhausted their retries, sorted by id.
    pub skipped: Vec<SkippedEntry>,
}

/// Both phases together.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub stubs: Vec<EntryStub>,
    pub entries: Vec<CatalogEntry>,
    pub skipped: Vec<SkippedEntry>,
    pub reported_total: Option<u64>,
}

// ---------------------------------------------------------------------------
// SchemaFetcher
// ---------------------------------------------------------------------------

/// Fetches the full schema-events catalog through an authenticated client.
pub struct SchemaFetcher {
    client: FalconClient,
    page_size: u32,
    concurrency: usize,
    retry: RetryPolicy,
    cancel: CancelToken,
}

impl SchemaFetcher {
    pub fn new(client: FalconClient, config: &FetchConfig) -> Self {
        Self {
            client,
            page_size: config.page_size.clamp(1, MAX_PAGE_SIZE),
            concurrency: config.worker_concurrency.max(1) as usize,
            retry: RetryPolicy::from_config(config),
            cancel: CancelToken::never(),
        }
    }

    /// Observe `cancel` between pages and before every detail attempt.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Enumerate every id, `page_size` at a time.
    ///
    /// Stops at the first page shorter than `page_size` (including an empty
    /// one). The offset advances by the number of ids actually returned,
    /// and the server's reported total is never used to decide when to stop.
    /// Any failed page aborts the whole enumeration.
    #[instrument(skip(self, progress))]
    pub async fn fetch_all(
        &self,
        page_size: u32,
        progress: &dyn FetchProgress,
    ) -> Result<Enumeration> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

        let mut stubs: Vec<EntryStub> = Vec::new();
        let mut reported_total = None;
        let mut offset: u64 = 0;
        let mut pages: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(FdrError::Cancelled);
            }

            let page = self.client.query_page(page_size, offset).await?;
            pages += 1;
            if pages == 1 {
                reported_total = page.reported_total;
            }

            let count = page.ids.len();
            debug!(offset, count, "page received");
            offset += count as u64;
            stubs.extend(page.ids.into_iter().map(EntryStub::new));
            progress.page_scanned(stubs.len(), reported_total);

            if count < page_size as usize {
                break;
            }
        }

        if let Some(total) = reported_total.filter(|&t| t != stubs.len() as u64) {
            warn!(
                reported = total,
                enumerated = stubs.len(),
                "server-reported total differs from ids enumerated"
            );
        }

        info!(ids = stubs.len(), pages, "enumeration complete");

        Ok(Enumeration {
            stubs,
            reported_total,
            pages,
        })
    }

    /// Fetch one record, retrying transient failures per the retry policy.
    pub async fn fetch_detail(
        &self,
        id: &str,
    ) -> std::result::Result<CatalogEntry, RetryExhausted> {
        fetch_with_retry(&self.client, &self.retry, &self.cancel, id).await
    }

    /// Fetch the record for every stub with bounded concurrency.
    ///
    /// Ids that exhaust their retries are skipped and reported. An
    /// authentication or permission failure aborts the run, as does
    /// cancellation. Duplicate ids are fetched once.
    #[instrument(skip_all, fields(ids = stubs.len(), workers = self.concurrency))]
    pub async fn hydrate(
        &self,
        stubs: &[EntryStub],
        progress: &dyn FetchProgress,
    ) -> Result<Hydration> {
        if self.cancel.is_cancelled() {
            return Err(FdrError::Cancelled);
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut seen = HashSet::new();

        for stub in stubs {
            if !seen.insert(stub.id.as_str()) {
                debug!(id = %stub.id, "duplicate id, fetching once");
                continue;
            }

            let client = self.client.clone();
            let retry = self.retry.clone();
            let cancel = self.cancel.clone();
            let sem = semaphore.clone();
            let id = stub.id.clone();

            tasks.spawn(async move {
                let outcome = match sem.acquire_owned().await {
                    Ok(_permit) => fetch_with_retry(&client, &retry, &cancel, &id).await,
                    Err(_) => Err(RetryExhausted {
                        error: FdrError::Cancelled,
                        attempts: 0,
                    }),
                };
                (id, outcome)
            });
        }

        let total = tasks.len();
        let mut hydration = Hydration {
            entries: Vec::with_capacity(total),
            skipped: Vec::new(),
        };
        let mut done = 0;

        while let Some(joined) = tasks.join_next().await {
            let (id, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tasks.abort_all();
                    return Err(FdrError::transport(format!("detail worker failed: {e}")));
                }
            };
            done += 1;

            match outcome {
                Ok(entry) => hydration.entries.push(entry),
                Err(RetryExhausted { error, .. }) if error.is_fatal() => {
                    tasks.abort_all();
                    warn!(%id, error = %error, "aborting hydration");
                    return Err(error);
                }
                Err(RetryExhausted { error, attempts }) => {
                    warn!(%id, attempts, error = %error, "skipping entry");
                    hydration.skipped.push(SkippedEntry {
                        id,
                        reason: error.to_string(),
                        attempts,
                    });
                }
            }
            progress.entry_hydrated(done, total);
        }

        if self.cancel.is_cancelled() {
            return Err(FdrError::Cancelled);
        }

        hydration.skipped.sort_by(|a, b| compare_ids(&a.id, &b.id));

        info!(
            fetched = hydration.entries.len(),
            skipped = hydration.skipped.len(),
            "hydration complete"
        );

        Ok(hydration)
    }

    /// Enumerate, then hydrate.
    pub async fn fetch_catalog(&self, progress: &dyn FetchProgress) -> Result<FetchOutcome> {
        let enumeration = self.fetch_all(self.page_size, progress).await?;
        let hydration = self.hydrate(&enumeration.stubs, progress).await?;

        Ok(FetchOutcome {
            stubs: enumeration.stubs,
            entries: hydration.entries,
            skipped: hydration.skipped,
            reported_total: enumeration.reported_total,
        })
    }
}

async fn fetch_with_retry(
    client: &FalconClient,
    retry: &RetryPolicy,
    cancel: &CancelToken,
    id: &str,
) -> std::result::Result<CatalogEntry, RetryExhausted> {
    retry.run(cancel, || client.get_entry(id)).await
}
