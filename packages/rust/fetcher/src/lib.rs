//! Schema-events catalog fetching.
//!
//! Provides:
//! - [`FalconClient`] — OAuth2-authenticated HTTP client with status classification
//! - [`SchemaFetcher`] — paginated enumeration plus concurrent hydration
//! - [`RetryPolicy`] — bounded exponential backoff for transient failures
//! - [`cancel_pair`] — cooperative cancellation between the caller and workers

pub mod cancel;
pub mod client;
pub mod engine;
pub mod retry;

pub use cancel::{CancelHandle, CancelToken, cancel_pair};
pub use client::{FalconClient, IdPage};
pub use engine::{
    Enumeration, FetchOutcome, FetchProgress, Hydration, SchemaFetcher, SilentFetchProgress,
};
pub use retry::{RetryExhausted, RetryPolicy};
