//! Shared types, error model, and configuration for fdrdict.
//!
//! This crate is the foundation depended on by all other fdrdict crates.
//! It provides:
//! - [`FdrError`] — the unified error type
//! - Domain types ([`CatalogEntry`], [`Catalog`], report rows)
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CloudRegion, Credentials, DEFAULT_PAGE_SIZE, FalconConfig, FetchConfig,
    FetchSettings, MAX_PAGE_SIZE, OutputConfig, TagsConfig, config_dir, config_file_path,
    init_config, init_config_at, load_config, load_config_from, resolve_credentials,
};
pub use error::{FdrError, Result};
pub use types::{
    Catalog, CatalogEntry, EntryStub, EventField, SkippedEntry, UnmatchedEntry, compare_ids,
};
