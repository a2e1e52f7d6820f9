//! Core workflows and domain logic for fdrdict.
//!
//! This crate ties the fetcher and the tagging engine together into
//! end-to-end workflows (`generate`, `tag`, `validate`) and owns catalog
//! assembly and persistence.

pub mod assembler;
pub mod enrichment;
pub mod pipeline;
pub mod store;

pub use assembler::{Assembly, assemble};
pub use enrichment::{tag_dictionary, tag_entry};
pub use pipeline::{
    GenerateConfig, GenerateResult, ProgressReporter, SilentProgress, TagConfig, TagResult,
    ValidationReport, generate_catalog, tag_catalog_file, validate_credentials,
};
pub use store::{read_catalog, write_catalog};
