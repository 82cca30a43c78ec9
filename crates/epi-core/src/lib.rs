//! Pipeline orchestration for the epidemiology tables.
//!
//! - **source**: the [`DataSource`] contract and its default stages
//! - **merge**: resolution of loosely identified records to metadata keys
//! - **chain**: running sources in parallel and combining their outputs
//! - **fetch**: deterministic snapshot downloads
//! - **config** / **registry**: chain configuration files and source lookup
//! - **concurrent**: the order-preserving worker pool

pub mod auxiliary;
pub mod chain;
pub mod concurrent;
pub mod config;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod registry;
pub mod source;
pub mod sources;

pub use auxiliary::{AuxTables, DEFAULT_METADATA_PATH, METADATA_TABLE, resolve_aux_paths};
pub use chain::{ChainOptions, PipelineChain, VerifyMode, intermediate_path};
pub use concurrent::{PoolKind, WorkerPool};
pub use config::{CONFIG_FILE, ChainConfig, list_chains, select_chains, table_name};
pub use error::{ChainError, Result, SourceError, SourceResult, error_chain};
pub use fetch::{
    CacheSitemap, DEFAULT_FETCH_TIMEOUT, FetchContext, FetchSpec, download_snapshot, fetch_all,
    snapshot_path,
};
pub use merge::{FUZZY_SUFFIX, MetadataIndex, with_fuzzy_columns};
pub use registry::{SourceFactory, SourceRegistry};
pub use source::{
    DataSource, FilterSpec, MergeOptions, SourceConfig, merge_keys, patch_table, run_source,
};
pub use sources::{PivotOptions, TableOptions, TableSource};
