//! Pipeline chains.
//!
//! A chain runs every configured source against the same auxiliary tables,
//! combines their outputs on `(date, key)` and casts the result to the
//! chain's schema. A failing or panicking source only loses its own
//! contribution; the chain itself completes unless its configuration is
//! invalid.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use epi_ingest::{ReadOptions, column_names, read_table, string_column, write_csv_table};
use epi_model::{ColumnType, DATE_COLUMN, KEY_COLUMN, Schema};
use epi_transform::{column_convert, combine_tables, drop_na_records, select_columns, sort_table};
use epi_validate::{
    AnomalyAction, AnomalyReport, detect_anomaly_all, detect_anomaly_partition, partition_by_key,
};
use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, info_span, warn};

use crate::auxiliary::AuxTables;
use crate::concurrent::{PoolKind, WorkerPool};
use crate::config::ChainConfig;
use crate::error::{Result, error_chain};
use crate::fetch::{CacheSitemap, DEFAULT_FETCH_TIMEOUT, FetchContext};
use crate::registry::SourceRegistry;
use crate::source::{DataSource, SourceConfig};

/// Anomaly detection run after a chain completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    #[default]
    None,
    /// Checks over the whole table.
    Simple,
    /// Whole-table checks plus the same checks on every key partition.
    Full,
}

/// Runtime options of a chain run.
#[derive(Debug, Clone)]
pub struct ChainOptions {
    /// Root of `snapshot/` and `intermediate/`.
    pub output_folder: PathBuf,
    /// Sources run in parallel when greater than one.
    pub process_count: usize,
    pub verify: VerifyMode,
    pub anomaly_action: AnomalyAction,
    pub progress: bool,
    pub cache: CacheSitemap,
    pub fetch_timeout: Duration,
    pub skip_existing: bool,
    pub write_intermediate: bool,
}

impl ChainOptions {
    pub fn new(output_folder: impl Into<PathBuf>) -> Self {
        Self {
            output_folder: output_folder.into(),
            process_count: PoolKind::Cpu.default_workers(),
            verify: VerifyMode::None,
            anomaly_action: AnomalyAction::Warn,
            progress: false,
            cache: CacheSitemap::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            skip_existing: false,
            write_intermediate: true,
        }
    }

    fn fetch_context(&self) -> FetchContext {
        FetchContext {
            cache: self.cache.clone(),
            timeout: self.fetch_timeout,
            skip_existing: self.skip_existing,
            ..FetchContext::new(&self.output_folder)
        }
    }

    fn cpu_pool(&self) -> WorkerPool {
        WorkerPool::with_workers(PoolKind::Cpu, self.process_count)
    }
}

/// Where the output of a source configuration is kept between runs.
pub fn intermediate_path(output_folder: &Path, config: &SourceConfig) -> PathBuf {
    let digest = hex::encode(Sha256::digest(config.fingerprint().as_bytes()));
    output_folder.join("intermediate").join(format!("{digest}.csv"))
}

/// An ordered list of sources producing one table.
pub struct PipelineChain {
    name: String,
    schema: Schema,
    auxiliary: BTreeMap<String, PathBuf>,
    sources: Vec<Box<dyn DataSource>>,
}

impl std::fmt::Debug for PipelineChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineChain")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("sources", &self.source_names())
            .finish()
    }
}

impl PipelineChain {
    pub fn new(
        name: impl Into<String>,
        schema: Schema,
        auxiliary: BTreeMap<String, PathBuf>,
        sources: Vec<Box<dyn DataSource>>,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            auxiliary,
            sources,
        }
    }

    /// Build every source of `config` through `registry`.
    pub fn load(config: ChainConfig, registry: &SourceRegistry) -> Result<Self> {
        let sources = config
            .sources
            .into_iter()
            .map(|source| registry.build(source))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(config.name, config.schema, config.auxiliary, sources))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn sources(&self) -> &[Box<dyn DataSource>] {
        &self.sources
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    pub fn load_aux(&self) -> Result<AuxTables> {
        AuxTables::load(&self.auxiliary)
    }

    /// Load the auxiliary tables and run the chain.
    pub fn run(&self, options: &ChainOptions) -> Result<DataFrame> {
        let aux = self.load_aux()?;
        self.run_with_aux(&aux, options)
    }

    /// Run every source, combine their outputs and cast to the schema.
    pub fn run_with_aux(&self, aux: &AuxTables, options: &ChainOptions) -> Result<DataFrame> {
        let span = info_span!("chain", name = %self.name);
        let _guard = span.enter();
        info!(sources = self.sources.len(), workers = options.process_count, "running chain");

        let ctx = options.fetch_context();
        let progress = progress_bar(
            self.sources.len(),
            options.progress,
            format!("Run {} pipeline", self.name),
        );
        let results = options.cpu_pool().map(&self.sources, |source| {
            let result = run_isolated(source.as_ref(), &ctx, aux);
            progress.inc(1);
            result
        });
        progress.finish_and_clear();

        let mut outputs = Vec::with_capacity(results.len());
        for (source, result) in self.sources.iter().zip(results) {
            let Some(data) = self.keep_output(source.config(), result, options) else {
                continue;
            };
            let data = self.schema_columns(&data)?;
            let names = column_names(&data);
            if [DATE_COLUMN, KEY_COLUMN].iter().all(|index| names.iter().any(|name| name == *index)) {
                outputs.push(data);
            } else {
                warn!(source = source.name(), "output without date and key columns ignored");
            }
        }

        let combined = if outputs.is_empty() {
            warn!(chain = %self.name, "empty result for pipeline chain");
            DataFrame::empty()
        } else {
            combine_tables(&outputs, &[DATE_COLUMN, KEY_COLUMN])?
        };
        let table = self.output_table(&combined)?;
        info!(rows = table.height(), "chain finished");

        self.verify(&table, options)?;
        Ok(table)
    }

    /// Persist a fresh output, or fall back to the last persisted one.
    fn keep_output(
        &self,
        config: &SourceConfig,
        result: Option<DataFrame>,
        options: &ChainOptions,
    ) -> Option<DataFrame> {
        let path = intermediate_path(&options.output_folder, config);
        match result {
            Some(data) => {
                if options.write_intermediate
                    && let Err(error) = write_csv_table(&data, &path)
                {
                    warn!(source = %config.name, %error, "failed to write intermediate output");
                }
                Some(data)
            }
            None if path.is_file() => match read_table(&path, &ReadOptions::default()) {
                Ok(data) => {
                    warn!(source = %config.name, path = %path.display(), "reusing last intermediate output");
                    Some(data)
                }
                Err(error) => {
                    warn!(source = %config.name, %error, "failed to read intermediate output");
                    None
                }
            },
            None => None,
        }
    }

    fn schema_columns(&self, data: &DataFrame) -> Result<DataFrame> {
        let present = column_names(data);
        let names: Vec<&str> = self
            .schema
            .names()
            .into_iter()
            .filter(|name| present.iter().any(|column| column == name))
            .collect();
        Ok(select_columns(data, names.as_slice())?)
    }

    /// Shape `data` to the schema: missing columns are added as null,
    /// numeric columns are converted to their declared type, records left
    /// without any value are dropped and rows are sorted by all schema
    /// columns. Text columns render nulls as empty strings after the drop so
    /// a value that fails to parse never keeps a record alive.
    pub fn output_table(&self, data: &DataFrame) -> Result<DataFrame> {
        let height = data.height();
        let numeric = self
            .schema
            .columns()
            .iter()
            .map(|column| {
                let raw = match data.column(&column.name) {
                    Ok(existing) => existing.clone(),
                    Err(_) => string_column(&column.name, vec![None; height]),
                };
                match column.dtype {
                    ColumnType::String => raw,
                    dtype => column_convert(&raw, dtype),
                }
            })
            .collect();
        let kept = drop_na_records(&DataFrame::new(numeric)?, &[DATE_COLUMN, KEY_COLUMN])?;
        let converted = self
            .schema
            .columns()
            .iter()
            .map(|column| kept.column(&column.name).map(|values| column_convert(values, column.dtype)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let table = DataFrame::new(converted)?;
        Ok(sort_table(&table, self.schema.names().as_slice())?)
    }

    /// Run the anomaly checks selected by `options.verify`.
    pub fn verify(&self, table: &DataFrame, options: &ChainOptions) -> Result<Vec<AnomalyReport>> {
        if options.verify == VerifyMode::None {
            return Ok(Vec::new());
        }
        let mut reports = vec![detect_anomaly_all(&self.schema, table, &self.name)];
        if options.verify == VerifyMode::Full {
            let partitions = partition_by_key(table)?;
            let progress = progress_bar(
                partitions.len(),
                options.progress,
                format!("Verify {} pipeline", self.name),
            );
            reports.extend(options.cpu_pool().map(&partitions, |(key, partition)| {
                let report = detect_anomaly_partition(&self.schema, &self.name, key, partition);
                progress.inc(1);
                report
            }));
            progress.finish_and_clear();
        }
        let findings: usize = reports.iter().map(AnomalyReport::len).sum();
        debug!(reports = reports.len(), findings, "verification finished");
        for report in &reports {
            report.apply(options.anomaly_action)?;
        }
        Ok(reports)
    }
}

/// Run one source against its own copy of the auxiliary tables. Errors and
/// panics are logged and yield `None`.
fn run_isolated(source: &dyn DataSource, ctx: &FetchContext, aux: &AuxTables) -> Option<DataFrame> {
    let aux = aux.clone();
    match catch_unwind(AssertUnwindSafe(|| source.run(ctx, &aux))) {
        Ok(Ok(data)) => Some(data),
        Ok(Err(error)) => {
            warn!(
                source = source.name(),
                config = ?source.config(),
                error = %error_chain(&error),
                "error running data source"
            );
            None
        }
        Err(payload) => {
            warn!(
                source = source.name(),
                config = ?source.config(),
                panic = panic_message(payload.as_ref()),
                "data source panicked"
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

fn progress_bar(len: usize, visible: bool, label: String) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.set_message(label);
    bar
}
