use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use comfy_table::Table;
use epi_core::{
    CacheSitemap, ChainConfig, ChainOptions, PipelineChain, SourceRegistry, list_chains,
    select_chains, table_name,
};
use epi_ingest::write_csv_table;
use epi_validate::AnomalyAction;
use polars::prelude::DataFrame;
use tracing::{error, info, info_span};

use crate::cli::{ListArgs, RunArgs};
use crate::summary::apply_table_style;

/// Outcome of `epi-pipeline run`.
#[derive(Debug)]
pub struct RunResult {
    pub output_folder: PathBuf,
    pub tables: Vec<TableSummary>,
    /// `chain: message` for every chain that did not produce a table.
    pub errors: Vec<String>,
}

impl RunResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug)]
pub struct TableSummary {
    pub chain: String,
    pub table: String,
    pub sources: usize,
    pub rows: usize,
    pub columns: usize,
    pub path: PathBuf,
    pub elapsed: Duration,
}

/// Where the exported table of `chain` is written.
pub fn table_path(output_folder: &Path, chain: &str) -> PathBuf {
    output_folder
        .join("tables")
        .join(format!("{}.csv", table_name(chain)))
}

pub fn chain_options(args: &RunArgs) -> Result<ChainOptions> {
    let mut options = ChainOptions::new(&args.output_folder);
    if let Some(count) = args.process_count {
        options.process_count = usize::from(count);
    }
    options.verify = args.verify.into();
    options.anomaly_action = if args.raise_anomalies {
        AnomalyAction::Raise
    } else {
        AnomalyAction::Warn
    };
    options.progress = !args.no_progress;
    options.fetch_timeout = Duration::from_secs(args.fetch_timeout);
    options.skip_existing = args.skip_existing;
    options.write_intermediate = !args.no_intermediate;
    if let Some(path) = &args.cache_sitemap {
        options.cache = CacheSitemap::load(path)
            .with_context(|| format!("load cache sitemap {}", path.display()))?;
    }
    Ok(options)
}

/// Run the selected chains in order. A failing chain is reported and the
/// remaining chains still run.
pub fn run_pipelines(args: &RunArgs, registry: &SourceRegistry) -> Result<RunResult> {
    let pipelines_dir = &args.pipelines.pipelines_dir;
    let all = list_chains(pipelines_dir)
        .with_context(|| format!("list chains in {}", pipelines_dir.display()))?;
    let selected = select_chains(&all, &args.only, &args.exclude).context("select chains")?;
    let options = chain_options(args)?;
    info!(chains = selected.len(), output = %args.output_folder.display(), "running pipelines");

    let mut result = RunResult {
        output_folder: args.output_folder.clone(),
        tables: Vec::new(),
        errors: Vec::new(),
    };
    for name in &selected {
        let span = info_span!("pipeline", chain = %name);
        let _guard = span.enter();
        match run_chain(pipelines_dir, name, registry, &options) {
            Ok(summary) => result.tables.push(summary),
            Err(err) => {
                error!(chain = %name, "{err:#}");
                result.errors.push(format!("{name}: {err:#}"));
            }
        }
    }
    Ok(result)
}

fn run_chain(
    pipelines_dir: &Path,
    name: &str,
    registry: &SourceRegistry,
    options: &ChainOptions,
) -> Result<TableSummary> {
    let start = Instant::now();
    let config = ChainConfig::load(pipelines_dir, name).context("load chain config")?;
    let chain = PipelineChain::load(config, registry).context("build chain sources")?;
    let table = chain.run(options).context("run chain")?;
    let path = table_path(&options.output_folder, name);
    write_csv_table(&table, &path).with_context(|| format!("write {}", path.display()))?;
    info!(rows = table.height(), path = %path.display(), "table exported");
    Ok(summarize(&chain, &table, path, start.elapsed()))
}

fn summarize(chain: &PipelineChain, table: &DataFrame, path: PathBuf, elapsed: Duration) -> TableSummary {
    TableSummary {
        chain: chain.name().to_string(),
        table: table_name(chain.name()),
        sources: chain.sources().len(),
        rows: table.height(),
        columns: table.width(),
        path,
        elapsed,
    }
}

/// Print the chains found under the pipelines folder.
pub fn run_list(args: &ListArgs, registry: &SourceRegistry) -> Result<()> {
    let pipelines_dir = &args.pipelines.pipelines_dir;
    let chains = list_chains(pipelines_dir)
        .with_context(|| format!("list chains in {}", pipelines_dir.display()))?;
    let mut table = Table::new();
    table.set_header(vec!["Chain", "Table", "Sources", "Columns"]);
    apply_table_style(&mut table);
    for row in list_rows(pipelines_dir, &chains, registry) {
        table.add_row(row);
    }
    println!("{table}");
    Ok(())
}

/// One row per chain. Chains whose configuration does not load show the
/// error instead of their sources.
pub fn list_rows(pipelines_dir: &Path, chains: &[String], registry: &SourceRegistry) -> Vec<Vec<String>> {
    chains
        .iter()
        .map(|name| {
            let described = ChainConfig::load(pipelines_dir, name).and_then(|config| {
                let columns = config.schema.names().join(", ");
                PipelineChain::load(config, registry)
                    .map(|chain| (chain.source_names().join(", "), columns))
            });
            let (sources, columns) = match described {
                Ok(found) => found,
                Err(err) => (format!("invalid: {err}"), String::new()),
            };
            vec![name.clone(), table_name(name), sources, columns]
        })
        .collect()
}
