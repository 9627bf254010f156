// Command handlers - Wire adapters into the pipeline and report the outcome
use crate::application::pipeline::FlarePipeline;
use crate::domain::summary::{RunSummary, SkipReason};
use crate::infrastructure::config::{PipelineConfig, VariableLayout, load_pipeline_config};
use crate::infrastructure::csv_report::CsvReport;
use crate::infrastructure::http_archive::HttpArchiveClient;
use crate::infrastructure::plot::SvgPlotter;
use crate::infrastructure::sample_cache::convert_directory;
use crate::presentation::cli::{ConvertArgs, RunArgs};
use anyhow::Context;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

impl RunArgs {
    /// Command-line flags win over the file and the environment.
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(csv) = &self.csv {
            config.output.csv_path = csv.clone();
        }
        if let Some(plots) = &self.plots {
            config.output.plot_dir = Some(plots.clone());
        }
        if let Some(summary) = &self.summary {
            config.output.summary_path = Some(summary.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.output.concurrency = concurrency;
        }
    }
}

pub async fn run(args: RunArgs) -> anyhow::Result<RunSummary> {
    let mut config = load_pipeline_config(&args.config)?;
    args.apply(&mut config);
    let settings = config.resolve()?;
    let output = settings.config.output.clone();
    let archive = &settings.config.archive;

    let client = Arc::new(HttpArchiveClient::new(
        archive.request_timeout(),
        archive.retry_policy(),
    )?);
    let mut pipeline = FlarePipeline::new(&settings, client);

    if let Some(dir) = &output.plot_dir {
        match SvgPlotter::new(dir.clone()) {
            Ok(plotter) => pipeline = pipeline.with_renderer(Arc::new(plotter)),
            Err(e) => tracing::warn!("Plots disabled: {:#}", e),
        }
    }

    let mut report = CsvReport::create(&output.csv_path, &settings.mode)?;
    tracing::debug!(
        "Writing {} with columns {}",
        output.csv_path.display(),
        report.headers().join(",")
    );

    let flag = pipeline.interrupt_flag();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing windows already in flight");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let result = pipeline.run(&mut report).await;
    ctrl_c.abort();
    let summary = result?;

    log_summary(&summary);
    if let Some(path) = &output.summary_path {
        write_summary(path, &summary)?;
    }
    Ok(summary)
}

pub async fn convert(args: ConvertArgs) -> anyhow::Result<()> {
    let layout = match &args.config {
        Some(path) => load_pipeline_config(path)?.variables,
        None => VariableLayout::default(),
    };

    let report = tokio::task::spawn_blocking(move || {
        convert_directory(&args.dir, &args.suffix, &layout, args.combined.as_deref())
    })
    .await
    .context("conversion task failed")??;

    for (path, reason) in &report.failed {
        tracing::warn!("Not converted: {} ({})", path.display(), reason);
    }
    Ok(())
}

fn log_summary(summary: &RunSummary) {
    tracing::info!(
        "Run summary: {} catalog flares, {} malformed lines, {} archive files, {} unmatched",
        summary.catalog_events,
        summary.malformed_lines,
        summary.archive_entries,
        summary.unmatched_events
    );
    tracing::info!(
        "Windows: {} matched, {} written, {} empty, {} skipped (network {}, decode {}, local time {}, io {}), {} plots",
        summary.matched,
        summary.succeeded,
        summary.empty,
        summary.skipped.len(),
        summary.skipped_for(SkipReason::Network),
        summary.skipped_for(SkipReason::Decode),
        summary.skipped_for(SkipReason::InvalidLocalTime),
        summary.skipped_for(SkipReason::Io),
        summary.plots_written
    );
    if !summary.listing_failures.is_empty() {
        tracing::warn!(
            "Listings unavailable for {}",
            summary.listing_failures.join(", ")
        );
    }
    if summary.interrupted {
        tracing::warn!("Run was interrupted; the report is incomplete");
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, summary)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!("Run summary written to {}", path.display());
    Ok(())
}
