// Flare pipeline - Catalog to archive to samples to areas, one linear pass
use crate::application::archive_client::ArchiveClient;
use crate::application::archive_index::ArchiveIndex;
use crate::application::catalog::CatalogReader;
use crate::application::energy_integrator::EnergyIntegrator;
use crate::application::matcher::match_events;
use crate::application::report_sink::{ReportSink, WindowRenderer};
use crate::application::sample_extractor::SampleExtractor;
use crate::domain::archive::{MatchedWindow, MonthRange};
use crate::domain::errors::{CatalogError, ExtractError};
use crate::domain::flare::FlareEvent;
use crate::domain::integration::IntegrationResult;
use crate::domain::samples::Extraction;
use crate::domain::summary::{RunSummary, SkipReason, SkippedWindow};
use crate::infrastructure::config::PipelineSettings;
use anyhow::Context;
use futures::{StreamExt, future, stream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

enum WindowOutcome {
    Integrated(Box<Extraction>, IntegrationResult),
    Empty(Box<Extraction>, IntegrationResult),
    Skipped(SkipReason, String),
}

pub struct FlarePipeline {
    catalog: CatalogReader,
    index: ArchiveIndex,
    extractor: SampleExtractor,
    integrator: EnergyIntegrator,
    months: MonthRange,
    concurrency: usize,
    renderer: Option<Arc<dyn WindowRenderer>>,
    interrupted: Arc<AtomicBool>,
}

impl FlarePipeline {
    pub fn new(settings: &PipelineSettings, client: Arc<dyn ArchiveClient>) -> Self {
        let config = &settings.config;
        Self {
            catalog: CatalogReader::new(config.catalog.clone()),
            index: ArchiveIndex::new(
                client.clone(),
                settings.base_url.clone(),
                config.archive.extension.clone(),
            ),
            extractor: SampleExtractor::new(client, config.variables.clone(), settings.timezone),
            integrator: EnergyIntegrator::new(settings.mode.clone()),
            months: settings.months,
            concurrency: config.output.concurrency.max(1),
            renderer: None,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn WindowRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Setting this flag stops the run from starting further windows.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    pub async fn run(&self, sink: &mut dyn ReportSink) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();

        let events = self.read_catalog(&mut summary)?;
        tracing::info!(
            "Catalog: {} flares of interest, {} malformed lines",
            events.len(),
            summary.malformed_lines
        );

        let listing = self.index.entries(&self.months).await;
        summary.archive_entries = listing.entries.len();
        summary.listing_failures = listing.failed;

        let report = match_events(&events, &listing.entries);
        summary.matched = report.windows.len();
        summary.unmatched_events = report.unmatched.len();
        tracing::info!(
            "Matched {} flares to archive files, {} without a file",
            summary.matched,
            summary.unmatched_events
        );

        let interrupted = self.interrupted.clone();
        let mut outcomes = stream::iter(report.windows)
            .take_while(move |_| future::ready(!interrupted.load(Ordering::SeqCst)))
            .map(|window| async move {
                let outcome = self.process(&window).await;
                (window, outcome)
            })
            .buffered(self.concurrency);

        while let Some((window, outcome)) = outcomes.next().await {
            self.emit(&window, outcome, sink, &mut summary)?;
        }

        summary.interrupted = self.interrupted.load(Ordering::SeqCst);
        if summary.interrupted {
            tracing::warn!(
                "Interrupted after {} of {} windows",
                summary.accounted(),
                summary.matched
            );
        }
        sink.finish()?;
        Ok(summary)
    }

    fn read_catalog(&self, summary: &mut RunSummary) -> anyhow::Result<Vec<FlareEvent>> {
        let mut events = Vec::new();
        for item in self.catalog.open().context("opening flare catalog")? {
            match item {
                Ok(event) => events.push(event),
                Err(e @ CatalogError::MalformedLine { .. }) => {
                    tracing::warn!("Skipping {}", e);
                    summary.malformed_lines += 1;
                }
                Err(e) => return Err(e).context("reading flare catalog"),
            }
        }
        summary.catalog_events = events.len();
        Ok(events)
    }

    async fn process(&self, window: &MatchedWindow) -> WindowOutcome {
        let event = &window.event;
        tracing::info!(
            "Processing {} flare {} {}-{} from {}",
            event.class,
            event.catalog_date(),
            event.start,
            event.end,
            window.file_name()
        );

        match self.extractor.extract(window).await {
            Ok(extraction) => {
                let result = self.integrator.integrate(event, &extraction.file, &extraction.flare);
                WindowOutcome::Integrated(Box::new(extraction), result)
            }
            Err(ExtractError::EmptyWindow(extraction)) => {
                let result =
                    IntegrationResult::empty(event.clone(), extraction.file.clone(), self.integrator.mode());
                WindowOutcome::Empty(extraction, result)
            }
            Err(e @ ExtractError::Network(_)) => WindowOutcome::Skipped(SkipReason::Network, e.to_string()),
            Err(e @ ExtractError::Decode { .. }) => WindowOutcome::Skipped(SkipReason::Decode, e.to_string()),
            Err(e @ ExtractError::InvalidLocalTime) => {
                WindowOutcome::Skipped(SkipReason::InvalidLocalTime, e.to_string())
            }
            Err(e @ ExtractError::Io(_)) => WindowOutcome::Skipped(SkipReason::Io, e.to_string()),
        }
    }

    fn emit(
        &self,
        window: &MatchedWindow,
        outcome: WindowOutcome,
        sink: &mut dyn ReportSink,
        summary: &mut RunSummary,
    ) -> anyhow::Result<()> {
        match outcome {
            WindowOutcome::Integrated(extraction, result) => {
                sink.record(&result)
                    .with_context(|| format!("writing result for {}", result.file))?;
                summary.succeeded += 1;
                self.render(&extraction, &result, summary);
            }
            WindowOutcome::Empty(extraction, result) => {
                tracing::info!(
                    "No quality-passing samples for {} flare {} {}; reporting zero areas",
                    window.event.class,
                    window.event.catalog_date(),
                    window.event.start
                );
                sink.record(&result)
                    .with_context(|| format!("writing result for {}", result.file))?;
                summary.empty += 1;
                self.render(&extraction, &result, summary);
            }
            WindowOutcome::Skipped(reason, detail) => {
                tracing::warn!(
                    "Skipping {} flare {} {} ({:?}): {}",
                    window.event.class,
                    window.event.catalog_date(),
                    window.event.start,
                    reason,
                    detail
                );
                summary.skipped.push(SkippedWindow {
                    date: window.event.catalog_date(),
                    start: window.event.start.to_string(),
                    file: window.file_name(),
                    reason,
                    detail,
                });
            }
        }
        Ok(())
    }

    fn render(&self, extraction: &Extraction, result: &IntegrationResult, summary: &mut RunSummary) {
        let Some(renderer) = &self.renderer else {
            return;
        };
        match renderer.render(extraction, result) {
            Ok(path) => {
                tracing::debug!("Wrote plot {}", path.display());
                summary.plots_written += 1;
            }
            Err(e) => tracing::warn!("Plot for {} failed: {:#}", result.file, e),
        }
    }
}
