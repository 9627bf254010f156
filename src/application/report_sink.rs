// Output seams - Where results and diagnostic plots go
use crate::domain::integration::IntegrationResult;
use crate::domain::samples::Extraction;
use std::path::PathBuf;

/// Receives one row per window, in match order.
pub trait ReportSink: Send {
    fn record(&mut self, result: &IntegrationResult) -> anyhow::Result<()>;

    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Draws the diagnostic plot for one window and returns where it went.
pub trait WindowRenderer: Send + Sync {
    fn render(&self, extraction: &Extraction, result: &IntegrationResult) -> anyhow::Result<PathBuf>;
}
