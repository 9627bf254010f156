// Sample extractor - Download, decode and window one archive file
use crate::application::archive_client::ArchiveClient;
use crate::domain::archive::MatchedWindow;
use crate::domain::errors::ExtractError;
use crate::domain::samples::Extraction;
use crate::infrastructure::cdf::{CdfFile, decode_series};
use crate::infrastructure::config::VariableLayout;
use chrono_tz::Tz;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct SampleExtractor {
    client: Arc<dyn ArchiveClient>,
    layout: VariableLayout,
    timezone: Tz,
    scratch_dir: Option<PathBuf>,
}

impl SampleExtractor {
    pub fn new(client: Arc<dyn ArchiveClient>, layout: VariableLayout, timezone: Tz) -> Self {
        Self {
            client,
            layout,
            timezone,
            scratch_dir: None,
        }
    }

    /// Download into `dir` instead of the system temporary directory.
    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = Some(dir);
        self
    }

    pub async fn extract(&self, window: &MatchedWindow) -> Result<Extraction, ExtractError> {
        let file = window.file_name();
        let flare_window = window
            .event
            .window(&self.timezone)
            .ok_or(ExtractError::InvalidLocalTime)?;
        let day_window = window
            .event
            .context_window(&self.timezone)
            .ok_or(ExtractError::InvalidLocalTime)?;

        let body = self.client.fetch_file(&window.file_url).await?;

        // Unique per extraction; removed when dropped, whatever the outcome.
        let mut builder = tempfile::Builder::new();
        builder.prefix("flare-").suffix(".cdf");
        let mut download = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        download.write_all(&body)?;
        download.flush()?;
        drop(body);

        let layout = self.layout.clone();
        let series = tokio::task::spawn_blocking(move || {
            let decoded = CdfFile::open(download.path()).and_then(|cdf| decode_series(&cdf, &layout));
            drop(download);
            decoded
        })
        .await
        .map_err(|e| ExtractError::Io(std::io::Error::other(e)))?
        .map_err(|source| ExtractError::Decode {
            file: file.clone(),
            source,
        })?;

        let extraction = Extraction {
            flare: series.quality_window(&flare_window),
            context: series.context_window(&day_window),
            file,
            flare_window,
            day_window,
        };
        if extraction.flare.is_empty() {
            return Err(ExtractError::EmptyWindow(Box::new(extraction)));
        }
        Ok(extraction)
    }
}
