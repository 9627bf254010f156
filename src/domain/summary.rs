// Run summary - every matched window is accounted for here
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Network,
    Decode,
    InvalidLocalTime,
    Io,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedWindow {
    pub date: String,
    pub start: String,
    pub file: String,
    pub reason: SkipReason,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub catalog_events: usize,
    pub malformed_lines: usize,
    pub listing_failures: Vec<String>,
    pub archive_entries: usize,
    pub unmatched_events: usize,
    pub matched: usize,
    pub succeeded: usize,
    pub empty: usize,
    pub skipped: Vec<SkippedWindow>,
    pub plots_written: usize,
    pub interrupted: bool,
}

impl RunSummary {
    /// Windows that reached a final state (written or skipped).
    pub fn accounted(&self) -> usize {
        self.succeeded + self.empty + self.skipped.len()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == reason).count()
    }
}
