// Archive index - Enumerates data files month by month
use crate::application::archive_client::ArchiveClient;
use crate::domain::archive::{ArchiveEntry, MonthRange, YearMonth};
use regex::Regex;
use reqwest::Url;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']+)["']"#).expect("href pattern is valid")
});

/// Every entry found, plus the months whose listing could not be fetched.
#[derive(Debug, Default)]
pub struct ArchiveListing {
    pub entries: Vec<ArchiveEntry>,
    pub failed: Vec<String>,
}

#[derive(Clone)]
pub struct ArchiveIndex {
    client: Arc<dyn ArchiveClient>,
    base_url: Url,
    extension: String,
}

impl ArchiveIndex {
    pub fn new(client: Arc<dyn ArchiveClient>, base_url: Url, extension: String) -> Self {
        Self {
            client,
            base_url,
            extension,
        }
    }

    /// `{base}{YYYY}/{MM}/`
    pub fn listing_url(&self, month: YearMonth) -> Option<Url> {
        self.base_url
            .join(&format!("{:04}/{:02}/", month.year, month.month))
            .ok()
    }

    /// Lists every month in order. A month whose listing cannot be fetched
    /// contributes nothing and is recorded in `failed`.
    pub async fn entries(&self, months: &MonthRange) -> ArchiveListing {
        let mut listing = ArchiveListing::default();

        for month in months.months() {
            let Some(url) = self.listing_url(month) else {
                tracing::warn!("Cannot build listing URL for {} from {}", month, self.base_url);
                listing.failed.push(month.to_string());
                continue;
            };
            tracing::debug!("Listing {}", url);

            match self.client.fetch_listing(&url).await {
                Ok(html) => {
                    let found = self.parse_listing(&url, &html);
                    tracing::debug!("{}: {} data files", url, found.len());
                    listing.entries.extend(found);
                }
                Err(e) => {
                    tracing::warn!("Skipping month {}: {}", month, e);
                    listing.failed.push(month.to_string());
                }
            }
        }

        tracing::info!(
            "Archive index: {} files, {} listings failed",
            listing.entries.len(),
            listing.failed.len()
        );
        listing
    }

    /// Anchor targets ending in the configured extension, resolved against
    /// `directory`, first occurrence kept.
    pub fn parse_listing(&self, directory: &Url, html: &str) -> Vec<ArchiveEntry> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for capture in HREF.captures_iter(html) {
            let href = &capture[1];
            let Ok(file_url) = directory.join(href) else {
                continue;
            };
            let Some(name) = file_url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| name.ends_with(self.extension.as_str()))
                .map(str::to_string)
            else {
                continue;
            };
            if !seen.insert(file_url.to_string()) {
                continue;
            }
            let Ok(parent) = file_url.join("./") else {
                continue;
            };
            entries.push(ArchiveEntry::new(parent, name));
        }
        entries
    }
}
