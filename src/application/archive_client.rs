// Archive access trait
use crate::domain::errors::NetworkError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;

#[async_trait]
pub trait ArchiveClient: Send + Sync {
    /// Fetch the HTML listing of one archive directory
    async fn fetch_listing(&self, url: &Url) -> Result<String, NetworkError>;

    /// Download one data file
    async fn fetch_file(&self, url: &Url) -> Result<Bytes, NetworkError>;
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory archive keyed by absolute URL. Unknown URLs answer 404.
    #[derive(Default)]
    pub struct FakeArchive {
        listings: HashMap<String, String>,
        files: HashMap<String, Bytes>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeArchive {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn listing(mut self, url: &str, html: &str) -> Self {
            self.listings.insert(url.to_string(), html.to_string());
            self
        }

        pub fn file(mut self, url: &str, body: Vec<u8>) -> Self {
            self.files.insert(url.to_string(), Bytes::from(body));
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        fn not_found(url: &Url) -> NetworkError {
            NetworkError::Rejected {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            }
        }
    }

    #[async_trait]
    impl ArchiveClient for FakeArchive {
        async fn fetch_listing(&self, url: &Url) -> Result<String, NetworkError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.listings
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| Self::not_found(url))
        }

        async fn fetch_file(&self, url: &Url) -> Result<Bytes, NetworkError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.files
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| Self::not_found(url))
        }
    }
}
