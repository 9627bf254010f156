// Infrastructure layer - External dependencies and adapters
pub mod cdf;
pub mod config;
pub mod csv_report;
pub mod http_archive;
pub mod plot;
pub mod sample_cache;
