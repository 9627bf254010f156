// Application layer - Pipeline stages and the seams they depend on
pub mod archive_client;
pub mod archive_index;
pub mod catalog;
pub mod energy_integrator;
pub mod matcher;
pub mod pipeline;
pub mod report_sink;
pub mod sample_extractor;
