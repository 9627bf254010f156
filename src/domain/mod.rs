// Domain layer - Value types shared by every pipeline stage
pub mod archive;
pub mod errors;
pub mod flare;
pub mod integration;
pub mod samples;
pub mod summary;
