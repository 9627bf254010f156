// Error taxonomy for the flare pipeline
use super::samples::Extraction;
use thiserror::Error;

/// A remote call that could not be completed.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("{url}: gave up after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("{url}: request rejected: {reason}")]
    Rejected { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("malformed catalog line {line_no}: {reason}: '{line}'")]
    MalformedLine {
        line_no: usize,
        line: String,
        reason: String,
    },

    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub fn malformed(line_no: usize, line: &str, reason: impl Into<String>) -> Self {
        Self::MalformedLine {
            line_no,
            line: line.trim().to_string(),
            reason: reason.into(),
        }
    }
}

/// A data file that is not in the expected format.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("file too short: needed {needed} bytes at offset {offset}, have {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("not a CDF file (magic {0:#010x})")]
    BadMagic(u32),

    #[error("unsupported CDF version (magic {0:#010x})")]
    UnsupportedVersion(u32),

    #[error("unsupported data encoding {0}")]
    UnsupportedEncoding(i32),

    #[error("unsupported compression type {0}")]
    UnsupportedCompression(i32),

    #[error("unsupported data type {data_type} for variable '{variable}'")]
    UnsupportedDataType { variable: String, data_type: i32 },

    #[error("expected record type {expected} at offset {offset}, found {found}")]
    UnexpectedRecord {
        offset: usize,
        expected: &'static str,
        found: i32,
    },

    #[error("variable '{0}' not found")]
    MissingVariable(String),

    #[error("variable '{variable}': {reason}")]
    BadVariable { variable: String, reason: String },

    #[error("variable '{variable}' has gaps: records {from}..={to} are missing")]
    MissingRecords { variable: String, from: i64, to: i64 },

    #[error("decompression failed: {0}")]
    Decompress(std::io::Error),

    #[error("inconsistent sample series: {0}")]
    InconsistentSeries(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub fn bad_variable(variable: &str, reason: impl Into<String>) -> Self {
        Self::BadVariable {
            variable: variable.to_string(),
            reason: reason.into(),
        }
    }
}

/// Why one matched window produced no integration result.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("{file}: {source}")]
    Decode {
        file: String,
        #[source]
        source: DecodeError,
    },

    /// Not a failure: the window holds no quality-passing samples. The
    /// extraction is still returned for its context series.
    #[error("{}: no quality-passing samples in the flare window", .0.file)]
    EmptyWindow(Box<Extraction>),

    #[error("local time does not exist in the configured time zone")]
    InvalidLocalTime,

    #[error("temporary download storage: {0}")]
    Io(#[from] std::io::Error),
}
