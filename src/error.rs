//! Error types for the extraction pipeline.
//!
//! Every stage of a region's processing maps its failures onto one variant of
//! [`Error`]. The pipeline treats all of them as region-local: a failing region
//! is logged and skipped, the rest keep going.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Source unreachable or transfer failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Raw data malformed or in an unsupported container
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Expected attribute missing from the extracted schema
    #[error("Filter error: {0}")]
    Filter(String),

    /// Invalid geometry or unsupported CRS
    #[error("Normalization error: {0}")]
    Normalization(String),

    /// Destination unwritable or attribution missing
    #[error("Export error: {0}")]
    Export(String),

    /// Feature sets in different CRSs combined into one
    #[error("CRS mismatch: expected {expected}, found {found}")]
    CrsMismatch { expected: String, found: String },

    /// Bad registry file or region selection
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No region was successfully processed ({failed} failed)")]
    NoRegionSucceeded { failed: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short stable name of the error kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Fetch(_) => "fetch",
            Error::Extraction(_) => "extraction",
            Error::Filter(_) => "filter",
            Error::Normalization(_) => "normalization",
            Error::Export(_) => "export",
            Error::CrsMismatch { .. } => "crs_mismatch",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::NoRegionSucceeded { .. } => "no_region_succeeded",
        }
    }
}

impl From<geojson::Error> for Error {
    fn from(err: geojson::Error) -> Self {
        Error::Extraction(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Export(err.to_string())
    }
}

impl From<proj::ProjCreateError> for Error {
    fn from(err: proj::ProjCreateError) -> Self {
        Error::Normalization(err.to_string())
    }
}

impl From<proj::ProjError> for Error {
    fn from(err: proj::ProjError) -> Self {
        Error::Normalization(err.to_string())
    }
}
