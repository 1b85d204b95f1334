//! Error types for MODIS subset retrieval.

use thiserror::Error;

/// Errors that can occur while querying the MODIS service or post-processing
/// a retrieved dataset. Every variant aborts the retrieval in progress.
#[derive(Error, Debug)]
pub enum ModisError {
    /// Required request parameters are missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The server answered without usable data.
    #[error("server not returning data (possibly busy): {0}")]
    RemoteUnavailable(String),

    /// A payload field expected to be an integer is not.
    #[error("non-numeric value {value:?} in subset row {row}, field {field}")]
    DataFormat {
        row: usize,
        field: usize,
        value: String,
    },

    /// QA and data containers differ in shape.
    #[error("data and QA are different sizes: data {data:?}, QA {qa:?}")]
    ShapeMismatch {
        data: (usize, usize),
        qa: Option<(usize, usize)>,
    },

    /// A chunk disagrees with the grid established by the first chunk.
    #[error("inconsistent grid across chunks: {0}")]
    InconsistentGrid(String),

    /// No server date falls inside the requested range.
    #[error("no dates available between {start} and {end}")]
    EmptyDateRange { start: i64, end: i64 },

    /// A date token or date argument could not be decoded.
    #[error("invalid date: {0}")]
    InvalidDateToken(String),

    /// SOAP fault or malformed SOAP envelope.
    #[error("SOAP error: {0}")]
    Soap(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ModisError {
    /// Create a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a RemoteUnavailable error.
    pub fn remote_unavailable(msg: impl Into<String>) -> Self {
        Self::RemoteUnavailable(msg.into())
    }

    /// Create an InconsistentGrid error.
    pub fn inconsistent_grid(msg: impl Into<String>) -> Self {
        Self::InconsistentGrid(msg.into())
    }

    /// Create a Soap error.
    pub fn soap(msg: impl Into<String>) -> Self {
        Self::Soap(msg.into())
    }

    /// The error raised when latitude or longitude is unset.
    pub fn missing_lat_lon() -> Self {
        Self::Configuration("latitude and longitude must both be specified".to_string())
    }
}

impl From<quick_xml::Error> for ModisError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Soap(err.to_string())
    }
}

/// Result type for MODIS operations.
pub type Result<T> = std::result::Result<T, ModisError>;
