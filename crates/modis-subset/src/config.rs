//! Client configuration.
//!
//! Values come from defaults, a YAML file, or environment variables
//! (`MODIS_ENDPOINT`, `MODIS_TIMEOUT_SECS`, `MODIS_CHUNK_SIZE`,
//! `MODIS_KM_ABOVE_BELOW`, `MODIS_KM_LEFT_RIGHT`, `MODIS_OUTPUT_DIR`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModisError, Result};

/// Default SOAP endpoint of the ORNL DAAC MODIS web service.
pub const DEFAULT_ENDPOINT: &str = "https://modis.ornl.gov/cgi-bin/MODIS/soapservice/MODIS_soapservice.pl";

/// Default number of dates requested per subset call.
pub const DEFAULT_CHUNK_SIZE: usize = 8;

/// Configuration for talking to the MODIS service and chunking requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// SOAP endpoint URL
    pub endpoint: String,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum number of dates per subset request
    pub chunk_size: usize,
    /// Kilometres above and below the point
    pub km_above_below: u32,
    /// Kilometres left and right of the point
    pub km_left_right: u32,
    /// Directory where saved datasets are written
    pub output_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 300,
            chunk_size: DEFAULT_CHUNK_SIZE,
            km_above_below: 0,
            km_left_right: 0,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables over the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MODIS_ENDPOINT") {
            config.endpoint = val;
        }

        if let Ok(val) = std::env::var("MODIS_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("MODIS_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("MODIS_KM_ABOVE_BELOW") {
            if let Ok(km) = val.parse() {
                config.km_above_below = km;
            }
        }

        if let Ok(val) = std::env::var("MODIS_KM_LEFT_RIGHT") {
            if let Ok(km) = val.parse() {
                config.km_left_right = km;
            }
        }

        if let Ok(val) = std::env::var("MODIS_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(val);
        }

        config
    }

    /// Load configuration from a YAML file. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_yaml::from_str(&content)?;
        debug!(path = %path.display(), endpoint = %config.endpoint, "Loaded client config");
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(ModisError::configuration("endpoint must not be empty"));
        }

        if self.chunk_size == 0 {
            return Err(ModisError::configuration("chunk_size must be > 0"));
        }

        if self.timeout_secs == 0 {
            return Err(ModisError::configuration("timeout_secs must be > 0"));
        }

        Ok(())
    }

    /// HTTP request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
