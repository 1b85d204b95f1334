//! Common test fixtures for MODIS retrieval tests.

use std::path::PathBuf;

use tempfile::TempDir;

/// Well-known query points as `(latitude, longitude)`.
pub mod points {
    /// Central England, the point used by the service's own examples
    pub const ENGLAND: (f64, f64) = (52.0, -2.0);
}

/// Product and band identifiers used across tests.
pub mod products {
    pub const LAI_PRODUCT: &str = "MOD15A2H";
    pub const LAI_BAND: &str = "Lai_500m";
    pub const LAI_QA_BAND: &str = "FparLai_QC";
}

/// A client configuration file overriding every key.
pub const SAMPLE_CONFIG_YAML: &str = r#"
endpoint: "http://localhost:8089/soap"
timeout_secs: 30
chunk_size: 4
km_above_below: 1
km_left_right: 2
output_dir: /tmp/modis-test
"#;

/// Create a temporary directory that is removed when dropped.
pub fn temp_output_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create temp dir")
}

/// Write `contents` to `name` inside `dir`, returning the path.
pub fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("failed to write fixture file");
    path
}
