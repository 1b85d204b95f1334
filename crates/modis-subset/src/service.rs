//! The remote MODIS service as seen by the retrieval code.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ModisError, Result};

/// Number of leading metadata fields in each subset row.
pub const ROW_METADATA_FIELDS: usize = 5;

/// Upper bound on cells per date row. The service caps subsets at
/// 100 km either side of the point, far below this.
pub const MAX_GRID_CELLS: usize = 1 << 20;

/// Remote metadata and subset operations.
#[async_trait]
pub trait ModisService: Send + Sync {
    /// Identifier of the remote endpoint, recorded on retrieved datasets.
    fn endpoint(&self) -> &str;

    /// List available products.
    async fn products(&self) -> Result<Vec<String>>;

    /// List the bands of a product.
    async fn bands(&self, product: &str) -> Result<Vec<String>>;

    /// Ordered date tokens available for a point and product.
    async fn dates(&self, latitude: f64, longitude: f64, product: &str) -> Result<Vec<String>>;

    /// Fetch one subset covering `request.start_date..=request.end_date`.
    async fn subset(&self, request: &SubsetRequest) -> Result<SubsetResponse>;
}

/// Arguments of a single subset call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsetRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub product: String,
    pub band: String,
    /// First date token of the window (server form, e.g. `A2006105`)
    pub start_date: String,
    /// Last date token of the window
    pub end_date: String,
    pub km_above_below: u32,
    pub km_left_right: u32,
}

/// Grid description returned with every subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMetadata {
    pub nrows: usize,
    pub ncols: usize,
    pub cellsize: f64,
    pub scale: f64,
    pub units: String,
    pub xllcorner: f64,
    pub yllcorner: f64,
}

impl GridMetadata {
    /// Number of cells per date row.
    ///
    /// An empty grid, or one larger than [`MAX_GRID_CELLS`], means the
    /// response is garbled.
    pub fn cells(&self) -> Result<usize> {
        match self.nrows.checked_mul(self.ncols) {
            Some(cells) if cells > 0 && cells <= MAX_GRID_CELLS => Ok(cells),
            _ => Err(ModisError::remote_unavailable(format!(
                "unusable grid {}x{}",
                self.nrows, self.ncols
            ))),
        }
    }

    /// Describe the first field that differs from `other`, if any.
    pub fn mismatch(&self, other: &GridMetadata) -> Option<String> {
        if self.nrows != other.nrows || self.ncols != other.ncols {
            return Some(format!(
                "grid {}x{} != {}x{}",
                other.nrows, other.ncols, self.nrows, self.ncols
            ));
        }
        if self.cellsize != other.cellsize {
            return Some(format!("cellsize {} != {}", other.cellsize, self.cellsize));
        }
        if self.scale != other.scale {
            return Some(format!("scale {} != {}", other.scale, self.scale));
        }
        if self.xllcorner != other.xllcorner || self.yllcorner != other.yllcorner {
            return Some(format!(
                "corner ({}, {}) != ({}, {})",
                other.xllcorner, other.yllcorner, self.xllcorner, self.yllcorner
            ));
        }
        None
    }
}

/// Response of a subset call.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetResponse {
    pub grid: GridMetadata,
    /// One comma-delimited row per date
    pub subset: Vec<String>,
}

/// A parsed subset row.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetRow {
    pub values: Vec<i64>,
}

impl SubsetRow {
    /// Parse a comma-delimited row, dropping the leading metadata fields.
    ///
    /// `row` is only used for error reporting.
    pub fn parse(line: &str, row: usize) -> Result<Self> {
        let values = line
            .split(',')
            .skip(ROW_METADATA_FIELDS)
            .enumerate()
            .map(|(field, raw)| {
                raw.trim().parse::<i64>().map_err(|_| ModisError::DataFormat {
                    row,
                    field: field + ROW_METADATA_FIELDS,
                    value: raw.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { values })
    }
}
