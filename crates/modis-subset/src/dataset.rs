//! The assembled result of a chunked retrieval and its post-processing.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::date::DateToken;
use crate::error::{ModisError, Result};
use crate::service::GridMetadata;

/// Subset data for one point, product and band over a date range.
///
/// `data` has one row per retrieved date and one column per grid cell
/// (`nrows * ncols`, row-major as delivered by the server).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModisDataset {
    /// Endpoint the data was fetched from
    pub server: String,
    pub product: String,
    pub band: String,
    pub latitude: f64,
    pub longitude: f64,
    pub km_above_below: u32,
    pub km_left_right: u32,
    pub grid: GridMetadata,
    /// Retrieved dates, one per data row
    pub dates: Vec<DateToken>,
    #[serde(with = "matrix_serde")]
    pub data: Array2<f64>,
    /// Companion QA codes, same shape as `data` once fetched
    #[serde(default, with = "matrix_serde::option")]
    pub qa: Option<Array2<f64>>,
    /// Set once the scale factor has been applied
    #[serde(default)]
    pub is_scaled: bool,
}

impl ModisDataset {
    /// Decoded `YYYYDDD` dates.
    pub fn date_ints(&self) -> Vec<i64> {
        self.dates.iter().map(DateToken::as_int).collect()
    }

    /// Server-form date strings.
    pub fn date_strs(&self) -> Vec<String> {
        self.dates.iter().map(ToString::to_string).collect()
    }

    /// Shape of the data matrix as `(dates, cells)`.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Multiply the data by the scale factor. Repeated calls are no-ops.
    pub fn apply_scale(&mut self) {
        if self.is_scaled {
            debug!(product = %self.product, band = %self.band, "Scale already applied");
            return;
        }

        let scale = self.grid.scale;
        self.data.mapv_inplace(|v| v * scale);
        self.is_scaled = true;
    }

    /// Replace every cell whose QA code is not in `accept` with `fill`.
    ///
    /// Fails if no QA matrix is attached or its shape differs from `data`.
    pub fn filter_qa(&mut self, accept: &HashSet<i64>, fill: f64) -> Result<()> {
        let qa = match &self.qa {
            Some(qa) if qa.dim() == self.data.dim() => qa,
            other => {
                return Err(ModisError::ShapeMismatch {
                    data: self.data.dim(),
                    qa: other.as_ref().map(|q| q.dim()),
                })
            }
        };

        let mut rejected = 0usize;
        Zip::from(&mut self.data).and(qa).for_each(|value, &code| {
            if !code.is_finite() || !accept.contains(&(code as i64)) {
                *value = fill;
                rejected += 1;
            }
        });

        debug!(rejected = rejected, total = self.data.len(), "Applied QA filter");
        Ok(())
    }

    /// Base file name: `product.band.LAT__lat.LON__lon.first.last.nrows.ncols`.
    pub fn file_stem(&self) -> String {
        let first = self.dates.first().map(ToString::to_string).unwrap_or_default();
        let last = self.dates.last().map(ToString::to_string).unwrap_or_default();

        format!(
            "{}.{}.LAT__{}.LON__{}.{}.{}.{}.{}",
            self.product,
            self.band,
            self.latitude,
            self.longitude,
            first,
            last,
            self.grid.nrows,
            self.grid.ncols
        )
    }

    /// Write the dataset as JSON into `dir`, returning the file path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", self.file_stem()));

        let file = std::fs::File::create(&path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;

        info!(path = %path.display(), rows = self.data.nrows(), "Saved dataset");
        Ok(path)
    }

    /// Read a dataset previously written by [`ModisDataset::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let dataset = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(dataset)
    }
}

impl fmt::Display for ModisDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "server: {}", self.server)?;
        writeln!(f, "product: {}", self.product)?;
        writeln!(f, "latitude: {}", self.latitude)?;
        writeln!(f, "longitude: {}", self.longitude)?;
        writeln!(f, "band: {}", self.band)?;
        writeln!(f, "nrows: {}", self.grid.nrows)?;
        writeln!(f, "ncols: {}", self.grid.ncols)?;
        writeln!(f, "cellsize: {}", self.grid.cellsize)?;
        writeln!(f, "scale: {}", self.grid.scale)?;
        writeln!(f, "units: {}", self.grid.units)?;
        writeln!(f, "xllcorner: {}", self.grid.xllcorner)?;
        writeln!(f, "yllcorner: {}", self.grid.yllcorner)?;
        writeln!(f, "kmAboveBelow: {}", self.km_above_below)?;
        writeln!(f, "kmLeftRight: {}", self.km_left_right)?;
        writeln!(f, "dates: {}", self.date_strs().join(", "))?;
        match &self.qa {
            Some(qa) => writeln!(f, "QA:\n{}", qa)?,
            None => writeln!(f, "QA: none")?,
        }
        write!(f, "{}", self.data)
    }
}

/// Parse a QA accept set such as `0..65536/2,7`.
///
/// Items are comma separated; each is a single code, a half-open range
/// `a..b`, or a stepped range `a..b/step`.
pub fn parse_qa_codes(spec: &str) -> Result<HashSet<i64>> {
    let invalid =
        |item: &str| ModisError::configuration(format!("invalid QA code item: {:?}", item));
    let mut codes = HashSet::new();

    for item in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: usize = step.trim().parse().map_err(|_| invalid(item))?;
                if step == 0 {
                    return Err(invalid(item));
                }
                (range, step)
            }
            None => (item, 1),
        };

        match range.split_once("..") {
            Some((lo, hi)) => {
                let lo: i64 = lo.trim().parse().map_err(|_| invalid(item))?;
                let hi: i64 = hi.trim().parse().map_err(|_| invalid(item))?;
                codes.extend((lo..hi).step_by(step));
            }
            None if step == 1 => {
                codes.insert(range.parse().map_err(|_| invalid(item))?);
            }
            None => return Err(invalid(item)),
        }
    }

    if codes.is_empty() {
        return Err(ModisError::configuration("QA accept set is empty"));
    }

    Ok(codes)
}

/// JSON form of a data matrix.
///
/// JSON has no NaN or infinity, and QA filtering fills with NaN by default,
/// so non-finite cells are written as the strings `NaN`, `inf` and `-inf`.
mod matrix_serde {
    use ndarray::Array2;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Number(f64),
        Special(String),
    }

    #[derive(Serialize, Deserialize)]
    struct Matrix {
        shape: (usize, usize),
        values: Vec<Cell>,
    }

    fn to_matrix(array: &Array2<f64>) -> Matrix {
        let values = array
            .iter()
            .map(|&v| {
                if v.is_finite() {
                    Cell::Number(v)
                } else {
                    Cell::Special(v.to_string())
                }
            })
            .collect();

        Matrix {
            shape: array.dim(),
            values,
        }
    }

    fn from_matrix<E: de::Error>(matrix: Matrix) -> Result<Array2<f64>, E> {
        let values = matrix
            .values
            .into_iter()
            .map(|cell| match cell {
                Cell::Number(v) => Ok(v),
                Cell::Special(s) => s
                    .parse::<f64>()
                    .map_err(|_| E::custom(format!("invalid matrix value {:?}", s))),
            })
            .collect::<Result<Vec<_>, E>>()?;

        Array2::from_shape_vec(matrix.shape, values).map_err(E::custom)
    }

    pub fn serialize<S: Serializer>(array: &Array2<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        to_matrix(array).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Array2<f64>, D::Error> {
        from_matrix(Matrix::deserialize(deserializer)?)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            array: &Option<Array2<f64>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            array.as_ref().map(to_matrix).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Array2<f64>>, D::Error> {
            Option::<Matrix>::deserialize(deserializer)?
                .map(from_matrix)
                .transpose()
        }
    }
}
