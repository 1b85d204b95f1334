//! Chunked subset retrieval.
//!
//! ```text
//! getdates(lat, lon, product)
//!      │
//!      ├─► filter_dates   count dates in [start, end], allocate matrix
//!      │
//!      ├─► plan_windows   greedy windows of <= chunk_size dates
//!      │
//!      └─► getsubset per window, sequentially
//!               │
//!               └─► rows written at an explicit row cursor
//! ```

use ndarray::Array2;
use tracing::{debug, info, instrument};

use crate::dataset::ModisDataset;
use crate::date::{parse_date_list, DateToken};
use crate::error::{ModisError, Result};
use crate::service::{GridMetadata, ModisService, SubsetRequest, SubsetRow};
use crate::window::{filter_dates, plan_windows};

/// A fully specified subset retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub product: String,
    pub band: String,
    /// First date, `YYYYDDD`
    pub start_date: i64,
    /// Last date, `YYYYDDD`, inclusive
    pub end_date: i64,
    pub km_above_below: u32,
    pub km_left_right: u32,
}

/// A partially specified query. Which fields are set decides what
/// [`SubsetChunker::query`] returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub product: Option<String>,
    pub band: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
    pub km_above_below: u32,
    pub km_left_right: u32,
}

/// Result of [`SubsetChunker::query`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModisQuery {
    /// No product given: the available products
    Products(Vec<String>),
    /// No band given: the bands of the product
    Bands(Vec<String>),
    /// No date range given: the dates available at the point
    Dates(Vec<DateToken>),
    /// Everything given: the assembled dataset
    Dataset(Box<ModisDataset>),
}

/// Splits date ranges into server-sized requests and assembles the rows.
pub struct SubsetChunker<S> {
    service: S,
    chunk_size: usize,
}

impl<S: ModisService> SubsetChunker<S> {
    /// Create a chunker issuing at most `chunk_size` dates per request.
    pub fn new(service: S, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ModisError::configuration("chunk size must be > 0"));
        }
        Ok(Self {
            service,
            chunk_size,
        })
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Answer a query according to which of its fields are set.
    ///
    /// Product unset lists products, band unset lists bands, an unset date
    /// range lists dates, otherwise a dataset is retrieved. A band without
    /// both coordinates is a configuration error.
    pub async fn query(&self, request: &QueryRequest) -> Result<ModisQuery> {
        let Some(product) = &request.product else {
            return Ok(ModisQuery::Products(self.service.products().await?));
        };

        let Some(band) = &request.band else {
            return Ok(ModisQuery::Bands(self.service.bands(product).await?));
        };

        let (Some(latitude), Some(longitude)) = (request.latitude, request.longitude) else {
            return Err(ModisError::missing_lat_lon());
        };

        let dates = self.fetch_dates(latitude, longitude, product).await?;

        let (Some(start_date), Some(end_date)) = (request.start_date, request.end_date) else {
            return Ok(ModisQuery::Dates(dates));
        };

        let query = SubsetQuery {
            latitude,
            longitude,
            product: product.clone(),
            band: band.clone(),
            start_date,
            end_date,
            km_above_below: request.km_above_below,
            km_left_right: request.km_left_right,
        };

        let dataset = self.assemble(&query, &dates).await?;
        Ok(ModisQuery::Dataset(Box::new(dataset)))
    }

    /// Retrieve the dataset for a fully specified query.
    pub async fn retrieve(&self, query: &SubsetQuery) -> Result<ModisDataset> {
        let dates = self
            .fetch_dates(query.latitude, query.longitude, &query.product)
            .await?;
        self.assemble(query, &dates).await
    }

    /// Fetch the QA band matching `dataset` and attach it as `dataset.qa`.
    ///
    /// The QA retrieval spans the dataset's first to last date with the same
    /// point, product and spatial extent.
    pub async fn retrieve_qa(&self, dataset: &mut ModisDataset, qa_band: &str) -> Result<()> {
        let (Some(first), Some(last)) = (dataset.dates.first(), dataset.dates.last()) else {
            return Err(ModisError::configuration("dataset has no dates"));
        };

        let query = SubsetQuery {
            latitude: dataset.latitude,
            longitude: dataset.longitude,
            product: dataset.product.clone(),
            band: qa_band.to_string(),
            start_date: first.as_int(),
            end_date: last.as_int(),
            km_above_below: dataset.km_above_below,
            km_left_right: dataset.km_left_right,
        };

        let qa = self.retrieve(&query).await?;
        info!(band = %qa_band, shape = ?qa.shape(), "Retrieved QA band");
        dataset.qa = Some(qa.data);
        Ok(())
    }

    async fn fetch_dates(
        &self,
        latitude: f64,
        longitude: f64,
        product: &str,
    ) -> Result<Vec<DateToken>> {
        let raw = self.service.dates(latitude, longitude, product).await?;
        if raw.is_empty() {
            return Err(ModisError::remote_unavailable(format!(
                "no dates for {} at ({}, {})",
                product, latitude, longitude
            )));
        }
        parse_date_list(&raw)
    }

    #[instrument(skip(self, query, dates), fields(product = %query.product, band = %query.band))]
    async fn assemble(&self, query: &SubsetQuery, dates: &[DateToken]) -> Result<ModisDataset> {
        let in_range = filter_dates(dates, query.start_date, query.end_date);
        if in_range.is_empty() {
            return Err(ModisError::EmptyDateRange {
                start: query.start_date,
                end: query.end_date,
            });
        }

        let windows = plan_windows(dates, query.start_date, query.end_date, self.chunk_size)?;
        info!(
            dates = in_range.len(),
            windows = windows.len(),
            chunk_size = self.chunk_size,
            "Retrieving subset"
        );

        let mut grid: Option<GridMetadata> = None;
        let mut data = Array2::<f64>::zeros((0, 0));
        let mut cursor = 0usize;

        for (n, window) in windows.iter().enumerate() {
            debug!(
                window = n,
                start = %window.start,
                end = %window.end,
                len = window.len,
                "Requesting window"
            );

            let request = SubsetRequest {
                latitude: query.latitude,
                longitude: query.longitude,
                product: query.product.clone(),
                band: query.band.clone(),
                start_date: window.start.to_string(),
                end_date: window.end.to_string(),
                km_above_below: query.km_above_below,
                km_left_right: query.km_left_right,
            };

            let response = self.service.subset(&request).await?;
            if response.subset.is_empty() {
                return Err(ModisError::remote_unavailable(format!(
                    "empty subset for {}..{}",
                    window.start, window.end
                )));
            }

            match &grid {
                None => {
                    data = Array2::zeros((in_range.len(), response.grid.cells()?));
                    grid = Some(response.grid.clone());
                }
                Some(first) => {
                    if let Some(diff) = first.mismatch(&response.grid) {
                        return Err(ModisError::inconsistent_grid(format!(
                            "window {}..{}: {}",
                            window.start, window.end, diff
                        )));
                    }
                }
            }

            if response.subset.len() != window.len {
                return Err(ModisError::inconsistent_grid(format!(
                    "window {}..{} returned {} rows for {} dates",
                    window.start,
                    window.end,
                    response.subset.len(),
                    window.len
                )));
            }

            for line in &response.subset {
                if cursor >= data.nrows() {
                    return Err(ModisError::inconsistent_grid(format!(
                        "more rows returned than the {} dates requested",
                        data.nrows()
                    )));
                }

                let row = SubsetRow::parse(line, cursor)?;
                if row.values.len() != data.ncols() {
                    return Err(ModisError::inconsistent_grid(format!(
                        "row {} has {} values, grid has {} cells",
                        cursor,
                        row.values.len(),
                        data.ncols()
                    )));
                }

                for (cell, value) in data.row_mut(cursor).iter_mut().zip(&row.values) {
                    *cell = *value as f64;
                }
                cursor += 1;
            }
        }

        let grid =
            grid.ok_or_else(|| ModisError::remote_unavailable("no subset windows returned data"))?;

        info!(rows = cursor, cells = data.ncols(), "Subset assembled");

        Ok(ModisDataset {
            server: self.service.endpoint().to_string(),
            product: query.product.clone(),
            band: query.band.clone(),
            latitude: query.latitude,
            longitude: query.longitude,
            km_above_below: query.km_above_below,
            km_left_right: query.km_left_right,
            grid,
            dates: in_range,
            data,
            qa: None,
            is_scaled: false,
        })
    }
}
