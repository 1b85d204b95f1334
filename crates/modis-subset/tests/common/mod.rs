//! In-memory `ModisService` used by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use modis_subset::{GridMetadata, ModisError, ModisService, Result, SubsetRequest, SubsetResponse};
use test_utils::subset_row;

/// Serves a fixed date list and synthesises subset rows for each request.
pub struct MockService {
    pub dates: Vec<String>,
    pub grid: GridMetadata,
    /// Recorded subset requests, in call order
    pub requests: Mutex<Vec<SubsetRequest>>,
    /// Per-call overrides applied to the response
    pub tamper: Option<Box<dyn Fn(usize, &mut SubsetResponse) + Send + Sync>>,
}

impl MockService {
    pub fn new(dates: Vec<String>, nrows: usize, ncols: usize) -> Self {
        Self {
            dates,
            grid: GridMetadata {
                nrows,
                ncols,
                cellsize: 463.25,
                scale: 0.5,
                units: "m^2/m^2".to_string(),
                xllcorner: -138_000.0,
                yllcorner: 5_780_000.0,
            },
            requests: Mutex::new(Vec::new()),
            tamper: None,
        }
    }

    pub fn with_tamper(
        mut self,
        tamper: impl Fn(usize, &mut SubsetResponse) + Send + Sync + 'static,
    ) -> Self {
        self.tamper = Some(Box::new(tamper));
        self
    }

    /// `(start, end)` tokens of every subset request made so far.
    pub fn windows(&self) -> Vec<(String, String)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.start_date.clone(), r.end_date.clone()))
            .collect()
    }
}

#[async_trait]
impl ModisService for MockService {
    fn endpoint(&self) -> &str {
        "mock://modis"
    }

    async fn products(&self) -> Result<Vec<String>> {
        Ok(vec!["MOD15A2H".to_string(), "MOD13Q1".to_string()])
    }

    async fn bands(&self, product: &str) -> Result<Vec<String>> {
        match product {
            "MOD15A2H" => Ok(vec!["Lai_500m".to_string(), "FparLai_QC".to_string()]),
            _ => Err(ModisError::soap(format!("unknown product {}", product))),
        }
    }

    async fn dates(&self, _latitude: f64, _longitude: f64, _product: &str) -> Result<Vec<String>> {
        Ok(self.dates.clone())
    }

    async fn subset(&self, request: &SubsetRequest) -> Result<SubsetResponse> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };

        let start = self
            .dates
            .iter()
            .position(|d| *d == request.start_date)
            .ok_or_else(|| ModisError::remote_unavailable("unknown start date"))?;
        let end = self
            .dates
            .iter()
            .position(|d| *d == request.end_date)
            .ok_or_else(|| ModisError::remote_unavailable("unknown end date"))?;

        let cells = self.grid.cells()?;
        let subset = self.dates[start..=end]
            .iter()
            .map(|token| subset_row(&request.product, &request.band, token, cells))
            .collect();

        let mut response = SubsetResponse {
            grid: self.grid.clone(),
            subset,
        };

        if let Some(tamper) = &self.tamper {
            tamper(call, &mut response);
        }

        Ok(response)
    }
}

/// The five-date list used in the worked examples.
pub fn example_dates() -> Vec<String> {
    ["A2006097", "A2006105", "A2006113", "A2006121", "A2006129"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
