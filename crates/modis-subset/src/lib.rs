//! MODIS land product subsets from the ORNL DAAC web service.
//!
//! The service only returns a few dates per request, so a time series for a
//! point is fetched in chunks and assembled into one dense matrix with a
//! row per date and a column per grid cell.
//!
//! # Example
//!
//! ```ignore
//! use modis_subset::{ClientConfig, SoapModisClient, SubsetChunker, SubsetQuery};
//!
//! let config = ClientConfig::from_env();
//! let chunker = SubsetChunker::new(SoapModisClient::new(&config)?, config.chunk_size)?;
//!
//! let mut dataset = chunker
//!     .retrieve(&SubsetQuery {
//!         latitude: 52.0,
//!         longitude: -2.0,
//!         product: "MOD15A2H".into(),
//!         band: "Lai_500m".into(),
//!         start_date: 2006100,
//!         end_date: 2006180,
//!         km_above_below: 0,
//!         km_left_right: 0,
//!     })
//!     .await?;
//!
//! chunker.retrieve_qa(&mut dataset, "FparLai_QC").await?;
//! dataset.apply_scale();
//! ```

pub mod client;
pub mod config;
pub mod dataset;
pub mod date;
pub mod error;
pub mod service;
pub mod soap;
pub mod window;

pub use client::{ModisQuery, QueryRequest, SubsetChunker, SubsetQuery};
pub use config::{ClientConfig, DEFAULT_CHUNK_SIZE, DEFAULT_ENDPOINT};
pub use dataset::{parse_qa_codes, ModisDataset};
pub use date::{parse_date_arg, parse_date_list, DateToken};
pub use error::{ModisError, Result};
pub use service::{GridMetadata, ModisService, SubsetRequest, SubsetResponse, SubsetRow};
pub use soap::SoapModisClient;
pub use window::{filter_dates, plan_windows, RequestWindow};
