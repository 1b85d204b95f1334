//! MODIS subset fetcher.
//!
//! Queries the ORNL DAAC MODIS web service:
//! - Lists products, bands of a product, or dates available at a point
//! - Retrieves a subset time series in server-sized chunks
//! - Optionally fetches the QA band, filters by QA code and applies the scale
//! - Prints the dataset and/or saves it as JSON

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use modis_subset::{
    parse_date_arg, parse_qa_codes, ClientConfig, ModisDataset, ModisQuery, QueryRequest,
    SoapModisClient, SubsetChunker,
};

#[derive(Parser, Debug)]
#[command(name = "modis-fetch")]
#[command(about = "Retrieve MODIS land product subsets in chunks")]
struct Args {
    /// YAML client configuration (defaults come from the environment)
    #[arg(long, env = "MODIS_CONFIG")]
    config: Option<PathBuf>,

    /// SOAP endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Maximum dates per subset request
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available products
    Products,

    /// List the bands of a product
    Bands {
        #[arg(short, long)]
        product: String,
    },

    /// List the dates available for a product band at a point
    Dates {
        #[arg(short, long)]
        product: String,

        #[arg(short, long)]
        band: String,

        #[command(flatten)]
        point: Point,
    },

    /// Retrieve a subset time series
    Subset(SubsetArgs),
}

#[derive(ClapArgs, Debug)]
struct Point {
    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,
}

#[derive(ClapArgs, Debug)]
struct SubsetArgs {
    #[arg(short, long)]
    product: String,

    #[arg(short, long)]
    band: String,

    #[command(flatten)]
    point: Point,

    /// First date (YYYYDDD or YYYY-MM-DD)
    #[arg(long, value_parser = date_arg)]
    start: i64,

    /// Last date, inclusive (YYYYDDD or YYYY-MM-DD)
    #[arg(long, value_parser = date_arg)]
    end: i64,

    /// Kilometres above and below the point
    #[arg(long)]
    km_above_below: Option<u32>,

    /// Kilometres left and right of the point
    #[arg(long)]
    km_left_right: Option<u32>,

    /// QA band to fetch alongside the data (e.g. FparLai_QC)
    #[arg(long)]
    qa_band: Option<String>,

    /// Accepted QA codes, e.g. "0..65536/2" or "0,2,8..16"
    #[arg(long, requires = "qa_band")]
    qa_ok: Option<String>,

    /// Value written into cells rejected by the QA filter
    #[arg(long, default_value = "NaN", allow_negative_numbers = true)]
    fill: f64,

    /// Multiply the data by the product scale factor
    #[arg(long)]
    scale: bool,

    /// Print the dataset to stdout
    #[arg(long)]
    print: bool,

    /// Directory for the saved dataset (overrides configuration)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Do not save the dataset
    #[arg(long)]
    no_save: bool,
}

fn date_arg(s: &str) -> std::result::Result<i64, String> {
    parse_date_arg(s).map_err(|e| e.to_string())
}

/// Build the client configuration from file or environment, then apply
/// command-line overrides.
fn resolve_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => ClientConfig::from_env(),
    };

    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }

    if let Command::Subset(subset) = &args.command {
        if let Some(km) = subset.km_above_below {
            config.km_above_below = km;
        }
        if let Some(km) = subset.km_left_right {
            config.km_left_right = km;
        }
        if let Some(dir) = &subset.output_dir {
            config.output_dir = dir.clone();
        }
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Translate a subcommand into the query it stands for.
fn build_query(command: &Command, config: &ClientConfig) -> QueryRequest {
    let mut request = QueryRequest {
        km_above_below: config.km_above_below,
        km_left_right: config.km_left_right,
        ..Default::default()
    };

    match command {
        Command::Products => {}
        Command::Bands { product } => {
            request.product = Some(product.clone());
        }
        Command::Dates {
            product,
            band,
            point,
        } => {
            request.product = Some(product.clone());
            request.band = Some(band.clone());
            request.latitude = Some(point.lat);
            request.longitude = Some(point.lon);
        }
        Command::Subset(subset) => {
            request.product = Some(subset.product.clone());
            request.band = Some(subset.band.clone());
            request.latitude = Some(subset.point.lat);
            request.longitude = Some(subset.point.lon);
            request.start_date = Some(subset.start);
            request.end_date = Some(subset.end);
        }
    }

    request
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    Ok(())
}

/// QA retrieval, scaling, filtering and output for a retrieved dataset.
async fn finish_subset(
    chunker: &SubsetChunker<SoapModisClient>,
    mut dataset: ModisDataset,
    subset: &SubsetArgs,
    config: &ClientConfig,
) -> Result<()> {
    if let Some(qa_band) = &subset.qa_band {
        chunker
            .retrieve_qa(&mut dataset, qa_band)
            .await
            .with_context(|| format!("Failed to retrieve QA band {}", qa_band))?;
    }

    if subset.scale {
        dataset.apply_scale();
    }

    if let Some(spec) = &subset.qa_ok {
        let accept = parse_qa_codes(spec)?;
        dataset.filter_qa(&accept, subset.fill)?;
    }

    if subset.print {
        println!("{}", dataset);
    }

    if !subset.no_save {
        let path = dataset.save(&config.output_dir)?;
        info!(path = %path.display(), "Dataset written");
    }

    info!(
        rows = dataset.data.nrows(),
        cells = dataset.data.ncols(),
        "Subset complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let config = resolve_config(&args)?;
    info!(endpoint = %config.endpoint, chunk_size = config.chunk_size, "Starting MODIS fetch");

    let client = SoapModisClient::new(&config).context("Failed to create MODIS client")?;
    let chunker = SubsetChunker::new(client, config.chunk_size)?;

    let request = build_query(&args.command, &config);
    let result = chunker.query(&request).await.context("MODIS query failed")?;

    match result {
        ModisQuery::Products(items) | ModisQuery::Bands(items) => {
            for item in items {
                println!("{}", item);
            }
        }
        ModisQuery::Dates(dates) => {
            for date in dates {
                println!("{}", date);
            }
        }
        ModisQuery::Dataset(dataset) => {
            let Command::Subset(subset) = &args.command else {
                bail!("dataset returned for a listing command");
            };
            finish_subset(&chunker, *dataset, subset, &config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subset_command() {
        let args = Args::try_parse_from([
            "modis-fetch",
            "--chunk-size",
            "4",
            "subset",
            "--product",
            "MOD15A2H",
            "--band",
            "Lai_500m",
            "--lat",
            "52",
            "--lon",
            "-2",
            "--start",
            "2006-04-10",
            "--end",
            "2006180",
            "--qa-band",
            "FparLai_QC",
            "--qa-ok",
            "0..65536/2",
            "--fill",
            "-1",
            "--scale",
        ])
        .unwrap();

        assert_eq!(args.chunk_size, Some(4));
        let Command::Subset(subset) = &args.command else {
            panic!("expected subset command");
        };
        assert_eq!(subset.start, 2006100);
        assert_eq!(subset.end, 2006180);
        assert_eq!(subset.point.lon, -2.0);
        assert_eq!(subset.fill, -1.0);
        assert!(subset.scale);
    }

    #[test]
    fn test_bad_date_rejected() {
        let result = Args::try_parse_from([
            "modis-fetch",
            "subset",
            "-p",
            "MOD15A2H",
            "-b",
            "Lai_500m",
            "--lat",
            "52",
            "--lon",
            "0",
            "--start",
            "2006400",
            "--end",
            "2006180",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_qa_ok_requires_qa_band() {
        let result = Args::try_parse_from([
            "modis-fetch",
            "subset",
            "-p",
            "MOD15A2H",
            "-b",
            "Lai_500m",
            "--lat",
            "52",
            "--lon",
            "0",
            "--start",
            "2006100",
            "--end",
            "2006180",
            "--qa-ok",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_query_modes() {
        let config = ClientConfig::default();

        let request = build_query(&Command::Products, &config);
        assert_eq!(request, QueryRequest::default());

        let request = build_query(
            &Command::Bands {
                product: "MOD15A2H".to_string(),
            },
            &config,
        );
        assert_eq!(request.product.as_deref(), Some("MOD15A2H"));
        assert!(request.band.is_none());

        let request = build_query(
            &Command::Dates {
                product: "MOD15A2H".to_string(),
                band: "Lai_500m".to_string(),
                point: Point { lat: 52.0, lon: 0.0 },
            },
            &config,
        );
        assert_eq!(request.latitude, Some(52.0));
        assert!(request.start_date.is_none());
    }

    #[test]
    fn test_resolve_config_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modis.yaml");
        std::fs::write(&path, "chunk_size: 4\nkm_left_right: 3\n").unwrap();

        let args = Args::try_parse_from([
            "modis-fetch",
            "--config",
            path.to_str().unwrap(),
            "--chunk-size",
            "2",
            "subset",
            "-p",
            "MOD15A2H",
            "-b",
            "Lai_500m",
            "--lat",
            "52",
            "--lon",
            "0",
            "--start",
            "2006100",
            "--end",
            "2006180",
            "--km-above-below",
            "1",
            "--output-dir",
            "/tmp/out",
        ])
        .unwrap();

        let config = resolve_config(&args).unwrap();
        assert_eq!(config.chunk_size, 2);
        assert_eq!(config.km_left_right, 3);
        assert_eq!(config.km_above_below, 1);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_resolve_config_rejects_zero_chunk() {
        let args = Args::try_parse_from(["modis-fetch", "--chunk-size", "0", "products"]).unwrap();
        assert!(resolve_config(&args).is_err());
    }
}
