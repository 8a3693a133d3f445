//! Data loading and management
//!
//! CSV loading, the price-provider seam used by multi-asset runs, and a
//! Yahoo Finance daily-bar fetcher with CSV export.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use tracing::{info, warn};

use crate::types::{LabError, LabResult, PriceBar};

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const DEFAULT_RANGE: &str = "5y";

// =============================================================================
// CSV Data Loading
// =============================================================================

/// Load OHLCV data from CSV file (datetime,open,high,low,close,volume)
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<PriceBar>> {
    let mut reader = csv::Reader::from_path(path.as_ref()).context("Failed to open CSV file")?;

    let mut bars = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.context(format!("Failed to read row {}", row_idx + 1))?;

        let dt_str = record.get(0).context("Missing datetime column")?;
        let datetime = dt_str
            .parse::<DateTime<Utc>>()
            .or_else(|_| {
                chrono::NaiveDateTime::parse_from_str(dt_str, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
            })
            .or_else(|_| {
                // Daily files often carry bare dates
                chrono::NaiveDate::parse_from_str(dt_str, "%Y-%m-%d").map(|nd| {
                    DateTime::<Utc>::from_naive_utc_and_offset(
                        nd.and_hms_opt(0, 0, 0).unwrap_or_default(),
                        Utc,
                    )
                })
            })
            .context(format!("Failed to parse datetime: {}", dt_str))?;

        let open: f64 = record
            .get(1)
            .context("Missing open column")?
            .parse()
            .context("Failed to parse open")?;
        let high: f64 = record
            .get(2)
            .context("Missing high column")?
            .parse()
            .context("Failed to parse high")?;
        let low: f64 = record
            .get(3)
            .context("Missing low column")?
            .parse()
            .context("Failed to parse low")?;
        let close: f64 = record
            .get(4)
            .context("Missing close column")?
            .parse()
            .context("Failed to parse close")?;
        let volume: f64 = record
            .get(5)
            .context("Missing volume column")?
            .parse()
            .context("Failed to parse volume")?;

        bars.push(PriceBar {
            datetime,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    Ok(bars)
}

/// Save bars to CSV file
pub fn save_to_csv(bars: &[PriceBar], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut file = File::create(path).context("Failed to create output file")?;

    writeln!(file, "datetime,open,high,low,close,volume")?;
    for bar in bars {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            bar.datetime.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        )?;
    }

    info!("Saved {} rows to {}", bars.len(), path.display());
    Ok(())
}

// =============================================================================
// Price Provider Seam
// =============================================================================

/// Source of daily bars for a symbol. Multi-asset runs go through this seam
/// so batches can mix local files with live fetches and stay testable.
pub trait PriceProvider {
    fn fetch(&self, symbol: &str) -> LabResult<Vec<PriceBar>>;
}

/// Provider backed by `<data_dir>/<SYMBOL>_1d.csv` files
pub struct CsvProvider {
    pub data_dir: PathBuf,
}

impl CsvProvider {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        CsvProvider {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}_1d.csv", symbol))
    }
}

impl PriceProvider for CsvProvider {
    fn fetch(&self, symbol: &str) -> LabResult<Vec<PriceBar>> {
        let path = self.path_for(symbol);
        let bars =
            load_csv(&path).map_err(|e| LabError::Data(format!("{}: {e:#}", path.display())))?;
        if bars.is_empty() {
            return Err(LabError::Data(format!("no rows in {}", path.display())));
        }
        Ok(bars)
    }
}

// =============================================================================
// Yahoo Finance Fetcher
// =============================================================================

/// Fetch historical daily bars from the Yahoo Finance chart API
pub struct YahooDataFetcher {
    client: reqwest::blocking::Client,
    pub data_dir: PathBuf,
    pub range: String,
}

#[derive(Debug, serde::Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, serde::Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, serde::Deserialize)]
struct ChartError {
    description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, serde::Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, serde::Deserialize)]
struct Quote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

impl YahooDataFetcher {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir).ok();

        let client = reqwest::blocking::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .user_agent("Mozilla/5.0")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            data_dir,
            range: DEFAULT_RANGE.to_string(),
        })
    }

    /// Fetch daily bars for `symbol` over the configured range.
    /// Rows with missing fields (halted sessions) are dropped.
    pub fn fetch_daily(&self, symbol: &str) -> Result<Vec<PriceBar>> {
        let url = format!(
            "{}/{}?range={}&interval=1d",
            YAHOO_CHART_URL, symbol, self.range
        );

        let response = self.client.get(&url).send().context("Failed to send request")?;
        if !response.status().is_success() {
            anyhow::bail!("API returned status: {}", response.status());
        }

        let parsed: ChartResponse = response.json().context("Failed to parse response")?;

        if let Some(err) = parsed.chart.error {
            anyhow::bail!(
                "chart API error for {}: {}",
                symbol,
                err.description.unwrap_or_default()
            );
        }

        let result = parsed
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .context(format!("No chart data for {}", symbol))?;

        let timestamps = result.timestamp.unwrap_or_default();
        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .context(format!("No quote data for {}", symbol))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        let mut dropped = 0;
        for (i, &ts) in timestamps.iter().enumerate() {
            let row = (
                quote.open.get(i).copied().flatten(),
                quote.high.get(i).copied().flatten(),
                quote.low.get(i).copied().flatten(),
                quote.close.get(i).copied().flatten(),
                quote.volume.get(i).copied().flatten(),
            );
            match row {
                (Some(open), Some(high), Some(low), Some(close), Some(volume)) => {
                    bars.push(PriceBar {
                        datetime: DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now),
                        open,
                        high,
                        low,
                        close,
                        volume,
                    });
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(symbol, dropped, "dropped rows with missing quote fields");
        }

        bars.sort_by_key(|b| b.datetime);
        bars.dedup_by_key(|b| b.datetime);

        info!("Fetched {} daily bars for {}", bars.len(), symbol);
        Ok(bars)
    }

    /// Fetch a symbol and save it as `<data_dir>/<SYMBOL>_1d.csv`
    pub fn download_symbol(&self, symbol: &str) -> Result<PathBuf> {
        let bars = self.fetch_daily(symbol)?;
        if bars.is_empty() {
            anyhow::bail!("No data fetched for {}", symbol);
        }

        let path = self.data_dir.join(format!("{}_1d.csv", symbol));
        save_to_csv(&bars, &path)?;
        Ok(path)
    }
}

impl PriceProvider for YahooDataFetcher {
    fn fetch(&self, symbol: &str) -> LabResult<Vec<PriceBar>> {
        self.fetch_daily(symbol)
            .map_err(|e| LabError::Data(format!("{e:#}")))
    }
}

// =============================================================================
// Data Validation
// =============================================================================

/// Validate a bar series for consistency before running it
pub fn validate_bars(bars: &[PriceBar]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if bars.is_empty() {
        errors.push("No bars provided".to_string());
        return ValidationResult { errors, warnings };
    }

    for (i, bar) in bars.iter().enumerate() {
        if let Err(e) = bar.validate() {
            errors.push(format!("Bar {}: {}", i, e));
        }
        if i > 0 && bar.datetime <= bars[i - 1].datetime {
            warnings.push(format!("Bar {}: not chronological", i));
        }
    }

    ValidationResult { errors, warnings }
}

/// Result of data validation
#[derive(Debug)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
