//! Result persistence
//!
//! Writes run results under the results directory: backtest records as a
//! JSON array plus a flat CSV, other reports as plain JSON documents.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::ResultRecord;

/// Timestamped output path: `<results_dir>/<stem>_<ts>.<ext>`
pub fn results_path(results_dir: impl AsRef<Path>, stem: &str, ext: &str) -> PathBuf {
    let filename = format!(
        "{}_{}.{}",
        stem,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"),
        ext
    );
    results_dir.as_ref().join(filename)
}

/// Serialize any report as pretty JSON
pub fn save_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let file = File::create(path).context("Failed to create results file")?;
    serde_json::to_writer_pretty(file, value).context("Failed to serialize results")?;

    info!("Saved results to {}", path.display());
    Ok(path.to_path_buf())
}

/// Write backtest records as a flat CSV with a fixed column set.
/// The error column is empty for successful records.
pub fn save_records_csv(records: &[ResultRecord], path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut file = File::create(path).context("Failed to create results file")?;

    writeln!(
        file,
        "strategy,symbol,period,return_pct,buy_hold_return_pct,win_rate_pct,num_trades,\
         max_drawdown_pct,sharpe_ratio,final_equity,warmup_bars,effective_start,error"
    )?;

    for r in records {
        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            r.strategy,
            r.symbol,
            r.period,
            r.return_pct,
            r.buy_hold_return_pct,
            r.win_rate_pct,
            r.num_trades,
            r.max_drawdown_pct,
            r.sharpe_ratio,
            r.final_equity,
            r.warmup_bars,
            r.effective_start,
            r.error.as_deref().unwrap_or("")
        )?;
    }

    info!("Saved {} records to {}", records.len(), path.display());
    Ok(path.to_path_buf())
}
