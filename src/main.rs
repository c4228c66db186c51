use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use time::{format_description::well_known, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use brutescan::error::ScanError;
use brutescan::types::{PortRange, ScanRequest, ScanResults};
use brutescan::{limits, resolver, scanner};

/// brutescan — probe a range of TCP ports on one host with a fixed pool of concurrent connects.
#[derive(Debug, Clone, Parser)]
#[command(name = "brutescan", version, about, long_about = None)]
struct Cli {
    /// Host name or IP address to scan.
    host: String,

    /// Lowest target port.
    #[arg(long, default_value_t = 1)]
    pmin: u16,

    /// Highest target port.
    #[arg(long, default_value_t = 65535)]
    pmax: u16,

    /// Connection timeout in milliseconds.
    #[arg(long, default_value_t = 3000)]
    timeout: u64,

    /// Concurrent pool size. Defaults to the open file limit minus a small reserve;
    /// every worker is a spawned task, so very high limits cost memory up front.
    #[arg(long)]
    pool: Option<usize>,

    /// Print per-port diagnostics (timeouts, open ports, transient dial errors).
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Write results as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    host: &'a str,
    target: String,
    range: PortRange,
    pool_size: usize,
    timeout_ms: u64,
    started_at: String,
    elapsed_ms: u64,
    results: &'a ScanResults,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let budget = limits::fd_budget()?;
    let pool = limits::check_pool_size(
        cli.pool.unwrap_or_else(|| limits::default_pool_size(budget)),
        budget,
    )?;
    let range = PortRange::new(cli.pmin, cli.pmax)?;
    let timeout = Duration::from_millis(cli.timeout);
    if timeout.is_zero() {
        return Err(ScanError::ZeroTimeout.into());
    }

    let target = resolver::resolve(&cli.host)
        .await
        .with_context(|| format!("host resolve error: {}", cli.host))?;
    let request = ScanRequest::new(target, range, timeout, pool)?;

    println!("Scanning {} ({})", cli.host, target);
    println!("Port range: {} ({} ports)", range, range.len());
    println!("Concurrent connections: {}\n", pool);

    // Ctrl-C stops the pool after in-flight probes settle.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel();
        }
    });

    let started_at = now_rfc3339();
    let start = Instant::now();
    let results = scanner::scan_with_cancel(&request, cancel).await?;
    let elapsed = start.elapsed();

    print_open_ports(&results);
    println!("\nScan finished in {:?}", elapsed);

    if let Some(path) = cli.output.as_deref() {
        let report = ScanReport {
            host: &cli.host,
            target: target.to_string(),
            range,
            pool_size: pool,
            timeout_ms: cli.timeout,
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
            results: &results,
        };
        if let Err(e) = write_report_json(path, &report) {
            eprintln!("Failed to write JSON to {}: {}", path.display(), e);
        } else {
            println!("Wrote JSON results to {}", path.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "brutescan=debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_open_ports(results: &ScanResults) {
    let ports = results.sorted_open_ports();
    if ports.is_empty() {
        println!("no open ports found");
        return;
    }
    for port in ports {
        println!("port {:<5} open", port);
    }
}

fn write_report_json(path: &Path, report: &ScanReport<'_>) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
