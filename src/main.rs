use anyhow::{Context, Result};
use clap::Parser;
use live_proxy::proxy::{CheckerConfig, ProxyChecker, ProxyParser, ProxyResult, ProxyType};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Maximum number of live proxies printed to the terminal
const MAX_DISPLAYED: usize = 50;

/// Validate proxies against several endpoints; only 100% live ones are kept
#[derive(Parser)]
#[command(name = "live-proxy")]
#[command(about = "Validate HTTP, HTTPS, SOCKS4 and SOCKS5 proxies against multiple endpoints")]
struct Cli {
    /// Input file containing proxies (one host:port per line)
    input: PathBuf,
    /// Proxy type (http, https, socks4, socks5)
    #[arg(short = 'p', long, default_value = "http")]
    proto: ProxyType,
    /// Output file for live proxies (default: output/<proto>_live.txt)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Timeout per endpoint check in seconds
    #[arg(short, long, default_value = "6")]
    timeout: u64,
    /// Number of concurrent validations
    #[arg(short = 'n', long, default_value = "100")]
    concurrency: usize,
    /// Number of candidates per batch
    #[arg(long, default_value = "200")]
    batch_size: usize,
    /// Stop once this many live proxies were found (0 = check all)
    #[arg(long, default_value = "0")]
    target: usize,
    /// Also save a detailed JSON report
    #[arg(short, long)]
    json: bool,
    /// Minimal output (just the summary)
    #[arg(short, long)]
    quiet: bool,
    /// Log progress
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let proxies = ProxyParser::parse_file(&cli.input)
        .with_context(|| format!("reading {:?}", cli.input))?;
    if proxies.is_empty() {
        println!("No proxies found in {:?}", cli.input);
        return Ok(());
    }

    let config = CheckerConfig::new()
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_concurrency(cli.concurrency)
        .with_batch_size(cli.batch_size)
        .with_target(cli.target);
    let endpoint_count = config.endpoints.endpoints_for(cli.proto).len();

    println!("Loaded {} proxies from {:?}", proxies.len(), cli.input);
    println!(
        "Testing each {} proxy against {} endpoints",
        cli.proto, endpoint_count
    );
    println!(
        "Timeout: {}s, concurrency: {}, batch: {}",
        cli.timeout, cli.concurrency, cli.batch_size
    );
    println!();

    let checker = ProxyChecker::with_config(config);
    let start = Instant::now();
    let mut live_count = 0;
    let mut on_progress = |checked: usize, total: usize, result: &ProxyResult| {
        if result.alive {
            live_count += 1;
            info!(
                "[{}/{}] live: {} ({}ms)",
                checked,
                total,
                result.proxy,
                result.response_time_ms()
            );
        } else if checked % 100 == 0 || checked == total {
            info!("[{}/{}] {} live so far", checked, total, live_count);
        }
    };
    let live = checker
        .check_all(&proxies, cli.proto, &mut on_progress)
        .await?;

    println!(
        "Checked: {}, live: {}, time: {:.1}s",
        proxies.len(),
        live.len(),
        start.elapsed().as_secs_f64()
    );

    if live.is_empty() {
        println!("No proxies passed all validation checks.");
        return Ok(());
    }

    if !cli.quiet {
        display_results(&live);
    }

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from("output").join(format!("{}_live.txt", cli.proto)));
    save_results(&live, &output, cli.json)?;

    Ok(())
}

fn display_results(results: &[ProxyResult]) {
    println!("\nLive proxies ({}):", results.len());
    for (i, result) in results.iter().take(MAX_DISPLAYED).enumerate() {
        println!(
            "{:>4}. {:<22} {:<7} {:>6.2}s  {:<15}  {}/{}",
            i + 1,
            result.proxy,
            result.protocol.to_string().to_uppercase(),
            result.response_time,
            result.ip_returned.as_deref().unwrap_or("-"),
            result.checks_passed,
            result.checks_total
        );
    }
    if results.len() > MAX_DISPLAYED {
        println!(
            "  ... and {} more (see output file)",
            results.len() - MAX_DISPLAYED
        );
    }
    println!();
}

/// Write live proxies one per line, and optionally a JSON report next to them
fn save_results(results: &[ProxyResult], path: &Path, json: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let content: String = results
        .iter()
        .map(|r| format!("{}\n", r.proxy))
        .collect();
    fs::write(path, content)?;
    println!("Saved {} live proxies to {:?}", results.len(), path);

    if json {
        let json_path = path.with_extension("json");
        fs::write(&json_path, serde_json::to_string_pretty(results)?)?;
        println!("JSON report: {:?}", json_path);
    }

    Ok(())
}
