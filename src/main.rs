use anyhow::{Context, Result};
use clap::Parser;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn, Level};

use originality_scan::{HttpScanClient, ScanConfig, ScanEvent, ScanHandle, ScanScheduler};

#[derive(Parser, Debug)]
#[command(name = "originality-scan")]
#[command(about = "Debounced, cache-aware originality scanning of a text file")]
#[command(version)]
struct Args {
    /// Text file to scan
    file: PathBuf,

    /// Project the scan is billed to
    #[arg(long)]
    project_id: String,

    /// Base URL of the scanning service
    #[arg(long)]
    endpoint: String,

    /// Bearer token for the scanning service
    #[arg(long)]
    token: Option<String>,

    /// TOML config file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scan automatically after edits settle
    #[arg(long)]
    auto_scan: bool,

    /// Quiet period before an automatic scan
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Similarity percent above which a rescan needs confirmation
    #[arg(long)]
    threshold: Option<u8>,

    /// Client-side limit on a single scan request
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Keep running and rescan when the file changes
    #[arg(long)]
    watch: bool,

    /// How often to poll the file in watch mode
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    poll_ms: u64,

    /// Confirm near-duplicate rescans without asking
    #[arg(long)]
    assume_yes: bool,

    /// Debug-level logging
    #[arg(long)]
    verbose: bool,
}

fn build_config(args: &Args) -> Result<ScanConfig> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::load(path)
            .with_context(|| format!("Loading config {}", path.display()))?,
        None => ScanConfig::default(),
    };

    if args.auto_scan || args.watch {
        config.auto_scan_enabled = true;
    }
    if let Some(debounce_ms) = args.debounce_ms {
        config.debounce_ms = debounce_ms;
    }
    if let Some(threshold) = args.threshold {
        config.rescan_similarity_threshold = threshold;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.request_timeout_ms = Some(timeout_ms);
    }
    config.validate()?;
    Ok(config)
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Reading {}", path.display()))
}

/// Print a final outcome. Returns false when the scan did not succeed.
fn report(event: &ScanEvent) -> Result<bool> {
    match event {
        ScanEvent::ScanCompleted(result) | ScanEvent::CacheHit(result) => {
            println!("{}", serde_json::to_string_pretty(result.as_ref())?);
            let counts = result.severity_counts();
            eprintln!(
                "Originality score: {:.0}% ({} high, {} moderate, {} low matches)",
                result.overall_score, counts.high, counts.moderate, counts.low
            );
            Ok(true)
        }
        ScanEvent::UpgradeRequired { message } => {
            eprintln!("Scan limit reached, upgrade required: {message}");
            Ok(false)
        }
        ScanEvent::Advisory { message } => {
            eprintln!("Scanning service under maintenance: {message}");
            Ok(false)
        }
        ScanEvent::ScanFailed { message } => {
            eprintln!("Scan failed: {message}");
            Ok(false)
        }
        ScanEvent::EmptyContent => {
            eprintln!("Please enter some text to scan");
            Ok(false)
        }
        _ => Ok(true),
    }
}

async fn run_once(handle: &ScanHandle) -> Result<()> {
    let mut events = handle.subscribe();
    handle.scan_now()?;

    loop {
        match events.recv().await {
            Ok(event @ (ScanEvent::ScanCompleted(_)
            | ScanEvent::CacheHit(_)
            | ScanEvent::UpgradeRequired { .. }
            | ScanEvent::Advisory { .. }
            | ScanEvent::ScanFailed { .. }
            | ScanEvent::EmptyContent)) => {
                let succeeded = report(&event)?;
                handle.shutdown()?;
                if !succeeded {
                    anyhow::bail!("Originality scan did not complete");
                }
                return Ok(());
            }
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped scan events"),
            Err(RecvError::Closed) => anyhow::bail!("Scan session ended unexpectedly"),
        }
    }
}

/// Poll `path` until `stop` resolves, feeding edits to the scheduler
async fn run_watch(
    handle: &ScanHandle,
    path: &Path,
    poll: Duration,
    assume_yes: bool,
    stop: impl Future<Output = ()>,
) -> Result<()> {
    let mut events = handle.subscribe();
    let mut last_text = read_text(path).await?;
    let mut ticker = tokio::time::interval(poll);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            () = &mut stop => {
                info!("Interrupted; stopping watch");
                handle.shutdown()?;
                return Ok(());
            }
            _ = ticker.tick() => {
                match read_text(path).await {
                    Ok(text) if text != last_text => {
                        handle.content_changed(text.as_str())?;
                        last_text = text;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Could not re-read watched file"),
                }
            }
            event = events.recv() => match event {
                Ok(ScanEvent::StatusChanged(status)) => eprintln!("Status: {status}"),
                Ok(ScanEvent::ConfirmationRequired { similarity }) => {
                    eprintln!("Document is {similarity}% identical to the last scan");
                    if assume_yes {
                        handle.confirm_rescan()?;
                    } else {
                        eprintln!("Skipping rescan (pass --assume-yes to scan anyway)");
                        handle.decline_rescan()?;
                    }
                }
                Ok(event) => {
                    report(&event)?;
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped scan events"),
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // WHY: structured JSON logging on stderr keeps stdout for the scan result
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .json()
        .init();

    info!(
        file = %args.file.display(),
        project_id = %args.project_id,
        endpoint = %args.endpoint,
        watch = args.watch,
        "Parsed CLI arguments"
    );

    // WHY: validate the input file early to fail fast with clear error
    if !args.file.is_file() {
        anyhow::bail!("Input file does not exist: {}", args.file.display());
    }

    let config = build_config(&args)?;
    // Request timeout is applied by the scheduler, not the transport
    let client = HttpScanClient::new(args.endpoint.clone(), args.token.as_deref(), None)?;
    let content = read_text(&args.file).await?;
    info!(bytes = content.len(), auto_scan = config.auto_scan_enabled, "Loaded document");

    let handle = ScanScheduler::spawn(args.project_id.clone(), content, config, Arc::new(client));

    if args.watch {
        let interrupted = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        run_watch(
            &handle,
            &args.file,
            Duration::from_millis(args.poll_ms),
            args.assume_yes,
            interrupted,
        )
        .await?;
    } else {
        run_once(&handle).await?;
    }
    handle.closed().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use originality_scan::{RemoteScanClient, ScanError, ScanRequest, ScanResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::NamedTempFile;

    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteScanClient for CountingClient {
        async fn scan(&self, _request: ScanRequest) -> Result<ScanResult, ScanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ScanResult {
                overall_score: 92.0,
                matches: vec![],
                words_scanned: 2,
            })
        }
    }

    fn base_args() -> Vec<&'static str> {
        vec!["originality-scan", "draft.txt", "--project-id", "p1", "--endpoint", "http://localhost"]
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut argv = base_args();
        argv.extend(["--watch", "--poll-ms", "0"]);
        assert!(Args::try_parse_from(argv).is_err());

        let mut argv = base_args();
        argv.extend(["--poll-ms", "1"]);
        assert_eq!(Args::try_parse_from(argv).unwrap().poll_ms, 1);
    }

    #[test]
    fn test_flags_override_config() {
        let mut argv = base_args();
        argv.extend(["--watch", "--debounce-ms", "250", "--threshold", "90"]);
        let config = build_config(&Args::try_parse_from(argv).unwrap()).unwrap();
        assert!(config.auto_scan_enabled);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.rescan_similarity_threshold, 90);
    }

    #[tokio::test]
    async fn test_watch_stops_when_stop_future_resolves() {
        let mut file = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"first draft").unwrap();

        let client = Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
        });
        let config = ScanConfig {
            auto_scan_enabled: true,
            debounce_ms: 10,
            ..ScanConfig::default()
        };
        let handle = ScanScheduler::spawn("p1", "first draft", config, client.clone());

        let path = file.path().to_path_buf();
        let edit = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tokio::fs::write(&path, "second draft with new words").await.unwrap();
        };
        let stop = tokio::time::sleep(Duration::from_millis(500));
        let (watched, ()) = tokio::join!(
            run_watch(&handle, &path, Duration::from_millis(5), false, stop),
            edit
        );

        watched.unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle.closed())
            .await
            .unwrap();
        assert!(client.calls.load(Ordering::SeqCst) >= 1);
    }
}
