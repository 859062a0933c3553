//! Risk agent entrypoint: reads NDJSON events from a file or stdin, decides each one through the
//! subject-partitioned worker pool and writes decisions to stdout as NDJSON.
//! Ctrl+C stops ingestion; events already queued are still decided.

use risk_agent::{
    config::AppConfig,
    dispatch::{Dispatcher, Outcome},
    events::parse_event_line,
    logging::StructuredLogger,
    model::load_scorer,
    risk::RiskEngine,
    sink::{AuditStore, DecisionSink, JsonLinesSink},
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How long blocking-pool work may linger once the run has finished.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
struct RunStats {
    read: u64,
    rejected: u64,
    decided: u64,
    failed: u64,
}

async fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, BoxError> {
    Ok(match path {
        Some(p) => Box::new(BufReader::new(tokio::fs::File::open(p).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    })
}

/// Drain outcomes into the sinks. A sink failure is logged and counted as a failed event.
async fn record_outcomes(mut rx: mpsc::Receiver<Outcome>, sinks: Vec<Box<dyn DecisionSink>>) -> (u64, u64) {
    let (mut decided, mut failed) = (0u64, 0u64);
    while let Some(outcome) = rx.recv().await {
        match outcome.result {
            Ok(decision) => match sinks.as_slice().record(&decision) {
                Ok(()) => decided += 1,
                Err(e) => {
                    failed += 1;
                    warn!(event_id = %outcome.event_id, error = %e, "decision not recorded");
                }
            },
            Err(e) => {
                failed += 1;
                warn!(
                    event_id = %outcome.event_id,
                    subject_id = %outcome.subject_id,
                    error = %e,
                    "event not decided"
                );
            }
        }
    }
    (decided, failed)
}

async fn run(
    config: &AppConfig,
    engine: Arc<RiskEngine>,
    sinks: Vec<Box<dyn DecisionSink>>,
    input: Option<PathBuf>,
) -> Result<RunStats, BoxError> {
    let stop = Arc::new(Notify::new());
    let on_signal = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || on_signal.notify_one()) {
        warn!(error = %e, "Ctrl+C handler not installed");
    }

    let (tx, rx) = mpsc::channel(config.dispatch.queue_depth);
    let dispatcher = Dispatcher::spawn(engine, &config.dispatch, tx);
    let recorder = tokio::spawn(record_outcomes(rx, sinks));
    info!(workers = dispatcher.workers(), "dispatcher started");

    let mut stats = RunStats::default();
    let mut lines = open_input(input.as_ref()).await?.lines();
    let mut line_no = 0usize;
    loop {
        let line = tokio::select! {
            _ = stop.notified() => {
                info!("stop requested; draining");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        stats.read += 1;
        match parse_event_line(&line, line_no) {
            Ok(event) => {
                if dispatcher.submit(event).await.is_err() {
                    warn!(line = line_no, "workers stopped; ending ingestion");
                    break;
                }
            }
            Err(e) => {
                stats.rejected += 1;
                warn!(error = %e, "event rejected");
            }
        }
    }

    dispatcher.shutdown().await;
    let (decided, failed) = recorder.await?;
    stats.decided = decided;
    stats.failed = failed;
    Ok(stats)
}

/// Run `fut` to completion, then shut the runtime down without waiting on blocking reads.
/// A stdin read parked on the blocking pool cannot be cancelled and would otherwise hold the
/// runtime's drop until the next line arrives.
fn block_on_then_release<F: Future>(runtime: Runtime, fut: F) -> F::Output {
    let out = runtime.block_on(fut);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    out
}

fn main() -> Result<(), BoxError> {
    let config_path = std::env::var("RISK_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = AppConfig::load(&config_path)?;

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(config = %config_path.display(), "risk agent starting");

    let scorer = load_scorer(&config.model)?;
    let engine = Arc::new(RiskEngine::new(&config, scorer)?);

    let mut sinks: Vec<Box<dyn DecisionSink>> = vec![Box::new(JsonLinesSink::new(std::io::stdout()))];
    if config.audit.enabled {
        std::fs::create_dir_all(&config.data_dir)?;
        let path = config.data_dir.join("audit.db");
        sinks.push(Box::new(AuditStore::open(&path, config.audit.secret.as_bytes())?));
        info!(path = %path.display(), "audit store enabled");
    }

    let input = std::env::args_os().nth(1).map(PathBuf::from);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let stats = block_on_then_release(runtime, run(&config, engine, sinks, input))?;

    info!(
        read = stats.read,
        rejected = stats.rejected,
        decided = stats.decided,
        failed = stats.failed,
        "risk agent finished"
    );
    Ok(())
}
