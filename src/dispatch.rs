//! Worker pool: events are partitioned by subject onto single-consumer queues, so one subject
//! is always processed by one worker in submission order while other subjects run in parallel.

use crate::config::DispatchConfig;
use crate::decision::Decision;
use crate::error::{DependencyError, RiskError};
use crate::events::Event;
use crate::risk::RiskEngine;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Result for one submitted event.
#[derive(Debug)]
pub struct Outcome {
    pub event_id: String,
    pub subject_id: String,
    pub result: Result<Decision, RiskError>,
}

pub struct Dispatcher {
    queues: Vec<mpsc::Sender<Event>>,
    workers: Vec<JoinHandle<()>>,
}

/// Stable across processes, unlike `DefaultHasher`.
pub fn partition_for(subject_id: &str, partitions: usize) -> usize {
    let digest = Sha256::digest(subject_id.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % partitions.max(1) as u64) as usize
}

impl Dispatcher {
    /// Start `config.workers` tasks on the current runtime. Outcomes go to `outcomes`.
    pub fn spawn(
        engine: Arc<RiskEngine>,
        config: &DispatchConfig,
        outcomes: mpsc::Sender<Outcome>,
    ) -> Self {
        let timeout = Duration::from_millis(config.model_timeout_ms);
        let mut queues = Vec::with_capacity(config.workers);
        let mut workers = Vec::with_capacity(config.workers);
        for worker in 0..config.workers.max(1) {
            let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
            queues.push(tx);
            workers.push(tokio::spawn(run_worker(
                worker,
                Arc::clone(&engine),
                rx,
                outcomes.clone(),
                timeout,
            )));
        }
        Self { queues, workers }
    }

    pub fn workers(&self) -> usize {
        self.queues.len()
    }

    /// Queue `event` on its subject's worker; waits while that queue is full.
    /// Returns the event back if the worker has stopped.
    pub async fn submit(&self, event: Event) -> Result<(), Event> {
        let idx = partition_for(&event.subject_id, self.queues.len());
        self.queues[idx].send(event).await.map_err(|e| e.0)
    }

    /// Close the queues and wait for every worker to drain.
    pub async fn shutdown(self) {
        drop(self.queues);
        for handle in self.workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker ended abnormally");
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    engine: Arc<RiskEngine>,
    mut rx: mpsc::Receiver<Event>,
    outcomes: mpsc::Sender<Outcome>,
    timeout: Duration,
) {
    debug!(worker, "worker started");
    while let Some(event) = rx.recv().await {
        let result = assess(&engine, &event, timeout).await;
        let outcome = Outcome {
            event_id: event.event_id,
            subject_id: event.subject_id,
            result,
        };
        if outcomes.send(outcome).await.is_err() {
            warn!(worker, "outcome receiver dropped; stopping worker");
            break;
        }
    }
    debug!(worker, "worker stopped");
}

/// Feature extraction and rules run inline; the model call runs on the blocking pool under a
/// deadline. No retries.
async fn assess(engine: &RiskEngine, event: &Event, timeout: Duration) -> Result<Decision, RiskError> {
    let features = engine.extract(event)?;
    let scorer = engine.scorer();
    let input = features.clone();
    let call = tokio::task::spawn_blocking(move || scorer.score(&input));
    let model_score = match tokio::time::timeout(timeout, call).await {
        Err(_) => return Err(DependencyError::Timeout(timeout.as_millis() as u64).into()),
        Ok(Err(join)) => return Err(DependencyError::Scoring(join.to_string()).into()),
        Ok(Ok(scored)) => scored?,
    };
    engine.conclude(&features, model_score)
}
