//! Non-overlapping poll loop.
//!
//! One cycle issues exactly one fetch per stream. The three fetches of a cycle run
//! concurrently and fail independently, but the next cycle's delay is only armed once
//! all three have settled, so two cycles are never in flight at the same time. The delay
//! is armed whether the cycle succeeded or not, giving a steady retry cadence against a
//! failing source instead of a stall or a burst.
//!
//! Stopping clears the pending delay immediately but never aborts in-flight fetches. A
//! cycle that settles after a stop checks the armed flag and does not reschedule.

use crate::{
    client::FeedSource,
    config::FeedConfig,
    context::SharedContext,
    error::FeedError,
    merge::FeedPayload,
    stream::{StreamKind, StreamMap},
};
use futures::future::join_all;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// Buffered [`FeedEvent`]s before the poll loop waits on the consumer.
const EVENT_BUFFER: usize = 256;

/// Poll loop state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PollStatus {
    Stopped,
    Idle,
    Fetching,
}

/// Which ingestion protocol a cycle used.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CycleKind {
    /// Full-replace round issued once on start.
    Bootstrap,
    /// Recurring delta round.
    Delta,
}

/// Result of one stream's fetch within a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    Ingested { added: usize },
    Failed(FeedError),
    /// Fetched under a context generation that was reset while in flight.
    Discarded,
}

/// Aggregate result of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub kind: CycleKind,
    pub generation: u64,
    pub outcomes: StreamMap<StreamOutcome>,
}

impl CycleReport {
    /// `true` if at least one stream was fetched and ingested.
    pub fn is_ok(&self) -> bool {
        self.outcomes
            .values()
            .any(|outcome| matches!(outcome, StreamOutcome::Ingested { .. }))
    }

    /// Rows admitted across every stream.
    pub fn added(&self) -> usize {
        self.outcomes
            .values()
            .map(|outcome| match outcome {
                StreamOutcome::Ingested { added } => *added,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (StreamKind, &FeedError)> {
        self.outcomes.iter().filter_map(|(stream, outcome)| match outcome {
            StreamOutcome::Failed(error) => Some((stream, error)),
            _ => None,
        })
    }
}

/// Notifications published by the poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// One stream failed to fetch or decode; its store and cursor are untouched.
    FetchFailed {
        stream: StreamKind,
        generation: u64,
        error: FeedError,
    },
    /// A cycle settled. Consumers re-render when [`CycleReport::added`] is non-zero.
    Cycle(CycleReport),
}

/// Drives a [`FeedSource`] into a [`SharedContext`].
#[derive(Debug)]
pub struct PollScheduler<Source> {
    source: Arc<Source>,
    context: SharedContext,
    config: FeedConfig,
}

impl<Source> PollScheduler<Source>
where
    Source: FeedSource + 'static,
{
    pub fn new(source: Arc<Source>, context: SharedContext, config: FeedConfig) -> Self {
        Self {
            source,
            context,
            config,
        }
    }

    /// Spawn the loop: one bootstrap full-replace round, then recurring delta rounds.
    ///
    /// Dropping the returned [`PollHandle`] stops the loop like [`PollHandle::stop`].
    pub fn start(self) -> (PollHandle, mpsc::Receiver<FeedEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(PollStatus::Idle);
        let armed = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(self.run(Arc::clone(&armed), stop_rx, status_tx, event_tx));

        let handle = PollHandle {
            armed,
            stop_tx,
            status_rx,
            task,
        };
        (handle, event_rx)
    }

    async fn run(
        self,
        armed: Arc<AtomicBool>,
        mut stop_rx: watch::Receiver<bool>,
        status_tx: watch::Sender<PollStatus>,
        event_tx: mpsc::Sender<FeedEvent>,
    ) {
        info!(
            symbol = %self.context.read().symbol(),
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "starting feed poller"
        );

        let _ = status_tx.send(PollStatus::Fetching);
        let report = self.bootstrap().await;
        let _ = status_tx.send(PollStatus::Idle);

        let mut delivered = publish(&event_tx, report).await;

        while delivered && armed.load(Ordering::Acquire) {
            let stopped = tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => false,
                _ = stop_rx.changed() => true,
            };
            if stopped || !armed.load(Ordering::Acquire) {
                break;
            }

            let _ = status_tx.send(PollStatus::Fetching);
            let report = self.cycle().await;
            let _ = status_tx.send(PollStatus::Idle);

            delivered = publish(&event_tx, report).await;
        }

        armed.store(false, Ordering::Release);
        let _ = status_tx.send(PollStatus::Stopped);
        info!("feed poller stopped");
    }

    /// Full-replace round: one `latest` fetch per stream.
    pub async fn bootstrap(&self) -> CycleReport {
        let (symbol, generation) = {
            let context = self.context.read();
            (context.symbol().clone(), context.generation())
        };

        let fetches = StreamKind::ALL.map(|stream| self.source.fetch_latest(stream, &symbol));
        let results = join_all(fetches).await;

        self.apply(CycleKind::Bootstrap, generation, results)
    }

    /// Delta round: one `delta` fetch per stream from its clamped watermark.
    pub async fn cycle(&self) -> CycleReport {
        let (symbol, generation, since) = {
            let context = self.context.read();
            let since = StreamMap::from_fn(|stream| context.cursors().next_since(stream));
            (context.symbol().clone(), context.generation(), since)
        };

        let fetches = StreamKind::ALL
            .map(|stream| self.source.fetch_delta(stream, &symbol, since[stream]));
        let results = join_all(fetches).await;

        self.apply(CycleKind::Delta, generation, results)
    }

    fn apply(
        &self,
        kind: CycleKind,
        generation: u64,
        results: Vec<Result<FeedPayload, FeedError>>,
    ) -> CycleReport {
        let mut context = self.context.write();
        let stale = context.generation() != generation;
        let mut results = results.into_iter();

        let outcomes = StreamMap::from_fn(|stream| match results.next() {
            Some(Ok(_)) if stale => StreamOutcome::Discarded,
            Some(Ok(payload)) => {
                let added = match kind {
                    CycleKind::Bootstrap => context.ingest_full(stream, payload),
                    CycleKind::Delta => context.ingest_delta(stream, payload),
                };
                StreamOutcome::Ingested { added }
            }
            Some(Err(error)) => {
                warn!(
                    %stream,
                    symbol = %context.symbol(),
                    transient = error.is_transient(),
                    %error,
                    "feed fetch failed"
                );
                StreamOutcome::Failed(error)
            }
            None => StreamOutcome::Discarded,
        });

        if stale {
            debug!(generation, current = context.generation(), "discarded results of reset context");
        }

        let report = CycleReport {
            kind,
            generation,
            outcomes,
        };
        debug!(
            ?kind,
            ok = report.is_ok(),
            added = report.added(),
            "poll cycle settled"
        );
        report
    }
}

/// Publish a settled cycle. Returns `false` once the consumer has gone away.
async fn publish(event_tx: &mpsc::Sender<FeedEvent>, report: CycleReport) -> bool {
    let failures = report
        .failures()
        .map(|(stream, error)| FeedEvent::FetchFailed {
            stream,
            generation: report.generation,
            error: error.clone(),
        })
        .collect::<Vec<_>>();

    for event in failures.into_iter().chain(std::iter::once(FeedEvent::Cycle(report))) {
        if event_tx.send(event).await.is_err() {
            warn!("feed event receiver dropped, stopping poller");
            return false;
        }
    }
    true
}

/// Control handle of a running [`PollScheduler`].
#[derive(Debug)]
pub struct PollHandle {
    armed: Arc<AtomicBool>,
    stop_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<PollStatus>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop the loop. Safe to call at any point, repeatedly, including mid-flight.
    pub fn stop(&self) {
        if self.armed.swap(false, Ordering::AcqRel) {
            info!("stopping feed poller");
        }
        let _ = self.stop_tx.send(true);
    }

    pub fn is_running(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PollStatus {
        *self.status_rx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PollStatus> {
        self.status_rx.clone()
    }

    /// Stop and wait for any in-flight cycle to settle.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.task.await;
    }
}
