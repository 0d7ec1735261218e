use crate::error::PipelineError;
use crate::intake::{self, Shutdown};
use crate::models::row::EmailColumn;
use crate::reader::RowReader;
use crate::validation::dnsmx::MxLookup;
use crate::validation::resolver::MxResolver;
use crate::worker::WorkerPool;
use crate::writer::{StreamWriter, Tally};
use chrono::Utc;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task;
use tracing::{error, info, warn};

/// Sizing and input layout of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Concurrent workers.
    pub workers: usize,
    /// Rows waiting for a worker.
    pub queue_capacity: usize,
    /// Rows read but not yet written, including those being validated.
    pub max_in_flight: usize,
    pub email_column: EmailColumn,
    /// Log progress every this many written rows; 0 disables it.
    pub progress_every: u64,
}

impl PipelineConfig {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            queue_capacity: 256,
            max_in_flight: 1000,
            email_column: EmailColumn::default(),
            progress_every: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    pub elapsed_secs: f64,
    /// Rows read from the input.
    pub submitted: u64,
    /// Rows written to either table.
    pub processed: u64,
    #[serde(flatten)]
    pub tally: Tally,
    pub domain_cache_size: usize,
    pub dns_lookups: u64,
    pub cache_hits: u64,
    /// Set when a shutdown request cut the input short.
    pub interrupted: bool,
}

/// Sinks handed back after a run, with its summary.
pub struct PipelineOutput<A, B> {
    pub summary: RunSummary,
    pub accepted: A,
    pub rejected: B,
}

/// Reader, worker pool and writer wired together around one resolver.
pub struct Pipeline<L> {
    config: PipelineConfig,
    resolver: Arc<MxResolver<L>>,
    shutdown: Shutdown,
}

impl<L: MxLookup + 'static> Pipeline<L> {
    pub fn new(config: PipelineConfig, resolver: Arc<MxResolver<L>>) -> Self {
        Self {
            config,
            resolver,
            shutdown: Shutdown::new(),
        }
    }

    /// Requesting this stops reading; rows already read are still written.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn resolver(&self) -> &Arc<MxResolver<L>> {
        &self.resolver
    }

    /// Validates every row of `input`, splitting it into `accepted` and
    /// `rejected`.
    ///
    /// # Errors
    /// Fails if the input header cannot be read or lacks the email column,
    /// if the input becomes unreadable, or if a sink cannot be written. When
    /// the input fails part-way, every row read before the failure is still
    /// written and flushed before the error is returned.
    pub async fn run<R, A, B>(&self, input: R, accepted: A, rejected: B) -> Result<PipelineOutput<A, B>, PipelineError>
    where
        R: io::Read + Send + 'static,
        A: io::Write + Send + 'static,
        B: io::Write + Send + 'static,
    {
        self.run_with(input, move || Ok((accepted, rejected))).await
    }

    /// Like [`run`](Self::run), but the sinks are only opened once the input
    /// header has been read and holds the email column.
    pub async fn run_with<R, A, B, F>(&self, input: R, open_sinks: F) -> Result<PipelineOutput<A, B>, PipelineError>
    where
        R: io::Read + Send + 'static,
        A: io::Write + Send + 'static,
        B: io::Write + Send + 'static,
        F: FnOnce() -> Result<(A, B), PipelineError> + Send + 'static,
    {
        let started = Instant::now();
        let started_at = Utc::now().to_rfc3339();
        let config = self.config.clone();

        let column = config.email_column.clone();
        let reader = task::spawn_blocking(move || RowReader::new(input, &column)).await??;
        let (accepted, rejected) = task::spawn_blocking(open_sinks).await??;
        let Some(reader) = reader else {
            warn!("input is empty, nothing to validate");
            return Ok(PipelineOutput {
                summary: self.summarize(started, started_at, 0, Tally::default()),
                accepted,
                rejected,
            });
        };

        let schema = reader.schema().clone();
        info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            max_in_flight = config.max_in_flight,
            "starting validation"
        );

        let (intake_tx, intake_rx) = intake::channel(config.queue_capacity, config.max_in_flight);
        let (result_tx, result_rx) = mpsc::channel(config.workers.max(1));

        let headers = schema.headers().to_vec();
        let progress_every = config.progress_every;
        let writer_shutdown = self.shutdown.clone();
        let writer = task::spawn_blocking(move || {
            let outcome = StreamWriter::new(accepted, rejected, &headers, progress_every)
                .and_then(|writer| writer.consume(result_rx));
            if outcome.is_err() {
                writer_shutdown.request();
            }
            outcome
        });

        let pool = WorkerPool::new(self.resolver.clone(), schema.email_index(), config.workers);
        let mut workers = pool.spawn(intake_rx, result_tx);

        let shutdown = self.shutdown.clone();
        let read = task::spawn_blocking(move || reader.feed(intake_tx, shutdown)).await?;
        if let Err(e) = &read {
            error!(error = %e, "input failed, draining rows already read");
        }

        while let Some(joined) = workers.join_next().await {
            joined?;
        }
        let (accepted, rejected, tally) = writer.await??;
        let submitted = read?;

        let summary = self.summarize(started, started_at, submitted, tally);
        info!(
            processed = summary.processed,
            accepted = summary.tally.accepted,
            rejected = summary.tally.rejected,
            elapsed_secs = summary.elapsed_secs,
            "validation finished"
        );

        Ok(PipelineOutput {
            summary,
            accepted,
            rejected,
        })
    }

    fn summarize(&self, started: Instant, started_at: String, submitted: u64, tally: Tally) -> RunSummary {
        let cache = self.resolver.cache();
        RunSummary {
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            elapsed_secs: started.elapsed().as_secs_f64(),
            submitted,
            processed: tally.written(),
            tally,
            domain_cache_size: cache.len(),
            dns_lookups: cache.lookups(),
            cache_hits: cache.hits(),
            interrupted: self.shutdown.is_requested(),
        }
    }
}
