//! Wires `InputStage`, `ProcessingStage` and `OutputStage` into a runnable
//! pipeline: [`PipelineConfig`] describes the shape, [`PipelineRunner`] owns
//! the threads, channels and shared `BatchPool` for one `run()`.

mod input;
mod output;
mod processing;

pub use processing::{process_batch, Mutator, Predicate};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{event, Level};

use crate::batch::BatchPool;
use crate::error::PipelineError;
use crate::io::{RecordReader, RecordWriter};
use crate::stats::PipelineStats;

/// Shared cancellation signal plus a "first observed failure wins" slot.
/// Every stage polls `is_cancelled` between records/batches and calls
/// `report_failure` at most once per structural failure; whichever stage
/// gets there first is the error `PipelineRunner::run` returns.
#[derive(Clone)]
pub(crate) struct Cancellation {
    flag: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<PipelineError>>>,
}

impl Cancellation {
    fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Records `err` as the pipeline's failure if none has been recorded yet,
    /// and raises the cancellation flag either way.
    pub(crate) fn report_failure(&self, err: PipelineError) {
        let mut guard = self.failure.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(err);
        }
        drop(guard);
        self.cancel();
    }

    fn take_failure(&self) -> Option<PipelineError> {
        self.failure.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn flag_handle(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }
}

/// Tunables for one [`PipelineRunner`]. `Default` matches the values called
/// out as defaults: a 10k-record batch, one worker per available core, no
/// explicit in-flight cap, a small warm pool that is allowed to grow and
/// periodically shrink back down.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_size: usize,
    /// Worker thread count for `ProcessingStage`. `0` resolves to the
    /// available parallelism at `run()` time. `1` runs the whole pipeline on
    /// the calling thread with no channels or extra threads at all.
    pub thread_count: usize,
    /// Caps batches simultaneously in flight (acquired but not yet
    /// released). `None` resolves to `max(4, thread_count * 2)`, enough
    /// headroom for every stage to hold one batch without starving the
    /// others.
    pub max_in_flight: Option<usize>,
    pub pool_initial_size: usize,
    pub pool_max_size: usize,
    pub enable_pool_shrink: bool,
    pub shrink_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            thread_count: 0,
            max_in_flight: None,
            pool_initial_size: 10,
            pool_max_size: 1_000,
            enable_pool_shrink: true,
            shrink_interval: Duration::from_secs(30),
        }
    }
}

struct ResolvedConfig {
    batch_size: usize,
    thread_count: usize,
    max_in_flight: usize,
    pool_initial_size: usize,
    pool_max_size: usize,
    enable_pool_shrink: bool,
    shrink_interval: Duration,
}

impl PipelineConfig {
    fn resolve(self) -> Result<ResolvedConfig, PipelineError> {
        if self.batch_size < 1 {
            return Err(PipelineError::ConfigInvalid(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if let Some(max_in_flight) = self.max_in_flight {
            if max_in_flight < 2 {
                return Err(PipelineError::ConfigInvalid(
                    "max_in_flight must be at least 2 when set explicitly".to_string(),
                ));
            }
        }
        if self.pool_initial_size > self.pool_max_size {
            return Err(PipelineError::ConfigInvalid(format!(
                "pool_initial_size ({}) exceeds pool_max_size ({})",
                self.pool_initial_size, self.pool_max_size
            )));
        }

        let thread_count = if self.thread_count == 0 {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.thread_count
        };
        let max_in_flight = self
            .max_in_flight
            .unwrap_or_else(|| thread_count.max(1).saturating_mul(2).max(4));

        Ok(ResolvedConfig {
            batch_size: self.batch_size,
            thread_count,
            max_in_flight,
            pool_initial_size: self.pool_initial_size,
            pool_max_size: self.pool_max_size,
            enable_pool_shrink: self.enable_pool_shrink,
            shrink_interval: self.shrink_interval,
        })
    }
}

/// Owns the `BatchPool`, the stage threads, and the cancellation signal for
/// one end-to-end run. Construct with [`PipelineRunner::new`], consume with
/// [`PipelineRunner::run`].
pub struct PipelineRunner {
    config: ResolvedConfig,
    pool: Arc<BatchPool>,
    reader: Box<dyn RecordReader>,
    writer: Box<dyn RecordWriter>,
    predicates: Vec<Arc<dyn Predicate>>,
    mutators: Vec<Arc<dyn Mutator>>,
}

impl PipelineRunner {
    pub fn new(
        config: PipelineConfig,
        reader: Box<dyn RecordReader>,
        writer: Box<dyn RecordWriter>,
        predicates: Vec<Arc<dyn Predicate>>,
        mutators: Vec<Arc<dyn Mutator>>,
    ) -> Result<Self, PipelineError> {
        let resolved = config.resolve()?;
        let pool = Arc::new(BatchPool::new(
            resolved.batch_size,
            resolved.pool_initial_size,
            resolved.pool_max_size,
            resolved.max_in_flight,
        ));

        Ok(Self {
            config: resolved,
            pool,
            reader,
            writer,
            predicates,
            mutators,
        })
    }

    /// Runs the pipeline to completion. Returns the aggregate stats on
    /// success, or the first structural failure any stage reported
    /// (read/write I/O error, or a panicking stage). Per-record predicate or
    /// mutator failures never surface here — see `PipelineStats::errored_records`.
    pub fn run(self) -> Result<PipelineStats, PipelineError> {
        if self.config.thread_count <= 1 {
            return self.run_sequential();
        }
        self.run_parallel()
    }

    fn run_sequential(mut self) -> Result<PipelineStats, PipelineError> {
        use crate::io::ReadOutcome;
        use crate::pipeline::processing::process_batch;
        use crate::stats::StatsCollector;

        event!(Level::DEBUG, "running pipeline on a single thread");
        let wall_start = Instant::now();
        let mut collector = StatsCollector::new();
        let mut next_seq: u64 = 0;
        let mut failure = None;

        loop {
            let mut batch = self.pool.acquire();
            let started = Instant::now();
            let outcome = self.reader.read_into(&mut batch);
            batch.set_input_elapsed(started.elapsed());

            match outcome {
                Ok(ReadOutcome::Eof) => {
                    self.pool.release(batch);
                    break;
                }
                Ok(ReadOutcome::FilledAtLeastOne) => {
                    batch.set_seq_no(next_seq);
                    next_seq += 1;
                }
                Err(err) => {
                    self.pool.release(batch);
                    failure = Some(PipelineError::ReadFailure(err));
                    break;
                }
            }

            let mut stats = process_batch(&mut batch, &self.predicates, &self.mutators);
            let write_started = Instant::now();
            match self.writer.write_batch(&batch) {
                Ok(()) => {
                    stats.output_time = write_started.elapsed();
                    collector.fold(&stats);
                    self.pool.release(batch);
                }
                Err(err) => {
                    self.pool.release(batch);
                    failure = Some(PipelineError::WriteFailure(err));
                    break;
                }
            }
        }

        let wall_time = wall_start.elapsed();
        let pool_stats = self.pool.stats();

        if let Some(err) = failure {
            return Err(err);
        }
        Ok(collector.finish(wall_time, pool_stats))
    }

    fn run_parallel(self) -> Result<PipelineStats, PipelineError> {
        let PipelineRunner {
            config,
            pool,
            reader,
            writer,
            predicates,
            mutators,
        } = self;

        let wall_start = Instant::now();
        let cancellation = Cancellation::new();
        let channel_capacity = config.max_in_flight;

        let (input_tx, input_rx) = crossbeam_channel::bounded(channel_capacity);
        let (output_tx, output_rx) = crossbeam_channel::bounded(channel_capacity);
        let (collector_tx, collector_rx) = crossbeam_channel::bounded(1);

        let shrink_handle = spawn_shrink_task(&config, &pool, &cancellation);

        let pool_for_input = pool.clone();
        let input_cancellation = cancellation.clone();
        let input_handle: JoinHandle<()> = thread::Builder::new()
            .name("fastq-input".to_string())
            .spawn(move || {
                input::run_input_stage(reader, pool_for_input, input_tx, input_cancellation);
            })
            .map_err(|err| {
                PipelineError::processor_failure(
                    crate::error::ProcessorFailureKind::Structural,
                    format!("failed to spawn input stage: {err}"),
                )
            })?;

        let predicates = Arc::new(predicates);
        let mutators = Arc::new(mutators);
        let worker_handles = processing::spawn_workers(
            config.thread_count,
            predicates,
            mutators,
            input_rx,
            output_tx,
            cancellation.flag_handle(),
        )
        .map_err(|err| {
            PipelineError::processor_failure(
                crate::error::ProcessorFailureKind::Structural,
                format!("failed to spawn processing worker: {err}"),
            )
        })?;

        let pool_for_output = pool.clone();
        let output_cancellation = cancellation.clone();
        let output_handle: JoinHandle<()> = thread::Builder::new()
            .name("fastq-output".to_string())
            .spawn(move || {
                let collector = output::run_output_stage(
                    writer,
                    pool_for_output,
                    output_rx,
                    output_cancellation,
                );
                let _ = collector_tx.send(collector);
            })
            .map_err(|err| {
                PipelineError::processor_failure(
                    crate::error::ProcessorFailureKind::Structural,
                    format!("failed to spawn output stage: {err}"),
                )
            })?;

        input_handle
            .join()
            .expect("input stage thread panicked without producing a PipelineError");
        for handle in worker_handles {
            handle
                .join()
                .expect("processing worker thread panicked without producing a PipelineError");
        }
        output_handle
            .join()
            .expect("output stage thread panicked without producing a PipelineError");

        // Stop the shrink task (if any) now that every producing/consuming
        // stage has finished; it polls the flag at short intervals so this
        // join returns promptly.
        cancellation.cancel();
        if let Some(handle) = shrink_handle {
            let _ = handle.join();
        }

        let collector = collector_rx
            .recv()
            .expect("output stage always sends its collector before exiting");
        let wall_time = wall_start.elapsed();
        let pool_stats = pool.stats();

        if pool.active_count() != 0 {
            event!(
                Level::WARN,
                active = pool.active_count(),
                "batches still active at pipeline end"
            );
        }

        if let Some(err) = cancellation.take_failure() {
            return Err(err);
        }

        Ok(collector.finish(wall_time, pool_stats))
    }
}

/// Spawns the background task that periodically trims the pool's free list
/// back to `pool_initial_size`, if enabled. Polls cancellation in short
/// ticks so shutdown doesn't wait out a long `shrink_interval`.
fn spawn_shrink_task(
    config: &ResolvedConfig,
    pool: &Arc<BatchPool>,
    cancellation: &Cancellation,
) -> Option<JoinHandle<()>> {
    if !config.enable_pool_shrink {
        return None;
    }

    let pool = pool.clone();
    let floor = config.pool_initial_size;
    let interval = config.shrink_interval;
    let tick = Duration::from_millis(100).min(interval.max(Duration::from_millis(1)));
    let cancellation = cancellation.clone();

    let handle = thread::Builder::new()
        .name("fastq-pool-shrink".to_string())
        .spawn(move || {
            let mut since_last_shrink = Duration::ZERO;
            while !cancellation.is_cancelled() {
                thread::sleep(tick);
                since_last_shrink += tick;
                if since_last_shrink >= interval {
                    pool.shrink_to(floor);
                    since_last_shrink = Duration::ZERO;
                }
            }
        })
        .expect("failed to spawn pool shrink task");
    Some(handle)
}
