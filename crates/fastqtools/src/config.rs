//! CLI-facing pipeline tunables, converted into `fastq_core::PipelineConfig`
//! right before a `PipelineRunner` is constructed. Actual bounds-checking
//! (`batch_size >= 1`, etc.) happens inside `PipelineRunner::new`, which
//! surfaces `PipelineError::ConfigInvalid` before any stage thread starts.

use std::time::Duration;

use clap::Args;
use fastq_core::PipelineConfig;

#[derive(Args, Debug, Clone)]
pub struct PipelineConfigArgs {
    /// Records per batch moving through the pipeline.
    #[arg(long, default_value_t = 10_000)]
    pub batch_size: usize,

    /// Processing worker threads. 0 uses all available cores.
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Caps batches simultaneously in flight. Defaults to
    /// `max(4, threads * 2)` when unset.
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Batches preallocated when the pipeline starts.
    #[arg(long, default_value_t = 10)]
    pub pool_initial_size: usize,

    /// Upper bound on the batch pool's free list.
    #[arg(long, default_value_t = 1_000)]
    pub pool_max_size: usize,

    /// Disable the periodic background pass that trims the pool's free list
    /// back down to `pool_initial_size`.
    #[arg(long = "no-pool-shrink", action = clap::ArgAction::SetFalse)]
    pub pool_shrink: bool,

    /// Seconds between background pool-shrink passes.
    #[arg(long, default_value_t = 30)]
    pub shrink_interval_secs: u64,
}

impl PipelineConfigArgs {
    pub fn into_pipeline_config(self) -> PipelineConfig {
        PipelineConfig {
            batch_size: self.batch_size,
            thread_count: self.threads,
            max_in_flight: self.max_in_flight,
            pool_initial_size: self.pool_initial_size,
            pool_max_size: self.pool_max_size,
            enable_pool_shrink: self.pool_shrink,
            shrink_interval: Duration::from_secs(self.shrink_interval_secs),
        }
    }
}
