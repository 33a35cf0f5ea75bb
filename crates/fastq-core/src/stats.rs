use std::time::Duration;

use crate::batch::{BatchStats, PoolStats};

/// Monotonically accumulated counters, updated only by `OutputStage`'s
/// single thread — no synchronization is needed beyond the per-batch
/// `BatchStats` handed to it alongside each written batch.
#[derive(Debug, Default)]
pub struct StatsCollector {
    total: u64,
    passed: u64,
    filtered: u64,
    modified: u64,
    errored: u64,
    observed_bytes: u64,
    input_time: Duration,
    processing_time: Duration,
    output_time: Duration,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, stats: &BatchStats) {
        self.total += stats.total;
        self.passed += stats.passed;
        self.filtered += stats.filtered;
        self.modified += stats.modified;
        self.errored += stats.errored;
        self.observed_bytes += stats.observed_bytes;
        self.input_time += stats.input_time;
        self.processing_time += stats.processing_time;
        self.output_time += stats.output_time;
    }

    /// Finalizes the run into the caller-facing [`PipelineStats`], deriving
    /// throughput from wall time and the pool's hit/miss counters from
    /// `pool_stats`.
    pub fn finish(self, wall_time: Duration, pool_stats: PoolStats) -> PipelineStats {
        let wall_secs = wall_time.as_secs_f64();
        let throughput_records_per_second = if wall_secs > 0.0 {
            self.total as f64 / wall_secs
        } else {
            0.0
        };
        let throughput_megabytes_per_second = if wall_secs > 0.0 {
            (self.observed_bytes as f64 / (1024.0 * 1024.0)) / wall_secs
        } else {
            0.0
        };
        let denom = pool_stats.hit_count + pool_stats.miss_count;
        let pool_hit_rate = if denom > 0 {
            pool_stats.hit_count as f64 / denom as f64
        } else {
            0.0
        };

        PipelineStats {
            total_records: self.total,
            passed_records: self.passed,
            filtered_records: self.filtered,
            modified_records: self.modified,
            errored_records: self.errored,
            input_time: self.input_time,
            processing_time: self.processing_time,
            output_time: self.output_time,
            wall_time,
            throughput_records_per_second,
            throughput_megabytes_per_second,
            pool_hit_rate,
        }
    }
}

/// Final aggregate statistics — the contract callers of `PipelineRunner::run`
/// observe.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    pub total_records: u64,
    pub passed_records: u64,
    pub filtered_records: u64,
    pub modified_records: u64,
    pub errored_records: u64,
    pub input_time: Duration,
    pub processing_time: Duration,
    pub output_time: Duration,
    pub wall_time: Duration,
    pub throughput_records_per_second: f64,
    pub throughput_megabytes_per_second: f64,
    pub pool_hit_rate: f64,
}
