use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use tracing::{event, Level};

use crate::batch::{Batch, BatchPool, BatchStats};
use crate::error::PipelineError;
use crate::io::RecordWriter;
use crate::pipeline::Cancellation;
use crate::stats::StatsCollector;

/// Runs the serial `OutputStage` loop: receive `(Batch, BatchStats)` pairs
/// (possibly out of order), write them via `writer` strictly in ascending
/// `seq_no`, fold stats into the aggregate, release batches to `pool`.
///
/// Batches ahead of the next expected `seq_no` are parked in a small
/// `BTreeMap` reorder buffer until their turn comes; the buffer never grows
/// past `max_in_flight` batches because the runner's backpressure bound
/// guarantees it.
pub fn run_output_stage(
    mut writer: Box<dyn RecordWriter>,
    pool: Arc<BatchPool>,
    input_rx: Receiver<(Batch, BatchStats)>,
    cancellation: Cancellation,
) -> StatsCollector {
    let mut collector = StatsCollector::new();
    let mut reorder_buffer: BTreeMap<u64, (Batch, BatchStats)> = BTreeMap::new();
    let mut expected_next: u64 = 0;

    'recv: while let Ok((batch, stats)) = input_rx.recv() {
        let seq_no = batch
            .seq_no()
            .expect("batches leaving ProcessingStage always carry a seq_no");
        reorder_buffer.insert(seq_no, (batch, stats));

        while let Some((batch, stats)) = reorder_buffer.remove(&expected_next) {
            if cancellation.is_cancelled() {
                // Past a cancellation point, abandon rather than write:
                // release this and everything still parked, then stop.
                pool.release(batch);
                break 'recv;
            }

            let started = Instant::now();
            let write_result = writer.write_batch(&batch);
            let output_time = started.elapsed();

            match write_result {
                Ok(()) => {
                    let mut stats = stats;
                    stats.output_time = output_time;
                    collector.fold(&stats);
                    pool.release(batch);
                    expected_next += 1;
                }
                Err(err) => {
                    event!(Level::ERROR, error = %err, seq_no, "output stage write failure");
                    pool.release(batch);
                    cancellation.report_failure(PipelineError::WriteFailure(err));
                    break 'recv;
                }
            }
        }
    }

    // Cancellation (from this stage or another): drain whatever is left in
    // the reorder buffer back to the pool without writing it.
    for (_, (batch, _)) in reorder_buffer.into_iter() {
        pool.release(batch);
    }

    collector
}
