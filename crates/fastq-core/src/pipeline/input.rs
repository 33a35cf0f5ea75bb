use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use tracing::{event, Level};

use crate::batch::{Batch, BatchPool};
use crate::error::PipelineError;
use crate::io::{ReadOutcome, RecordReader};
use crate::pipeline::Cancellation;

/// Runs the serial, single-threaded read loop described in the core's
/// `InputStage` contract: acquire a batch, fill it from `reader`, stamp a
/// monotonic `seq_no`, hand it to `ProcessingStage`. Reading stops at EOF or
/// at the first reader failure, which cancels the pipeline.
pub fn run_input_stage(
    mut reader: Box<dyn RecordReader>,
    pool: Arc<BatchPool>,
    output_tx: Sender<Batch>,
    cancellation: Cancellation,
) {
    let mut next_seq: u64 = 0;

    loop {
        if cancellation.is_cancelled() {
            break;
        }

        let mut batch = pool.acquire();
        let started = Instant::now();
        let outcome = reader.read_into(&mut batch);
        batch.set_input_elapsed(started.elapsed());

        match outcome {
            Ok(ReadOutcome::Eof) => {
                pool.release(batch);
                event!(Level::DEBUG, "input stage reached EOF");
                break;
            }
            Ok(ReadOutcome::FilledAtLeastOne) => {
                batch.set_seq_no(next_seq);
                next_seq += 1;
                if output_tx.send(batch).is_err() {
                    // Downstream has gone away; nothing more to do.
                    break;
                }
            }
            Err(err) => {
                pool.release(batch);
                event!(Level::ERROR, error = %err, "input stage read failure");
                cancellation.report_failure(PipelineError::ReadFailure(err));
                break;
            }
        }
    }

    // Dropping output_tx signals end-of-stream to every ProcessingStage
    // worker once the channel drains.
}
