use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use tracing::{event, Level};

use crate::batch::{Batch, BatchStats};
use crate::record::{MutationOutcome, Record};

/// A pure `Record -> bool` test. Predicates are chained with short-circuit
/// AND: the first `false` marks a record filtered.
///
/// Required: safely invocable from multiple threads concurrently, and must
/// not mutate external state observable by other predicates or mutators —
/// `ProcessingStage` runs one worker thread per in-flight batch and shares
/// the same predicate chain across all of them.
pub trait Predicate: Send + Sync {
    fn evaluate(&self, record: &Record) -> bool;
}

/// A `&mut Record -> MutationOutcome` transformer. Mutators run in
/// declaration order; a `Failed` outcome marks the record errored and skips
/// any remaining mutators for that record.
///
/// Required: safely invocable from multiple threads concurrently.
pub trait Mutator: Send + Sync {
    fn apply(&self, record: &mut Record) -> MutationOutcome;
}

enum RecordOutcome {
    Filtered,
    Errored(String),
    Survived { modified: bool },
}

fn process_one_record(
    record: &mut Record,
    predicates: &[Arc<dyn Predicate>],
    mutators: &[Arc<dyn Mutator>],
) -> RecordOutcome {
    for predicate in predicates {
        let evaluated = catch_unwind(AssertUnwindSafe(|| predicate.evaluate(record)));
        match evaluated {
            Ok(true) => continue,
            Ok(false) => return RecordOutcome::Filtered,
            Err(_) => return RecordOutcome::Errored("predicate panicked".to_string()),
        }
    }

    let mut modified = false;
    for mutator in mutators {
        let outcome = catch_unwind(AssertUnwindSafe(|| mutator.apply(record)));
        match outcome {
            Ok(MutationOutcome::Unchanged) => {}
            Ok(MutationOutcome::Modified) => modified = true,
            Ok(MutationOutcome::Failed(reason)) => return RecordOutcome::Errored(reason),
            Err(_) => return RecordOutcome::Errored("mutator panicked".to_string()),
        }
    }

    RecordOutcome::Survived { modified }
}

/// Applies the predicate chain then the mutator chain to every record in
/// `batch`, compacting survivors in place (stable partition), and returns
/// the batch's stats. Per-record failures (predicate/mutator panic or
/// `Failed` outcome) are isolated: the record is marked errored and
/// processing continues with the rest of the batch.
pub fn process_batch(
    batch: &mut Batch,
    predicates: &[Arc<dyn Predicate>],
    mutators: &[Arc<dyn Mutator>],
) -> BatchStats {
    let started = Instant::now();
    let mut stats = BatchStats {
        observed_bytes: batch.observed_bytes(),
        input_time: batch.input_elapsed(),
        ..Default::default()
    };

    let records = batch.records_mut();
    let mut write = 0;
    for read in 0..records.len() {
        stats.total += 1;
        match process_one_record(&mut records[read], predicates, mutators) {
            RecordOutcome::Filtered => stats.filtered += 1,
            RecordOutcome::Errored(reason) => {
                stats.errored += 1;
                event!(Level::WARN, reason = %reason, record_index = read, "record errored");
            }
            RecordOutcome::Survived { modified } => {
                stats.passed += 1;
                if modified {
                    stats.modified += 1;
                }
                if write != read {
                    records.swap(write, read);
                }
                write += 1;
            }
        }
    }
    records.truncate(write);

    stats.processing_time = started.elapsed();
    stats
}

/// Spawns `thread_count` worker threads that each loop: receive a batch from
/// `input_rx`, process it, send `(Batch, BatchStats)` downstream on
/// `output_tx`. No ordering is imposed here — batches may complete out of
/// order; `OutputStage` restores ordering via `seq_no`.
pub fn spawn_workers(
    thread_count: usize,
    predicates: Arc<Vec<Arc<dyn Predicate>>>,
    mutators: Arc<Vec<Arc<dyn Mutator>>>,
    input_rx: Receiver<Batch>,
    output_tx: Sender<(Batch, BatchStats)>,
    cancelled: Arc<AtomicBool>,
) -> std::io::Result<Vec<std::thread::JoinHandle<()>>> {
    (0..thread_count)
        .map(|worker_id| {
            let predicates = predicates.clone();
            let mutators = mutators.clone();
            let input_rx = input_rx.clone();
            let output_tx = output_tx.clone();
            let cancelled = cancelled.clone();

            std::thread::Builder::new()
                .name(format!("fastq-processing-{worker_id}"))
                .spawn(move || {
                    while let Ok(mut batch) = input_rx.recv() {
                        let stats = process_batch(&mut batch, &predicates, &mutators);
                        if output_tx.send((batch, stats)).is_err() {
                            break;
                        }
                        if cancelled.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Batch;
    use std::sync::Arc;

    fn fill_batch(seqs: &[(&str, &str)]) -> Batch {
        let mut batch = Batch::new(seqs.len());
        // Every span is computed against the local buffer first; pushing a
        // borrowed record clones the batch's backing-storage Arc, after
        // which `raw_buffer_mut` can no longer get exclusive access to it.
        let mut spans = Vec::with_capacity(seqs.len());
        for (seq, qual) in seqs {
            let name_start = batch.raw_buffer_mut().len();
            batch.raw_buffer_mut().extend_from_slice(b"@r");
            let name_end = batch.raw_buffer_mut().len();
            batch.raw_buffer_mut().extend_from_slice(seq.as_bytes());
            let seq_end = batch.raw_buffer_mut().len();
            batch.raw_buffer_mut().extend_from_slice(qual.as_bytes());
            let qual_end = batch.raw_buffer_mut().len();
            spans.push((name_start..name_end, name_end..seq_end, seq_end..qual_end));
        }
        for (name, sequence, quality) in spans {
            batch.push_borrowed(name, sequence, quality, None);
        }
        batch
    }

    struct AlwaysFalse;
    impl Predicate for AlwaysFalse {
        fn evaluate(&self, _record: &Record) -> bool {
            false
        }
    }

    struct TrimFirstTwo;
    impl Mutator for TrimFirstTwo {
        fn apply(&self, record: &mut Record) -> MutationOutcome {
            let owned = record.as_owned_mut();
            if owned.sequence.len() < 2 {
                return MutationOutcome::Unchanged;
            }
            owned.sequence.drain(0..2);
            owned.quality.drain(0..2);
            MutationOutcome::Modified
        }
    }

    struct AlwaysFail;
    impl Mutator for AlwaysFail {
        fn apply(&self, _record: &mut Record) -> MutationOutcome {
            MutationOutcome::Failed("boom".to_string())
        }
    }

    #[test]
    fn pass_through_with_no_processors() {
        let mut batch = fill_batch(&[("ACGT", "!!!!"), ("TTTT", "IIII")]);
        let stats = process_batch(&mut batch, &[], &[]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.passed, 2);
        assert_eq!(stats.filtered, 0);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn always_false_predicate_filters_everything() {
        let mut batch = fill_batch(&[("ACGT", "!!!!"), ("TTTT", "IIII"), ("GGCC", "JJJJ")]);
        let predicates: Vec<Arc<dyn Predicate>> = vec![Arc::new(AlwaysFalse)];
        let stats = process_batch(&mut batch, &predicates, &[]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.passed, 0);
        assert_eq!(stats.filtered, 3);
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn trim_mutator_shrinks_sequence_and_marks_modified() {
        let mut batch = fill_batch(&[("ACGT", "!!!!")]);
        let mutators: Vec<Arc<dyn Mutator>> = vec![Arc::new(TrimFirstTwo)];
        let stats = process_batch(&mut batch, &[], &mutators);
        assert_eq!(stats.modified, 1);
        assert_eq!(stats.passed, 1);
        assert_eq!(batch.records()[0].sequence(), b"GT");
        assert_eq!(batch.records()[0].quality(), b"!!");
    }

    #[test]
    fn failing_mutator_marks_record_errored_not_fatal() {
        let mut batch = fill_batch(&[("ACGT", "!!!!"), ("TTTT", "IIII")]);
        let mutators: Vec<Arc<dyn Mutator>> = vec![Arc::new(AlwaysFail)];
        let stats = process_batch(&mut batch, &[], &mutators);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.errored, 2);
        assert_eq!(stats.passed, 0);
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn compaction_preserves_surviving_order() {
        let mut batch = fill_batch(&[("AAAA", "!!!!"), ("CCCC", "!!!!"), ("GGGG", "!!!!"), ("TTTT", "!!!!")]);
        struct FilterOddIndex(std::sync::atomic::AtomicUsize);
        impl Predicate for FilterOddIndex {
            fn evaluate(&self, _record: &Record) -> bool {
                let i = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                i % 2 == 0
            }
        }
        let predicates: Vec<Arc<dyn Predicate>> =
            vec![Arc::new(FilterOddIndex(std::sync::atomic::AtomicUsize::new(0)))];
        let stats = process_batch(&mut batch, &predicates, &[]);
        assert_eq!(stats.passed, 2);
        assert_eq!(batch.records()[0].sequence(), b"AAAA");
        assert_eq!(batch.records()[1].sequence(), b"GGGG");
    }
}
