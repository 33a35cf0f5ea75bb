use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};

use criterion::{criterion_group, criterion_main, Criterion};
use fastq_core::batch::Batch;
use fastq_core::error::{ReadError, WriteError};
use fastq_core::io::{ReadOutcome, RecordReader, RecordWriter};
use fastq_core::pipeline::{Mutator, PipelineConfig, PipelineRunner, Predicate};
use fastq_core::record::{MutationOutcome, Record};

const TOTAL_RECORDS: usize = 200_000;
const SEQ_LEN: usize = 150;

/// Reader that synthesizes `TOTAL_RECORDS` identical records rather than
/// parsing anything, so the benchmark measures pipeline overhead and not
/// disk I/O.
struct SyntheticReader {
    emitted: usize,
}

impl RecordReader for SyntheticReader {
    fn read_into(&mut self, batch: &mut Batch) -> Result<ReadOutcome, ReadError> {
        let remaining = TOTAL_RECORDS.saturating_sub(self.emitted);
        if remaining == 0 {
            return Ok(ReadOutcome::Eof);
        }

        let to_fill = remaining.min(batch.capacity());
        // All bytes are appended to the backing buffer before any
        // `push_borrowed` call: once a record holds a clone of the buffer's
        // Arc, `raw_buffer_mut` can no longer get exclusive access to it.
        let record_len = b"@bench_record".len() + SEQ_LEN + SEQ_LEN;
        let base = batch.raw_buffer_mut().len();
        {
            let buf = batch.raw_buffer_mut();
            buf.reserve(to_fill * record_len);
            for _ in 0..to_fill {
                buf.extend_from_slice(b"@bench_record");
                buf.extend_from_slice(&[b'A'; SEQ_LEN]);
                buf.extend_from_slice(&[b'I'; SEQ_LEN]);
            }
        }
        for i in 0..to_fill {
            let name_start = base + i * record_len;
            let name_end = name_start + b"@bench_record".len();
            let seq_end = name_end + SEQ_LEN;
            let qual_end = seq_end + SEQ_LEN;
            batch.push_borrowed(name_start..name_end, name_end..seq_end, seq_end..qual_end, None);
        }
        self.emitted += to_fill;
        Ok(ReadOutcome::FilledAtLeastOne)
    }
}

struct DiscardWriter {
    written: AtomicUsize,
}

impl RecordWriter for DiscardWriter {
    fn write_batch(&mut self, batch: &Batch) -> Result<(), WriteError> {
        self.written.fetch_add(batch.len(), Ordering::Relaxed);
        black_box(batch.len());
        Ok(())
    }
}

struct MinAverageQuality {
    threshold: f64,
}

impl Predicate for MinAverageQuality {
    fn evaluate(&self, record: &Record) -> bool {
        let quality = record.quality();
        if quality.is_empty() {
            return false;
        }
        let sum: u64 = quality.iter().map(|&q| (q - 33) as u64).sum();
        (sum as f64 / quality.len() as f64) >= self.threshold
    }
}

struct UppercaseMutator;

impl Mutator for UppercaseMutator {
    fn apply(&self, record: &mut Record) -> MutationOutcome {
        let owned = record.as_owned_mut();
        owned.sequence.make_ascii_uppercase();
        MutationOutcome::Modified
    }
}

fn run_pipeline(batch_size: usize, thread_count: usize) {
    let config = PipelineConfig {
        batch_size,
        thread_count,
        enable_pool_shrink: false,
        ..Default::default()
    };
    let reader = Box::new(SyntheticReader { emitted: 0 });
    let writer = Box::new(DiscardWriter {
        written: AtomicUsize::new(0),
    });
    let predicates: Vec<std::sync::Arc<dyn Predicate>> =
        vec![std::sync::Arc::new(MinAverageQuality { threshold: 20.0 })];
    let mutators: Vec<std::sync::Arc<dyn Mutator>> = vec![std::sync::Arc::new(UppercaseMutator)];

    let runner = PipelineRunner::new(config, reader, writer, predicates, mutators).unwrap();
    let stats = runner.run().unwrap();
    black_box(stats);
}

fn bench_single_thread(c: &mut Criterion) {
    c.bench_function("pipeline_single_thread_10k_batch", |b| {
        b.iter(|| run_pipeline(10_000, 1))
    });
}

fn bench_four_threads(c: &mut Criterion) {
    c.bench_function("pipeline_four_threads_10k_batch", |b| {
        b.iter(|| run_pipeline(10_000, 4))
    });
}

fn bench_small_batches(c: &mut Criterion) {
    c.bench_function("pipeline_four_threads_1k_batch", |b| {
        b.iter(|| run_pipeline(1_000, 4))
    });
}

criterion_group!(
    benches,
    bench_single_thread,
    bench_four_threads,
    bench_small_batches
);
criterion_main!(benches);
