use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::record::Record;

/// A fixed-capacity container of [`Record`]s moving through the pipeline as
/// one unit, plus the shared byte buffer its borrowed records index into.
pub struct Batch {
    records: Vec<Record>,
    backing_storage: Arc<Vec<u8>>,
    seq_no: Option<u64>,
    capacity: usize,
    input_elapsed: Duration,
}

impl Batch {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            backing_storage: Arc::new(Vec::new()),
            seq_no: None,
            capacity,
            input_elapsed: Duration::ZERO,
        }
    }

    /// Wall time `InputStage` spent filling this batch, carried forward into
    /// its `BatchStats` once `ProcessingStage` picks it up.
    pub fn input_elapsed(&self) -> Duration {
        self.input_elapsed
    }

    pub fn set_input_elapsed(&mut self, elapsed: Duration) {
        self.input_elapsed = elapsed;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn seq_no(&self) -> Option<u64> {
        self.seq_no
    }

    pub fn set_seq_no(&mut self, seq_no: u64) {
        self.seq_no = Some(seq_no);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Exclusive access to the record vector, used by `ProcessingStage` to
    /// compact survivors in place and by `InputStage` to append freshly
    /// parsed records.
    pub fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.records
    }

    /// Mutable access to the batch's shared backing buffer. Only valid while
    /// no record has yet cloned a handle to it — i.e. while the batch is
    /// being filled by `InputStage`, before any `push_borrowed` call.
    /// Panics if a clone already escaped, which would indicate a bug in the
    /// reader (mutating bytes live records already point at).
    pub fn raw_buffer_mut(&mut self) -> &mut Vec<u8> {
        Arc::get_mut(&mut self.backing_storage)
            .expect("backing storage must be exclusively owned while filling a batch")
    }

    /// Appends a borrowed record whose byte ranges point into the current
    /// backing buffer.
    pub fn push_borrowed(
        &mut self,
        name: std::ops::Range<usize>,
        sequence: std::ops::Range<usize>,
        quality: std::ops::Range<usize>,
        separator: Option<std::ops::Range<usize>>,
    ) {
        let storage = self.backing_storage.clone();
        self.records.push(Record::Borrowed(crate::record::BorrowedRecord::new(
            storage, name, sequence, quality, separator,
        )));
    }

    /// Resets the batch to pool-fresh state: empty record vector, sentinel
    /// `seq_no`, backing buffer cleared but its allocation retained.
    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.seq_no = None;
        self.input_elapsed = Duration::ZERO;
        match Arc::get_mut(&mut self.backing_storage) {
            Some(buf) => buf.clear(),
            None => {
                // A record escaped the batch (shouldn't happen in normal
                // operation); fall back to a fresh buffer rather than panic.
                self.backing_storage = Arc::new(Vec::new());
            }
        }
    }

    /// Sum of sequence + quality bytes currently held, used for throughput
    /// accounting (observed bytes, not an assumed read length).
    pub fn observed_bytes(&self) -> u64 {
        self.records
            .iter()
            .map(|r| (r.sequence().len() + r.quality().len()) as u64)
            .sum()
    }
}

/// Per-batch accumulator folded into the pipeline's aggregate stats.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchStats {
    pub total: u64,
    pub passed: u64,
    pub filtered: u64,
    pub modified: u64,
    pub errored: u64,
    pub observed_bytes: u64,
    pub input_time: Duration,
    pub processing_time: Duration,
    pub output_time: Duration,
}

impl BatchStats {
    pub fn merge(&mut self, other: &BatchStats) {
        self.total += other.total;
        self.passed += other.passed;
        self.filtered += other.filtered;
        self.modified += other.modified;
        self.errored += other.errored;
        self.observed_bytes += other.observed_bytes;
        self.input_time += other.input_time;
        self.processing_time += other.processing_time;
        self.output_time += other.output_time;
    }
}

/// Snapshot of [`BatchPool`] counters, per the core's `stats()` contract.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub pool_size: usize,
    pub active_count: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

struct PoolInner {
    free: VecDeque<Batch>,
}

/// Recyclable allocator for fixed-capacity batch buffers, bounded by
/// `max_pool_size`. `acquire`/`release` are safe under concurrent calls from
/// different stages: a mutex around a FIFO plus a condvar for the
/// backpressure wait, matching the synchronization idiom the teacher uses
/// for its shared control-tower state.
pub struct BatchPool {
    inner: Mutex<PoolInner>,
    not_empty: Condvar,
    batch_size: usize,
    max_pool_size: usize,
    max_in_flight: usize,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    active_count: AtomicU64,
    total_ever_allocated: AtomicU64,
}

impl BatchPool {
    pub fn new(
        batch_size: usize,
        initial_size: usize,
        max_pool_size: usize,
        max_in_flight: usize,
    ) -> Self {
        let mut free = VecDeque::with_capacity(initial_size);
        for _ in 0..initial_size {
            free.push_back(Batch::new(batch_size));
        }

        Self {
            inner: Mutex::new(PoolInner { free }),
            not_empty: Condvar::new(),
            batch_size,
            max_pool_size,
            max_in_flight,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            active_count: AtomicU64::new(0),
            total_ever_allocated: AtomicU64::new(initial_size as u64),
        }
    }

    /// Returns an empty batch. Blocks if the pool is empty and the in-flight
    /// count has reached `max_in_flight`; otherwise allocates fresh
    /// (incrementing the miss counter) or serves from the free list
    /// (incrementing the hit counter).
    pub fn acquire(&self) -> Batch {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(batch) = guard.free.pop_front() {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                self.active_count.fetch_add(1, Ordering::Relaxed);
                return batch;
            }

            if self.active_count.load(Ordering::Relaxed) < self.max_in_flight as u64 {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                self.active_count.fetch_add(1, Ordering::Relaxed);
                self.total_ever_allocated.fetch_add(1, Ordering::Relaxed);
                return Batch::new(self.batch_size);
            }

            guard = self
                .not_empty
                .wait(guard)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Clears `batch` and returns it to the free list, unless the pool is
    /// already at `max_pool_size`, in which case it is deallocated.
    pub fn release(&self, mut batch: Batch) {
        batch.clear();
        self.active_count.fetch_sub(1, Ordering::Relaxed);

        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if guard.free.len() < self.max_pool_size {
            guard.free.push_back(batch);
        }
        drop(guard);
        self.not_empty.notify_one();
    }

    pub fn stats(&self) -> PoolStats {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        PoolStats {
            pool_size: guard.free.len(),
            active_count: self.active_count.load(Ordering::Relaxed),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Trims the free list down to `floor`, never touching batches marked
    /// active. Intended for the optional background shrink task.
    pub fn shrink_to(&self, floor: usize) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        while guard.free.len() > floor {
            guard.free.pop_back();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_reuses_released_batches_as_hits() {
        let pool = BatchPool::new(4, 1, 10, 4);
        let b = pool.acquire();
        assert_eq!(pool.stats().hit_count, 1);
        pool.release(b);
        let stats = pool.stats();
        assert_eq!(stats.pool_size, 1);
        assert_eq!(stats.active_count, 0);

        let _b2 = pool.acquire();
        let stats = pool.stats();
        assert_eq!(stats.hit_count, 2);
        assert_eq!(stats.miss_count, 0);
    }

    #[test]
    fn acquire_beyond_initial_size_is_a_miss() {
        let pool = BatchPool::new(4, 0, 10, 4);
        let _b = pool.acquire();
        assert_eq!(pool.stats().miss_count, 1);
    }

    #[test]
    fn release_past_max_pool_size_drops_batch() {
        let pool = BatchPool::new(4, 0, 1, 4);
        let b1 = pool.acquire();
        let b2 = pool.acquire();
        pool.release(b1);
        pool.release(b2);
        assert_eq!(pool.stats().pool_size, 1);
    }

    #[test]
    fn clear_resets_seq_no_and_len_but_keeps_capacity() {
        let mut batch = Batch::new(4);
        batch.set_seq_no(3);
        batch.raw_buffer_mut().extend_from_slice(b"ACGT");
        batch.push_borrowed(0..1, 1..2, 2..3, None);
        assert_eq!(batch.len(), 1);

        batch.clear();
        assert_eq!(batch.seq_no(), None);
        assert_eq!(batch.len(), 0);
        assert!(batch.is_empty());
    }

    #[test]
    fn shrink_never_drops_below_floor_and_ignores_active() {
        let pool = BatchPool::new(4, 5, 10, 10);
        let active = pool.acquire();
        pool.shrink_to(1);
        assert_eq!(pool.stats().pool_size, 1);
        assert_eq!(pool.active_count(), 1);
        pool.release(active);
    }

    /// Concurrent acquire/release across many threads never lets
    /// `active_count` exceed `max_in_flight`, and every batch makes it back
    /// to the pool: `active_count() == 0` once all threads join.
    #[test]
    fn concurrent_acquire_never_exceeds_max_in_flight() {
        use std::sync::atomic::AtomicU64;

        let max_in_flight = 4;
        let pool = Arc::new(BatchPool::new(8, 2, 8, max_in_flight));
        let peak = Arc::new(AtomicU64::new(0));

        std::thread::scope(|scope| {
            for _ in 0..16 {
                let pool = pool.clone();
                let peak = peak.clone();
                scope.spawn(move || {
                    for _ in 0..50 {
                        let batch = pool.acquire();
                        let active = pool.active_count();
                        peak.fetch_max(active, Ordering::SeqCst);
                        assert!(active <= max_in_flight as u64);
                        pool.release(batch);
                    }
                });
            }
        });

        assert_eq!(pool.active_count(), 0);
        assert!(peak.load(Ordering::SeqCst) <= max_in_flight as u64);
    }
}
