//! Core, I/O-agnostic machinery for batched FASTQ processing: record
//! representation, the recyclable batch pool, the three-stage pipeline
//! (`InputStage` / `ProcessingStage` / `OutputStage`), and the aggregate
//! stats the pipeline reports back.
//!
//! Binaries (such as `fastqtools`) bring their own [`io::RecordReader`] and
//! [`io::RecordWriter`] implementations plus [`pipeline::Predicate`]/
//! [`pipeline::Mutator`] chains; this crate has no opinion on file formats or
//! CLI surfaces.

pub mod batch;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod record;
pub mod stats;

pub use batch::{Batch, BatchPool, BatchStats, PoolStats};
pub use error::{PipelineError, PipelineResult, ReadError, WriteError};
pub use io::{ReadOutcome, RecordReader, RecordWriter};
pub use pipeline::{Mutator, PipelineConfig, PipelineRunner, Predicate};
pub use record::{MutationOutcome, Record};
pub use stats::{PipelineStats, StatsCollector};

pub use tracing;
