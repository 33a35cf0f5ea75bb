use thiserror::Error;

/// Distinguishes a per-record processing failure from one that breaks the
/// processing stage itself. Only `Structural` failures ever reach
/// [`PipelineError::ProcessorFailure`] — a `PerRecord` failure (a panicking
/// predicate/mutator, or a `Mutator::apply` returning `Failed`) is isolated
/// by `process_one_record`, folded into [`crate::batch::BatchStats::errored`]
/// and logged, never propagated as a `PipelineError`. The variant still
/// distinguishes the two so a call site that does receive a
/// `ProcessorFailure` never has to guess which policy applies: it is always
/// `Structural`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorFailureKind {
    PerRecord,
    Structural,
}

/// The taxonomy of failures the pipeline can raise.
///
/// Per-record processor failures never appear here: they are folded into
/// [`crate::batch::BatchStats::errored`] and logged, not propagated.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    ConfigInvalid(String),

    #[error("read failure: {0}")]
    ReadFailure(#[from] ReadError),

    #[error("write failure: {0}")]
    WriteFailure(#[from] WriteError),

    #[error("{kind:?} processor failure: {message}")]
    ProcessorFailure {
        kind: ProcessorFailureKind,
        message: String,
    },

    #[error("pipeline cancelled: {0}")]
    Cancelled(String),
}

impl PipelineError {
    /// Constructs a `ProcessorFailure` of the given kind. Production call
    /// sites only ever construct `Structural` failures; `PerRecord` exists
    /// so the taxonomy can't silently drift if a future call site tries to
    /// propagate a per-record failure through this path.
    pub fn processor_failure(kind: ProcessorFailureKind, message: impl Into<String>) -> Self {
        PipelineError::ProcessorFailure {
            kind,
            message: message.into(),
        }
    }
}

/// Raised by a [`crate::io::RecordReader`] on I/O or format failure.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record: {0}")]
    Format(String),
}

/// Raised by a [`crate::io::RecordWriter`] on I/O failure.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
