use crate::batch::Batch;
use crate::error::{ReadError, WriteError};

/// Result of one `read_into` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// At least one record was read into the batch.
    FilledAtLeastOne,
    /// The underlying stream is exhausted; no records were read.
    Eof,
}

/// Consumed by `InputStage`. Implementors fill up to the batch's capacity
/// and return; they must not block indefinitely if the stream is still
/// open, though blocking on I/O itself is expected.
pub trait RecordReader: Send {
    fn read_into(&mut self, batch: &mut Batch) -> Result<ReadOutcome, ReadError>;
}

/// Consumed by `OutputStage`. Implementors write all surviving records of
/// the batch in the batch's current order.
pub trait RecordWriter: Send {
    fn write_batch(&mut self, batch: &Batch) -> Result<(), WriteError>;
}
