//! Progress reporting, in the style of the core library's
//! `pbar.rs::prepare_pbar`: a spinner plus bar when the total record count
//! is known, a bare spinner with a running count otherwise. Purely a CLI UX
//! layer behind `--progress`; `fastq-core` has no notion of this.

use std::fmt::Write as _;
use std::sync::Arc;

use fastq_core::batch::Batch;
use fastq_core::error::WriteError;
use fastq_core::io::RecordWriter;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};

pub fn build_progress_bar(total_records: Option<u64>) -> ProgressBar {
    let pb = ProgressBar::new(total_records.unwrap_or(0));
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(8));

    let template = if total_records.is_some() {
        "{spinner:.green} [{elapsed_precise}] {msg} [{bar:.cyan/blue}] {pos}/{len} ({eta}, {per_sec})"
    } else {
        "{spinner:.green} [{elapsed_precise}] {msg} {pos} records ({per_sec})"
    };

    pb.set_style(
        ProgressStyle::with_template(template)
            .expect("static progress template is valid")
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            ),
    );
    pb
}

/// Wraps a `RecordWriter`, incrementing a progress bar by each batch's
/// record count as it's written. Errors pass straight through untouched.
pub struct ProgressReportingWriter<W> {
    inner: W,
    bar: Arc<ProgressBar>,
}

impl<W> ProgressReportingWriter<W> {
    pub fn new(inner: W, bar: Arc<ProgressBar>) -> Self {
        Self { inner, bar }
    }
}

impl<W: RecordWriter> RecordWriter for ProgressReportingWriter<W> {
    fn write_batch(&mut self, batch: &Batch) -> Result<(), WriteError> {
        self.inner.write_batch(batch)?;
        self.bar.inc(batch.len() as u64);
        Ok(())
    }
}
