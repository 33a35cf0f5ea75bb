//! Phred quality-encoding inference: a pure heuristic over a sample of raw
//! quality bytes, run once before the pipeline's record reader is built.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};

use crate::fastq_io::InputSource;

/// Phred+64's lowest possible quality byte is `@` (ASCII 64, quality 0); any
/// byte strictly below that can only come from Phred+33. Absent such a byte
/// in the sample, Phred+64 is assumed — the encoding modern FASTQ producers
/// essentially never use, but the conservative guess when none of the
/// sampled bytes are conclusive.
const PHRED64_MIN_BYTE: u8 = 64;

pub fn infer_phred_offset(path: &Path, sample_records: usize) -> Result<u8> {
    let mut reader =
        InputSource::open(path).with_context(|| format!("opening {} to sniff quality encoding", path.display()))?;
    let mut min_byte = u8::MAX;
    let mut line = Vec::new();
    let mut records_seen = 0usize;

    while records_seen < sample_records {
        let mut saw_header = false;
        for _ in 0..4 {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                if saw_header {
                    anyhow::bail!("unexpected end of file while sampling quality lines");
                }
                return Ok(resolve_offset(min_byte));
            }
            saw_header = true;
        }
        while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
            line.pop();
        }
        if let Some(&b) = line.iter().min() {
            min_byte = min_byte.min(b);
        }
        records_seen += 1;
    }

    Ok(resolve_offset(min_byte))
}

fn resolve_offset(min_byte: u8) -> u8 {
    if min_byte < PHRED64_MIN_BYTE {
        33
    } else {
        64
    }
}
