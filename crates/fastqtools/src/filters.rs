//! Built-in predicates and mutators the CLI subcommands assemble into a
//! chain before handing it to `fastq_core::PipelineRunner`.

use clap::ValueEnum;
use fastq_core::pipeline::{Mutator, Predicate};
use fastq_core::record::{find_invalid_base, MutationOutcome, Record};

/// Keeps a record only if its mean Phred quality is at least
/// `min_mean_quality`. Empty quality strings never pass.
pub struct MinAverageQuality {
    pub min_mean_quality: f64,
    pub phred_offset: u8,
}

impl Predicate for MinAverageQuality {
    fn evaluate(&self, record: &Record) -> bool {
        let quality = record.quality();
        if quality.is_empty() {
            return false;
        }
        let sum: u64 = quality
            .iter()
            .map(|&q| q.saturating_sub(self.phred_offset) as u64)
            .sum();
        (sum as f64 / quality.len() as f64) >= self.min_mean_quality
    }
}

/// Rejects any record whose sequence contains a byte outside the
/// `{A,C,G,T,N}` alphabet (case-insensitive).
pub struct AlphabetValidator;

impl Predicate for AlphabetValidator {
    fn evaluate(&self, record: &Record) -> bool {
        find_invalid_base(record.sequence()).is_none()
    }
}

/// Which end of the sequence/quality a [`FixedLengthTrim`] cuts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrimSide {
    /// Drops bases off the front, keeping the last `length` bases.
    Left,
    /// Drops bases off the back, keeping the first `length` bases.
    Right,
}

/// Trims sequence and quality to `length` bases from `side`; a no-op on
/// records already at or under that length.
pub struct FixedLengthTrim {
    pub length: usize,
    pub side: TrimSide,
}

impl Mutator for FixedLengthTrim {
    fn apply(&self, record: &mut Record) -> MutationOutcome {
        if record.sequence().len() <= self.length {
            return MutationOutcome::Unchanged;
        }
        let owned = record.as_owned_mut();
        match self.side {
            TrimSide::Right => {
                owned.sequence.truncate(self.length);
                owned.quality.truncate(self.length);
            }
            TrimSide::Left => {
                let cut = owned.sequence.len() - self.length;
                owned.sequence.drain(0..cut);
                owned.quality.drain(0..cut);
            }
        }
        MutationOutcome::Modified
    }
}

fn complement(base: u8) -> Option<u8> {
    Some(match base {
        b'A' => b'T',
        b'a' => b't',
        b'T' => b'A',
        b't' => b'a',
        b'C' => b'G',
        b'c' => b'g',
        b'G' => b'C',
        b'g' => b'c',
        b'N' => b'N',
        b'n' => b'n',
        _ => return None,
    })
}

/// Reverse-complements sequence (and reverses quality to match). A base
/// outside the valid alphabet fails the record rather than passing it
/// through unreversed.
pub struct ReverseComplement;

impl Mutator for ReverseComplement {
    fn apply(&self, record: &mut Record) -> MutationOutcome {
        let owned = record.as_owned_mut();
        let mut complemented = Vec::with_capacity(owned.sequence.len());
        for &base in owned.sequence.iter().rev() {
            match complement(base) {
                Some(c) => complemented.push(c),
                None => {
                    return MutationOutcome::Failed(format!(
                        "non-alphabet base {:?} cannot be reverse-complemented",
                        base as char
                    ))
                }
            }
        }
        owned.quality.reverse();
        owned.sequence = complemented;
        MutationOutcome::Modified
    }
}
