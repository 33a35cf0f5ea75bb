//! Top-level argument parser. `fastqtools` dispatches to one of three
//! subcommands, mirroring `umi-checker`'s small-`main.rs`-plus-subcommand
//! shape but with `clap`'s derive `Subcommand` instead of a single flat
//! `Args` struct, since each subcommand's options genuinely differ.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::PipelineConfigArgs;
use crate::filters::TrimSide;

#[derive(Parser, Debug)]
#[command(author, version, about = "Batched FASTQ processing toolkit")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Default tracing directive when RUST_LOG is unset, e.g. "info" or
    /// "fastqtools=debug".
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Directory for a daily-rotating log file, in addition to stderr.
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Show a progress bar on stderr while running.
    #[arg(long, global = true, default_value_t = false)]
    pub progress: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Runs a predicate/mutator chain over one FASTQ file.
    Filter {
        /// Input FASTQ file, optionally gzip-compressed (.fq.gz/.fastq.gz).
        #[arg(short, long)]
        input: PathBuf,

        /// Output FASTQ file; gzip-compressed if the path ends in .gz.
        #[arg(short, long)]
        output: PathBuf,

        /// Minimum mean Phred quality required to keep a record.
        #[arg(long)]
        min_quality: Option<f64>,

        /// Reject records containing bases outside {A,C,G,T,N}.
        #[arg(long, default_value_t = false)]
        validate_alphabet: bool,

        /// Explicit Phred offset (33 or 64); inferred from a sample of the
        /// input when omitted.
        #[arg(long)]
        phred_offset: Option<u8>,

        #[command(flatten)]
        pipeline: PipelineConfigArgs,
    },

    /// Applies a fixed mutator preset: length trim and/or reverse-complement.
    Trim {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Trim sequence/quality to this many bases.
        #[arg(long)]
        length: Option<usize>,

        /// Which end `--length` trims from.
        #[arg(long, value_enum, default_value = "right")]
        trim_side: TrimSide,

        /// Reverse-complement every record.
        #[arg(long, default_value_t = false)]
        reverse_complement: bool,

        #[command(flatten)]
        pipeline: PipelineConfigArgs,
    },

    /// Statistics-only pass: no mutators, predicates optional, no output
    /// file is written.
    Stat {
        #[arg(short, long)]
        input: PathBuf,

        /// Minimum mean Phred quality to count as passing.
        #[arg(long)]
        min_quality: Option<f64>,

        /// Explicit Phred offset (33 or 64); inferred when omitted.
        #[arg(long)]
        phred_offset: Option<u8>,

        #[command(flatten)]
        pipeline: PipelineConfigArgs,
    },
}
