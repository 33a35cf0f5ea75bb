use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn sample_path() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/sample.fastq")
}

fn fastqtools() -> Command {
    Command::cargo_bin("fastqtools").expect("built binary")
}

#[test]
fn filter_by_quality_drops_only_low_quality_record() {
    let output = NamedTempFile::new().expect("temp file");

    fastqtools()
        .args([
            "filter",
            "-i",
            sample_path().to_str().unwrap(),
            "-o",
            output.path().to_str().unwrap(),
            "--min-quality",
            "30",
            "--phred-offset",
            "33",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("total\tpassed\tfiltered"))
        .stdout(predicate::str::is_match("^total.*\n4\t3\t1\t0\t0\t").unwrap());

    let written = fs::read_to_string(output.path()).expect("read output");
    assert!(written.contains("@read1"));
    assert!(!written.contains("@read2"));
    assert!(written.contains("@read3"));
    assert!(written.contains("@read4"));
}

#[test]
fn filter_with_alphabet_validation_drops_invalid_base_record_too() {
    let output = NamedTempFile::new().expect("temp file");

    fastqtools()
        .args([
            "filter",
            "-i",
            sample_path().to_str().unwrap(),
            "-o",
            output.path().to_str().unwrap(),
            "--min-quality",
            "30",
            "--validate-alphabet",
            "--phred-offset",
            "33",
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_match("^total.*\n4\t2\t2\t0\t0\t").unwrap());

    let written = fs::read_to_string(output.path()).expect("read output");
    assert!(written.contains("@read1"));
    assert!(!written.contains("@read2"));
    assert!(!written.contains("@read3"));
    assert!(written.contains("@read4"));
}

#[test]
fn trim_truncates_every_sequence_to_the_requested_length() {
    let output = NamedTempFile::new().expect("temp file");

    fastqtools()
        .args([
            "trim",
            "-i",
            sample_path().to_str().unwrap(),
            "-o",
            output.path().to_str().unwrap(),
            "--length",
            "5",
        ])
        .assert()
        .success();

    let written = fs::read_to_string(output.path()).expect("read output");
    for line in written.lines().skip(1).step_by(4) {
        assert_eq!(line.len(), 5, "sequence line {line:?} was not trimmed to 5 bases");
    }
}

#[test]
fn trim_left_drops_bases_from_the_front_instead_of_the_back() {
    let output = NamedTempFile::new().expect("temp file");

    fastqtools()
        .args([
            "trim",
            "-i",
            sample_path().to_str().unwrap(),
            "-o",
            output.path().to_str().unwrap(),
            "--length",
            "8",
            "--trim-side",
            "left",
        ])
        .assert()
        .success();

    let written = fs::read_to_string(output.path()).expect("read output");
    let mut lines = written.lines();
    let _name = lines.next().unwrap();
    let sequence = lines.next().unwrap();
    // read1's sequence is ACGTACGTAC (10 bases); left-trimming to 8 drops
    // the first 2, keeping the tail.
    assert_eq!(sequence, "GTACGTAC");
}

#[test]
fn trim_without_any_mutator_flag_fails() {
    let output = NamedTempFile::new().expect("temp file");

    fastqtools()
        .args([
            "trim",
            "-i",
            sample_path().to_str().unwrap(),
            "-o",
            output.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one of"));
}

#[test]
fn stat_reports_counts_without_writing_any_output_file() {
    fastqtools()
        .args(["stat", "-i", sample_path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::is_match("^total.*\n4\t4\t0\t0\t0\t").unwrap());
}

#[test]
fn gzip_round_trip_through_filter() {
    let gz_input = NamedTempFile::new().expect("temp file");
    let gz_input_path = gz_input.path().with_extension("fastq.gz");

    {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let raw = fs::read(sample_path()).expect("read fixture");
        let file = fs::File::create(&gz_input_path).expect("create gz input");
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&raw).expect("write gz input");
        encoder.finish().expect("finish gz input");
    }

    let gz_output = NamedTempFile::new().expect("temp file");
    let gz_output_path = gz_output.path().with_extension("fastq.gz");

    fastqtools()
        .args([
            "filter",
            "-i",
            gz_input_path.to_str().unwrap(),
            "-o",
            gz_output_path.to_str().unwrap(),
            "--validate-alphabet",
        ])
        .assert()
        .success();

    assert!(gz_output_path.exists());
    let _ = fs::remove_file(&gz_input_path);
    let _ = fs::remove_file(&gz_output_path);
}
