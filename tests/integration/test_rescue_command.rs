//! End-to-end CLI tests for the rescue pipeline.
//!
//! Tests that need a working `samtools` are skipped when it is not installed.

use std::path::Path;

use noodles::sam::alignment::record_buf::RecordBuf;
use tempfile::TempDir;
use umirescue_lib::sam::SORT_KEY;
use umirescue_lib::sam::builder::RecordBuilder;

use crate::helpers::{
    duplicate_pairs, family_sizes, leftover_pipe_dirs, read_bam, run_umirescue,
    samtools_available, write_bam, write_pass_through_sort,
};

fn single_read(name: &str, start: usize) -> RecordBuf {
    RecordBuilder::mapped_read()
        .name(name)
        .sequence("ACGTACGTAC")
        .qualities(&[30; 10])
        .alignment_start(start)
        .build()
}

#[test]
fn test_rescue_collapses_duplicate_pairs() {
    if !samtools_available() {
        eprintln!("samtools not found; skipping");
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");
    let metrics = temp_dir.path().join("collapse.metrics.txt");
    let mark_metrics = temp_dir.path().join("mark.metrics.txt");
    let prefix = temp_dir.path().join("sort");

    let mut records = duplicate_pairs("dup", 3, 100);
    records.extend(duplicate_pairs("other", 2, 5000));
    write_bam(&input, &records);

    let result = run_umirescue([
        "rescue",
        "-o",
        output.to_str().unwrap(),
        "-T",
        prefix.to_str().unwrap(),
        "--metrics",
        metrics.to_str().unwrap(),
        "--mark-metrics",
        mark_metrics.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(result.status.success(), "rescue failed: {}", String::from_utf8_lossy(&result.stderr));

    let (header, records) = read_bam(&output);
    assert_eq!(records.len(), 4);
    let mut sizes = family_sizes(&records);
    sizes.sort_unstable();
    assert_eq!(sizes, vec![2, 2, 3, 3]);
    assert!(
        header.programs().as_ref().keys().any(|id| id.starts_with(b"umirescue")),
        "Output header should carry a @PG record"
    );

    assert!(metrics.exists());
    assert!(mark_metrics.exists());
    assert!(leftover_pipe_dirs(temp_dir.path()).is_empty());
}

#[test]
fn test_rescue_alias() {
    if !samtools_available() {
        eprintln!("samtools not found; skipping");
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");
    write_bam(&input, &duplicate_pairs("dup", 2, 100));

    let result = run_umirescue([
        "markrsq",
        "-u=false",
        "-o",
        output.to_str().unwrap(),
        "-T",
        temp_dir.path().join("sort").to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(result.status.success(), "rescue failed: {}", String::from_utf8_lossy(&result.stderr));
    let (_, records) = read_bam(&output);
    assert_eq!(family_sizes(&records), vec![2, 2]);
    assert!(records[0].name().is_some());
    assert_eq!(records[0].name(), records[1].name(), "Mate consensus names should match");
}

#[test]
fn test_rescue_with_pass_through_sort() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");
    let metrics = temp_dir.path().join("collapse.metrics.txt");
    let sort = write_pass_through_sort(temp_dir.path());
    write_bam(
        &input,
        &[
            single_read("a", 100),
            single_read("b", 100),
            single_read("c", 101),
            single_read("d", 500),
        ],
    );

    let result = run_umirescue([
        "rescue",
        "--single-end",
        "--samtools",
        sort.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "-T",
        temp_dir.path().join("sort").to_str().unwrap(),
        "--metrics",
        metrics.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(result.status.success(), "rescue failed: {}", String::from_utf8_lossy(&result.stderr));

    let (_, records) = read_bam(&output);
    assert_eq!(records.len(), 2);
    assert_eq!(family_sizes(&records), vec![3, 1]);
    assert!(records.iter().all(|r| r.data().get(&SORT_KEY).is_none()));
    assert!(metrics.exists());
    assert!(leftover_pipe_dirs(temp_dir.path()).is_empty());
}

#[test]
fn test_rescue_missing_input_creates_no_pipes() {
    let temp_dir = TempDir::new().unwrap();
    let result = run_umirescue([
        "rescue",
        "-o",
        temp_dir.path().join("out.bam").to_str().unwrap(),
        "-T",
        temp_dir.path().join("sort").to_str().unwrap(),
        temp_dir.path().join("missing.bam").to_str().unwrap(),
    ]);
    assert!(!result.status.success());
    assert!(leftover_pipe_dirs(temp_dir.path()).is_empty());
    assert!(!temp_dir.path().join("out.bam").exists());
}

#[test]
fn test_rescue_unknown_sort_program_cleans_up() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    write_bam(&input, &duplicate_pairs("dup", 1, 100));

    let result = run_umirescue([
        "rescue",
        "--samtools",
        "/no/such/samtools",
        "-o",
        temp_dir.path().join("out.bam").to_str().unwrap(),
        "-T",
        temp_dir.path().join("sort").to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Could not launch external sort"));
    assert!(leftover_pipe_dirs(temp_dir.path()).is_empty());
}

#[test]
fn test_rescue_failing_sort_is_reported() {
    let false_program = Path::new("/bin/false");
    if !false_program.exists() {
        eprintln!("/bin/false not found; skipping");
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    write_bam(&input, &duplicate_pairs("dup", 2, 100));

    let result = run_umirescue([
        "rescue",
        "--samtools",
        false_program.to_str().unwrap(),
        "-o",
        temp_dir.path().join("out.bam").to_str().unwrap(),
        "-T",
        temp_dir.path().join("sort").to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("External sort failed"));
    assert!(leftover_pipe_dirs(temp_dir.path()).is_empty());
}
