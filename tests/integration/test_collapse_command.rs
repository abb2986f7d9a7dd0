//! End-to-end CLI tests for the collapse command.

use noodles::sam::alignment::record_buf::RecordBuf;
use tempfile::TempDir;
use umirescue_lib::sam::builder::RecordBuilder;

use crate::helpers::{
    assert_agreement_counts, family_sizes, read_bam, run_umirescue, write_bam,
};

fn single_read(name: &str, start: usize, sequence: &str) -> RecordBuf {
    RecordBuilder::mapped_read()
        .name(name)
        .sequence(sequence)
        .qualities(&vec![30; sequence.len()])
        .alignment_start(start)
        .build()
}

#[test]
fn test_collapse_by_aligned_position() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");
    write_bam(
        &input,
        &[
            single_read("a", 100, "AAAAA"),
            single_read("b", 100, "AAAAT"),
            single_read("c", 101, "AAAAA"),
            single_read("d", 500, "CCCCC"),
            single_read("e", 500, "CCCCC"),
        ],
    );

    let result = run_umirescue([
        "collapse",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--sort-key",
        "aligned",
    ]);
    assert!(
        result.status.success(),
        "collapse failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );

    let (_, records) = read_bam(&output);
    assert_eq!(records.len(), 2);
    assert_eq!(family_sizes(&records), vec![3, 2]);

    let first = &records[0];
    assert_eq!(first.sequence().as_ref(), b"AAAAA");
    assert_agreement_counts(first, &[3, 3, 3, 3, 2]);
    assert!(!first.flags().is_duplicate());
}

#[test]
fn test_collapse_tolerance_zero_splits_stacks() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");
    write_bam(
        &input,
        &[
            single_read("a", 100, "AAAAA"),
            single_read("b", 100, "AAAAA"),
            single_read("c", 101, "AAAAA"),
        ],
    );

    let result = run_umirescue([
        "collapse",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--sort-key",
        "aligned",
        "-t",
        "0",
    ]);
    assert!(result.status.success());
    let (_, records) = read_bam(&output);
    assert_eq!(family_sizes(&records), vec![2, 1]);
}

#[test]
fn test_collapse_passes_unmapped_reads_through() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");
    let unmapped = RecordBuilder::new().name("u").sequence("ACGTA").unmapped(true).build();
    write_bam(&input, &[single_read("a", 100, "AAAAA"), unmapped]);

    let result = run_umirescue([
        "collapse",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--sort-key",
        "aligned",
    ]);
    assert!(result.status.success());
    let (_, records) = read_bam(&output);
    assert_eq!(records.len(), 2);
    assert!(records.iter().any(|r| r.flags().is_unmapped() && r.name() == Some(b"u".into())));
}

#[test]
fn test_collapse_rejects_unsorted_input() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");
    write_bam(&input, &[single_read("a", 500, "AAAAA"), single_read("b", 100, "AAAAA")]);

    let result = run_umirescue([
        "collapse",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--sort-key",
        "aligned",
    ]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("not sorted"));
}
