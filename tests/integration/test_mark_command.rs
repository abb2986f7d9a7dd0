//! End-to-end CLI tests for the mark command.

use std::fs;

use tempfile::TempDir;
use umirescue_lib::sam::builder::RecordPairBuilder;

use crate::helpers::{
    assert_has_sort_keys, assert_int_tag, duplicate_pairs, read_bam, run_umirescue, write_bam,
};

#[test]
fn test_mark_tags_every_read() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");
    write_bam(&input, &duplicate_pairs("dup", 2, 100));

    let result = run_umirescue(["mark", input.to_str().unwrap(), output.to_str().unwrap()]);
    assert!(result.status.success(), "mark failed: {}", String::from_utf8_lossy(&result.stderr));

    let (_, records) = read_bam(&output);
    assert_eq!(records.len(), 4);
    assert_has_sort_keys(&records);

    let (r1, r2) = (&records[0], &records[1]);
    assert_int_tag(r1, *b"SU", 100);
    assert_int_tag(r1, *b"MU", 200);
    assert_int_tag(r2, *b"SU", 200);
    assert_int_tag(r2, *b"MU", 100);
    assert_int_tag(r1, *b"LM", 10);
    assert_int_tag(r2, *b"LM", 10);
}

#[test]
fn test_mark_flags_or_drops_short_inserts() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let flagged = temp_dir.path().join("flagged.bam");
    let dropped = temp_dir.path().join("dropped.bam");
    let metrics = temp_dir.path().join("mark.metrics.txt");

    let mut records = duplicate_pairs("long", 1, 100);
    let (r1, r2) = RecordPairBuilder::new()
        .name("short")
        .r1_start(300)
        .r2_start(305)
        .template_length(15)
        .build();
    records.extend([r1, r2]);
    write_bam(&input, &records);

    let result = run_umirescue([
        "mark",
        "-i",
        "50",
        input.to_str().unwrap(),
        flagged.to_str().unwrap(),
    ]);
    assert!(result.status.success());
    let (_, records) = read_bam(&flagged);
    assert_eq!(records.len(), 4);
    assert_eq!(records.iter().filter(|r| r.flags().is_qc_fail()).count(), 2);

    let result = run_umirescue([
        "mark",
        "-q",
        "-i",
        "50",
        "--metrics",
        metrics.to_str().unwrap(),
        input.to_str().unwrap(),
        dropped.to_str().unwrap(),
    ]);
    assert!(result.status.success());
    let (_, records) = read_bam(&dropped);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.name().is_some_and(|n| n.starts_with(b"long"))));

    let contents = fs::read_to_string(&metrics).unwrap();
    assert!(contents.starts_with("total_records"));
    assert!(contents.lines().nth(1).is_some_and(|line| line.starts_with("4\t2\t0\t2")));
}

#[test]
fn test_mark_rejects_mismatched_names() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.bam");
    let output = temp_dir.path().join("output.bam");

    let (r1, _) = RecordPairBuilder::new().name("a").r1_start(100).r2_start(200).build();
    let (_, r2) = RecordPairBuilder::new().name("b").r1_start(100).r2_start(200).build();
    write_bam(&input, &[r1, r2]);

    let result = run_umirescue(["mark", input.to_str().unwrap(), output.to_str().unwrap()]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("different names"));
}

#[test]
fn test_mark_missing_input_fails() {
    let temp_dir = TempDir::new().unwrap();
    let result = run_umirescue([
        "mark",
        temp_dir.path().join("missing.bam").to_str().unwrap(),
        temp_dir.path().join("out.bam").to_str().unwrap(),
    ]);
    assert!(!result.status.success());
}
