//! Utilities for generating and reading test BAM data.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;

use noodles::bam;
use noodles::sam::Header;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record_buf::RecordBuf;
use umirescue_lib::pipeline::is_available;
use umirescue_lib::sam::builder::{RecordPairBuilder, test_header};

/// Writes `records` to a BAM at `path` under a one-contig header.
pub fn write_bam(path: &Path, records: &[RecordBuf]) {
    let header = test_header(1);
    let mut writer =
        bam::io::Writer::new(fs::File::create(path).expect("Failed to create BAM file"));
    writer.write_header(&header).expect("Failed to write header");
    for record in records {
        writer.write_alignment_record(&header, record).expect("Failed to write record");
    }
    writer.finish(&header).expect("Failed to finish BAM");
}

/// Reads every record of a BAM.
pub fn read_bam(path: &Path) -> (Header, Vec<RecordBuf>) {
    let mut reader = bam::io::Reader::new(fs::File::open(path).expect("Failed to open BAM"));
    let header = reader.read_header().expect("Failed to read header");
    let records = reader
        .record_bufs(&header)
        .collect::<std::io::Result<Vec<_>>>()
        .expect("Failed to read records");
    (header, records)
}

/// Name-grouped read pairs that are duplicates of one another: read 1 forward at `r1_start`,
/// read 2 reverse at `r1_start + 100`.
pub fn duplicate_pairs(base_name: &str, count: usize, r1_start: usize) -> Vec<RecordBuf> {
    (0..count)
        .flat_map(|i| {
            let (r1, r2) = RecordPairBuilder::new()
                .name(&format!("{base_name}_{i}"))
                .r1_sequence("ACGTACGTAC")
                .r2_sequence("TTGGCCAATT")
                .r1_start(r1_start)
                .r2_start(r1_start + 100)
                .template_length(110)
                .build();
            [r1, r2]
        })
        .collect()
}

/// Runs the umirescue binary with `args`.
pub fn run_umirescue<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_umirescue"))
        .args(args)
        .output()
        .expect("Failed to run umirescue")
}

/// True if `samtools` can be run; cached for the whole test binary.
pub fn samtools_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| is_available(Path::new("samtools")))
}

/// Writes an executable stand-in for `samtools sort` into `dir`.
///
/// It copies its input (the last argument) to the path after `-o` unchanged, so the records
/// it is fed must already be in sort-key order.
pub fn write_pass_through_sort(dir: &Path) -> PathBuf {
    let path = dir.join("pass-through-sort.sh");
    fs::write(
        &path,
        r#"#!/bin/sh
out=""
while [ $# -gt 1 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
buffer="$out.buffer"
cat "$1" > "$buffer" || exit 1
cat "$buffer" > "$out" || exit 1
rm -f "$buffer"
"#,
    )
    .expect("Failed to write sort script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("Failed to make sort script executable");
    path
}

/// Entries of `dir` whose names mark them as pipe directories.
pub fn leftover_pipe_dirs(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .expect("Failed to list directory")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".umirescue."))
        .collect()
}
