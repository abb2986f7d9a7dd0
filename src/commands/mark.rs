//! Tag name-sorted reads with positional metadata for duplicate rescue.
//!
//! Reads are consumed two at a time (unless `--single-end`), tagged with their own and
//! their mate's unclipped start, their mate's length and their mate's supplementary
//! alignments, and checked against the QC reject predicate.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser};
use log::info;
use noodles::sam::alignment::io::Write as AlignmentWrite;

use umirescue_lib::bam_io::{
    create_bam_reader, create_bam_writer, finish_bam_writer, is_stdin_path,
};
use umirescue_lib::logging::{OperationTimer, format_count, format_percent};
use umirescue_lib::metrics::{ProcessingMetrics, write_metrics};
use umirescue_lib::progress::ProgressTracker;
use umirescue_lib::sort_key::SortKeyScheme;
use umirescue_lib::tagger::{Tagger, TaggerConfig};
use umirescue_lib::validation::{
    validate_compression_level, validate_file_exists, validate_fraction,
};

use crate::commands::command::Command;
use crate::commands::common::{ThreadingOptions, add_pg_record};

/// Level used by `--default-compression`.
const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Tag reads for duplicate rescue.
#[derive(Debug, Parser)]
#[command(
    name = "mark",
    about = "\x1b[38;5;72m[TAGGING]\x1b[0m        \x1b[36mTag name-sorted reads with unclipped starts and mate info\x1b[0m",
    long_about = r#"
Tag name-sorted reads with positional metadata for duplicate rescue.

Input must be grouped by query name so that the two reads of a pair are adjacent.
Each read of a pair receives:

  SU:i  its own unclipped start (1-based)
  MU:i  its mate's unclipped start
  LM:i  its mate's read length
  ms:Z  its mate's SA tag, when the mate has one
  AF:f  the fraction of its bases that are aligned (unless -U=false)
  SK:Z  a sort key for `samtools sort -t SK`

Pairs failing a QC check (QC-fail flag or FP:i:0, minimum insert length, minimum
fraction of unambiguous bases) are flagged as QC-failed, or dropped with -q.

The output is uncompressed by default because it is usually piped into a sort.

Example usage:
  umirescue mark -q -i 50 in.bam - | samtools sort -t SK -o sorted.bam -
  umirescue mark -S -d in.bam tagged.bam
"#
)]
pub struct Mark {
    /// Input BAM, grouped by query name (`-` for stdin)
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Output BAM (`-` for stdout)
    #[arg(default_value = "-")]
    pub output: PathBuf,

    /// Compression level for output BAM (0-9)
    #[arg(short = 'l', long = "compression-level", default_value_t = 0)]
    pub compression_level: u32,

    /// Write with the default compression level (6), overriding -l
    #[arg(short = 'd', long = "default-compression", default_value_t = false)]
    pub default_compression: bool,

    /// Drop pairs failing QC instead of flagging them
    #[arg(short = 'q', long = "remove-qcfail", default_value_t = false)]
    pub remove_qcfail: bool,

    /// Minimum absolute template length (0 disables)
    #[arg(short = 'i', long = "min-insert-length", default_value_t = 0)]
    pub min_insert_length: u32,

    /// Minimum fraction of non-N bases in each read (0 disables)
    #[arg(short = 'u', long = "min-frac-unambiguous", default_value_t = 0.0)]
    pub min_frac_unambiguous: f64,

    /// Write the fraction-aligned tag (AF) alongside the unclipped start tags
    #[arg(
        short = 'U',
        long = "add-unclipped-start",
        default_value_t = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub add_unclipped_start: bool,

    /// Treat every read as unpaired
    #[arg(short = 'S', long = "single-end", default_value_t = false)]
    pub single_end: bool,

    /// Coordinate encoded in the SK sort-key tag
    #[arg(long = "sort-key", value_enum, default_value_t = SortKeyScheme::Unclipped)]
    pub sort_key: SortKeyScheme,

    /// Optional output file for tagging metrics
    #[arg(long = "metrics")]
    pub metrics: Option<PathBuf>,

    #[command(flatten)]
    pub threading: ThreadingOptions,
}

impl Mark {
    fn output_compression_level(&self) -> u32 {
        if self.default_compression { DEFAULT_COMPRESSION_LEVEL } else { self.compression_level }
    }

    fn tagger_config(&self) -> TaggerConfig {
        TaggerConfig {
            remove_qcfail: self.remove_qcfail,
            min_insert_length: self.min_insert_length,
            min_frac_unambiguous: self.min_frac_unambiguous,
            add_fraction_aligned: self.add_unclipped_start,
            single_end: self.single_end,
            sort_key: Some(self.sort_key),
        }
    }
}

impl Command for Mark {
    fn execute(&self, command_line: &str) -> Result<()> {
        if !is_stdin_path(&self.input) {
            validate_file_exists(&self.input, "Input BAM")?;
        }
        validate_compression_level(self.compression_level, "compression-level")?;
        validate_fraction(self.min_frac_unambiguous, "min-frac-unambiguous")?;

        let timer = OperationTimer::new("Tagging reads");
        let level = self.output_compression_level();
        let config = self.tagger_config();

        info!("Starting Mark");
        info!("Input: {}", self.input.display());
        info!("Output: {}", self.output.display());
        info!("Mode: {}", if config.single_end { "single-end" } else { "paired-end" });
        info!("QC failures: {}", if config.remove_qcfail { "dropped" } else { "flagged" });
        info!("Minimum insert length: {}", config.min_insert_length);
        info!("Minimum unambiguous fraction: {}", config.min_frac_unambiguous);
        info!("Fraction-aligned tags: {}", config.add_fraction_aligned);
        info!("Sort key: {}", self.sort_key);
        info!("Compression level: {level}");

        let threads = self.threading.threads;
        let (mut reader, header) = create_bam_reader(&self.input, threads)?;
        let header = add_pg_record(header, command_line)?;
        let mut writer = create_bam_writer(&self.output, &header, threads, level)?;

        let mut tagger = Tagger::new(config);
        let progress = ProgressTracker::new("Tagged records");
        tagger.run(reader.record_bufs(&header), &progress, |record| {
            writer.write_alignment_record(&header, record)?;
            Ok(())
        })?;
        progress.log_final();
        finish_bam_writer(writer, &self.output.display().to_string())?;

        let metrics = tagger.into_metrics();
        if let Some(path) = &self.metrics {
            write_metrics(path, std::slice::from_ref(&metrics))?;
            info!("Wrote metrics to: {}", path.display());
        }

        info!("=== Summary ===");
        info!("Records read: {}", format_count(metrics.total_records));
        info!(
            "Records written: {} ({})",
            format_count(metrics.total_output()),
            format_percent(metrics.efficiency() / 100.0, 2)
        );
        info!("Records flagged: {}", format_count(metrics.flagged_records));
        info!("Records dropped: {}", format_count(metrics.dropped_records));
        timer.log_completion(metrics.total_records);
        Ok(())
    }
}
