//! Collapse candidate duplicates in a key-sorted BAM into consensus reads.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;
use noodles::sam::alignment::io::Write as AlignmentWrite;

use umirescue_lib::bam_io::{
    create_bam_reader, create_bam_writer, finish_bam_writer, is_stdin_path,
};
use umirescue_lib::consensus::{CollapseConfig, Collapser, DEFAULT_BATCH_SIZE};
use umirescue_lib::logging::{OperationTimer, format_count};
use umirescue_lib::metrics::write_metrics;
use umirescue_lib::progress::ProgressTracker;
use umirescue_lib::sort_key::SortKeyScheme;
use umirescue_lib::validation::validate_file_exists;

use crate::commands::command::Command;
use crate::commands::common::{
    CompressionOptions, ConsensusOptions, StackOptions, ThreadingOptions, add_pg_record,
};

/// Collapse stacks of candidate duplicates into consensus reads.
#[derive(Debug, Parser)]
#[command(
    name = "collapse",
    about = "\x1b[38;5;166m[CONSENSUS]\x1b[0m      \x1b[36mCollapse key-sorted candidate duplicates into consensus reads\x1b[0m",
    long_about = r#"
Collapse stacks of candidate duplicates into consensus reads.

Input must be ordered by sort key: either the output of `umirescue mark` sorted with
`samtools sort -t SK`, or a coordinate-sorted BAM used with `--sort-key aligned`.
Records carrying an SK tag are grouped by it; other records use --sort-key.

A stack opens at a record and collects every following record on the same contig and
strand whose position is within --tolerance of the first. Each stack is split by read
length and mate number, and every part becomes one consensus read:

  - the base at each position is the most common one (ties go to A, C, G, T, N)
  - its quality combines the agreeing qualities and the number of agreeing reads,
    capped at the best observed quality plus --ceiling-bonus
  - FM:i holds the number of reads collapsed, FA:B:i the agreeing reads per position
    and PV:B:i their summed qualities

Unmapped, secondary, supplementary and QC-failed records are written unchanged.

Example usage:
  umirescue collapse -i sorted.bam -o collapsed.bam --threads 4
"#
)]
pub struct Collapse {
    /// Input BAM sorted by sort key (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output BAM (`-` for stdout)
    #[arg(short = 'o', long = "output", default_value = "-")]
    pub output: PathBuf,

    /// Coordinate used for records without an SK tag
    #[arg(long = "sort-key", value_enum, default_value_t = SortKeyScheme::Unclipped)]
    pub sort_key: SortKeyScheme,

    /// Optional output file for collapsing metrics
    #[arg(long = "metrics")]
    pub metrics: Option<PathBuf>,

    #[command(flatten)]
    pub stack: StackOptions,

    #[command(flatten)]
    pub consensus: ConsensusOptions,

    #[command(flatten)]
    pub compression: CompressionOptions,

    #[command(flatten)]
    pub threading: ThreadingOptions,
}

impl Collapse {
    fn collapse_config(&self) -> CollapseConfig {
        CollapseConfig {
            stack: self.stack.to_config(self.sort_key),
            policy: self.consensus.to_policy(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Command for Collapse {
    fn execute(&self, command_line: &str) -> Result<()> {
        if !is_stdin_path(&self.input) {
            validate_file_exists(&self.input, "Input BAM")?;
        }
        self.compression.validate()?;
        self.consensus.validate()?;

        let timer = OperationTimer::new("Collapsing reads");
        let config = self.collapse_config();
        let threads = self.threading.threads;

        info!("Starting Collapse");
        info!("Input: {}", self.input.display());
        info!("Output: {}", self.output.display());
        info!("Tolerance: {}", config.stack.tolerance);
        info!("Sort key: {}", config.stack.scheme);
        info!("Quality policy: {:?}", config.policy);
        info!("Threads: {threads}");

        let (mut reader, header) = create_bam_reader(&self.input, threads)?;
        let header = add_pg_record(header, command_line)?;
        let mut writer =
            create_bam_writer(&self.output, &header, threads, self.compression.compression_level)?;

        let mut collapser = Collapser::new(config, threads)?;
        let progress = ProgressTracker::new("Collapsed records");
        collapser.run(reader.record_bufs(&header), &progress, |record| {
            writer.write_alignment_record(&header, record)?;
            Ok(())
        })?;
        progress.log_final();
        finish_bam_writer(writer, &self.output.display().to_string())?;

        let metrics = collapser.into_metrics();
        if let Some(path) = &self.metrics {
            write_metrics(path, std::slice::from_ref(&metrics))?;
            info!("Wrote metrics to: {}", path.display());
        }

        info!("=== Summary ===");
        info!("Records read: {}", format_count(metrics.total_records));
        info!(
            "Stacks: {} ({} singletons)",
            format_count(metrics.stacks),
            format_count(metrics.singleton_stacks)
        );
        info!("Consensus records: {}", format_count(metrics.consensus_records));
        info!("Records collapsed away: {}", format_count(metrics.collapsed_records));
        info!("Pass-through records: {}", format_count(metrics.passthrough_records));
        timer.log_completion(metrics.total_records);
        Ok(())
    }
}
