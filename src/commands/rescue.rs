//! Run tagging, sorting and collapsing as one pipeline.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{ArgAction, Parser};
use log::info;

use umirescue_lib::consensus::{CollapseConfig, DEFAULT_BATCH_SIZE};
use umirescue_lib::logging::{OperationTimer, format_count};
use umirescue_lib::metrics::write_metrics;
use umirescue_lib::pipeline::{DEFAULT_SORT_PROGRAM, RescueConfig, RescuePipeline, SortConfig};
use umirescue_lib::sort_key::SortKeyScheme;
use umirescue_lib::tagger::TaggerConfig;
use umirescue_lib::validation::{parse_memory, validate_fraction};

use crate::commands::command::Command;
use crate::commands::common::{
    CompressionOptions, ConsensusOptions, StackOptions, ThreadingOptions,
};
use crate::version::VERSION;

/// Tag, sort and collapse in one pass.
#[derive(Debug, Parser)]
#[command(
    name = "rescue",
    about = "\x1b[38;5;173m[PIPELINE]\x1b[0m       \x1b[36mTag, sort and collapse candidate duplicates in one pass\x1b[0m",
    long_about = r#"
Tag, sort and collapse candidate duplicates in one pass.

Equivalent to:

  umirescue mark in.bam - | samtools sort -t SK - | umirescue collapse -i - -o out.bam

without intermediate files. Two named pipes connect the stages and are created in a
private directory next to the --tmp-prefix (or in the system temporary directory). The
directory and its pipes are removed when the run ends, successfully or not.

The input must be grouped by query name. `samtools` must be on the PATH, or be given
with --samtools.

Example usage:
  umirescue rescue -o rescued.bam -m 2G -@ 4 in.bam
  umirescue rescue -u=false -t 0 -o rescued.bam in.bam
"#
)]
pub struct Rescue {
    /// Input BAM, grouped by query name
    pub input: PathBuf,

    /// Output BAM (`-` for stdout)
    #[arg(short = 'o', long = "output", default_value = "-")]
    pub output: PathBuf,

    /// Memory per sort thread (e.g. 768M, 2G)
    #[arg(short = 'm', long = "sort-memory", value_parser = parse_memory, default_value = "500M")]
    pub sort_memory: usize,

    /// Threads for the external sort
    #[arg(short = '@', long = "sort-threads", default_value_t = 1)]
    pub sort_threads: usize,

    /// Prefix for the sort's temporary files
    #[arg(short = 'T', long = "tmp-prefix")]
    pub tmp_prefix: Option<PathBuf>,

    /// Sort and stack on unclipped starts rather than aligned positions
    #[arg(
        short = 'u',
        long = "use-unclipped-start",
        default_value_t = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub use_unclipped_start: bool,

    /// Sort program to run
    #[arg(long = "samtools", default_value = DEFAULT_SORT_PROGRAM)]
    pub samtools: PathBuf,

    /// Drop pairs failing QC instead of flagging them
    #[arg(long = "remove-qcfail", default_value_t = false)]
    pub remove_qcfail: bool,

    /// Minimum absolute template length (0 disables)
    #[arg(long = "min-insert-length", default_value_t = 0)]
    pub min_insert_length: u32,

    /// Minimum fraction of non-N bases in each read (0 disables)
    #[arg(long = "min-frac-unambiguous", default_value_t = 0.0)]
    pub min_frac_unambiguous: f64,

    /// Treat every read as unpaired
    #[arg(long = "single-end", default_value_t = false)]
    pub single_end: bool,

    /// Optional output file for collapsing metrics
    #[arg(long = "metrics")]
    pub metrics: Option<PathBuf>,

    /// Optional output file for tagging metrics
    #[arg(long = "mark-metrics")]
    pub mark_metrics: Option<PathBuf>,

    #[command(flatten)]
    pub stack: StackOptions,

    #[command(flatten)]
    pub consensus: ConsensusOptions,

    #[command(flatten)]
    pub compression: CompressionOptions,

    #[command(flatten)]
    pub threading: ThreadingOptions,
}

impl Rescue {
    fn scheme(&self) -> SortKeyScheme {
        if self.use_unclipped_start {
            SortKeyScheme::Unclipped
        } else {
            SortKeyScheme::AlignedPosition
        }
    }

    /// Directory holding the pipe directory: the parent of `--tmp-prefix` if it has one.
    fn scratch_dir(&self) -> PathBuf {
        self.tmp_prefix
            .as_deref()
            .and_then(Path::parent)
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(std::env::temp_dir, Path::to_path_buf)
    }

    fn rescue_config(&self) -> RescueConfig {
        let scheme = self.scheme();
        RescueConfig {
            input: self.input.clone(),
            output: self.output.clone(),
            tagger: TaggerConfig {
                remove_qcfail: self.remove_qcfail,
                min_insert_length: self.min_insert_length,
                min_frac_unambiguous: self.min_frac_unambiguous,
                add_fraction_aligned: true,
                single_end: self.single_end,
                sort_key: Some(scheme),
            },
            collapse: CollapseConfig {
                stack: self.stack.to_config(scheme),
                policy: self.consensus.to_policy(),
                batch_size: DEFAULT_BATCH_SIZE,
            },
            sort: SortConfig {
                program: self.samtools.clone(),
                memory_per_thread: self.sort_memory,
                threads: self.sort_threads,
                tmp_prefix: self.tmp_prefix.clone(),
            },
            scratch_dir: self.scratch_dir(),
            compression_level: self.compression.compression_level,
            threads: self.threading.threads,
        }
    }
}

impl Command for Rescue {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.compression.validate()?;
        self.consensus.validate()?;
        validate_fraction(self.min_frac_unambiguous, "min-frac-unambiguous")?;

        let timer = OperationTimer::new("Rescuing duplicates");
        let config = self.rescue_config();

        info!("Starting Rescue");
        info!("Input: {}", config.input.display());
        info!("Output: {}", config.output.display());
        info!("Sort key: {}", config.collapse.stack.scheme);
        info!("Tolerance: {}", config.collapse.stack.tolerance);
        info!(
            "Sort: {} with {} thread(s), {} bytes each",
            config.sort.program.display(),
            config.sort.threads,
            config.sort.memory_per_thread
        );
        info!("Scratch directory: {}", config.scratch_dir.display());

        let summary = RescuePipeline::new(config).run(VERSION.as_str(), command_line)?;

        if let Some(path) = &self.mark_metrics {
            write_metrics(path, std::slice::from_ref(&summary.mark))?;
            info!("Wrote tagging metrics to: {}", path.display());
        }
        if let Some(path) = &self.metrics {
            write_metrics(path, std::slice::from_ref(&summary.collapse))?;
            info!("Wrote collapsing metrics to: {}", path.display());
        }

        info!("=== Summary ===");
        info!("Records read: {}", format_count(summary.mark.total_records));
        info!("Records flagged: {}", format_count(summary.mark.flagged_records));
        info!("Records dropped: {}", format_count(summary.mark.dropped_records));
        info!("Stacks: {}", format_count(summary.collapse.stacks));
        info!("Consensus records: {}", format_count(summary.collapse.consensus_records));
        info!("Records collapsed away: {}", format_count(summary.collapse.collapsed_records));
        timer.log_completion(summary.mark.total_records);
        Ok(())
    }
}
