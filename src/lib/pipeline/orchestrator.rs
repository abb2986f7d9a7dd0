//! Three-stage rescue pipeline: tag, sort externally, collapse.
//!
//! ```text
//! input.bam -> Tagger -> [marked fifo] -> samtools sort -t SK -> [sorted fifo] -> Collapser -> output.bam
//! ```
//!
//! The tagging and collapsing stages run on the calling thread, one after the other; the
//! sort runs concurrently as a child process. A watcher thread polls the child. If the
//! sort exits unsuccessfully while the calling thread is blocked opening a pipe, the watcher
//! opens that pipe itself so the blocked open returns and the failure can surface. If a
//! stage fails, the watcher kills the sort.
//!
//! The pipes live in a private scratch directory that is removed on every exit path.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info};
use noodles::sam::Header;
use noodles::sam::alignment::io::Write as AlignmentWrite;

use super::fifo::PipeSet;
use super::sorter::SortConfig;
use crate::bam_io::{
    BamReader, BamWriter, create_bam_reader, create_bam_reader_from, create_bam_writer,
    create_bam_writer_from, finish_bam_writer,
};
use crate::consensus::{CollapseConfig, Collapser};
use crate::errors::RescueError;
use crate::header::add_pg_record;
use crate::metrics::{CollapseMetrics, MarkMetrics};
use crate::progress::ProgressTracker;
use crate::tagger::{Tagger, TaggerConfig};
use crate::validation::validate_file_exists;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Lifecycle of one pipeline run. States are visited in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    Unopened,
    PipesOpened,
    Marking,
    Sorting,
    Rescuing,
    Closed,
}

impl PipelineState {
    /// The only state reachable from this one.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Unopened => Some(Self::PipesOpened),
            Self::PipesOpened => Some(Self::Marking),
            Self::Marking => Some(Self::Sorting),
            Self::Sorting => Some(Self::Rescuing),
            Self::Rescuing => Some(Self::Closed),
            Self::Closed => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unopened => "unopened",
            Self::PipesOpened => "pipes-opened",
            Self::Marking => "marking",
            Self::Sorting => "sorting",
            Self::Rescuing => "rescuing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct RescueConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub tagger: TaggerConfig,
    pub collapse: CollapseConfig,
    pub sort: SortConfig,
    /// Directory in which the pipe scratch directory is created.
    pub scratch_dir: PathBuf,
    pub compression_level: u32,
    /// Threads for output compression and collapsing.
    pub threads: usize,
}

/// Counts from both in-process stages.
#[derive(Debug, Clone, Default)]
pub struct RescueSummary {
    pub mark: MarkMetrics,
    pub collapse: CollapseMetrics,
}

/// How the sort child ended.
#[derive(Debug, Clone, Copy)]
enum SortOutcome {
    Exited(ExitStatus),
    Killed,
}

/// Flags shared between the calling thread and the sort watcher.
#[derive(Debug, Default)]
struct StageGate {
    mark_open_returned: AtomicBool,
    sorted_open_returned: AtomicBool,
    aborted: AtomicBool,
}

impl StageGate {
    fn guard(&self) -> StageGuard<'_> {
        StageGuard { gate: self, completed: false }
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Keeps `path` open for reading and writing until `returned` is set, which lets a
    /// blocked open of the other end complete.
    fn hold_open(path: &Path, returned: &AtomicBool) -> io::Result<()> {
        let _handle = OpenOptions::new().read(true).write(true).open(path)?;
        while !returned.load(Ordering::Acquire) {
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }

    fn release_blocked_opens(&self, pipes: &PipeSet) -> io::Result<()> {
        Self::hold_open(pipes.mark_path(), &self.mark_open_returned)?;
        Self::hold_open(pipes.sorted_path(), &self.sorted_open_returned)
    }
}

/// Marks the stages as finished when dropped, and as aborted unless completed.
struct StageGuard<'a> {
    gate: &'a StageGate,
    completed: bool,
}

impl StageGuard<'_> {
    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.gate.aborted.store(true, Ordering::Release);
        }
        self.gate.mark_open_returned.store(true, Ordering::Release);
        self.gate.sorted_open_returned.store(true, Ordering::Release);
    }
}

fn watch_sort(child: &mut Child, pipes: &PipeSet, gate: &StageGate) -> io::Result<SortOutcome> {
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if gate.is_aborted() {
            if let Err(e) = child.kill() {
                debug!("Could not kill external sort: {e}");
            }
            child.wait()?;
            return Ok(SortOutcome::Killed);
        }
        thread::sleep(POLL_INTERVAL);
    };

    debug!("External sort exited with {status}");
    if !status.success() {
        gate.release_blocked_opens(pipes)?;
    }
    Ok(SortOutcome::Exited(status))
}

/// One run of the rescue pipeline.
#[derive(Debug)]
pub struct RescuePipeline {
    config: RescueConfig,
    state: PipelineState,
}

impl RescuePipeline {
    #[must_use]
    pub fn new(config: RescueConfig) -> Self {
        Self { config, state: PipelineState::Unopened }
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn advance(&mut self, next: PipelineState) -> Result<()> {
        if self.state.next() != Some(next) {
            bail!("Invalid pipeline transition from {} to {}", self.state, next);
        }
        debug!("Pipeline state: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Runs every stage to completion.
    ///
    /// The input is checked before any pipe is created. The input header, with a `@PG`
    /// record appended, becomes the output header.
    ///
    /// # Errors
    /// Returns the first fatal error. When the external sort fails on its own, the error is
    /// [`RescueError::SortFailed`] even if a stage failed as a consequence.
    pub fn run(&mut self, version: &str, command_line: &str) -> Result<RescueSummary> {
        if self.state != PipelineState::Unopened {
            bail!("Pipeline already ran (state {})", self.state);
        }
        validate_file_exists(&self.config.input, "Input BAM")?;

        let (mut reader, header) = create_bam_reader(&self.config.input, 1)?;
        let output_header = add_pg_record(header.clone(), version, command_line)?;
        let writer = create_bam_writer(
            &self.config.output,
            &output_header,
            self.config.threads,
            self.config.compression_level,
        )?;

        let pipes = PipeSet::create(&self.config.input, &self.config.scratch_dir)?;
        self.advance(PipelineState::PipesOpened)?;

        let mut child = self.config.sort.spawn(pipes.mark_path(), pipes.sorted_path())?;
        let gate = StageGate::default();

        let (stages, watcher) = thread::scope(|scope| {
            let watcher = scope.spawn(|| watch_sort(&mut child, &pipes, &gate));
            let guard = gate.guard();
            let stages = self.run_stages(&mut reader, &header, &output_header, writer, &pipes, &gate);
            if stages.is_ok() {
                guard.complete();
            } else {
                drop(guard);
            }
            (stages, watcher.join())
        });

        let outcome = watcher
            .map_err(|_| anyhow!("External sort watcher panicked"))?
            .context("Failed to wait for external sort")?;
        let summary = match (outcome, stages) {
            (SortOutcome::Exited(status), stages) if !status.success() => {
                if let Err(e) = stages {
                    debug!("Stage error after sort failure: {e:#}");
                }
                return Err(RescueError::SortFailed { status }.into());
            }
            (_, stages) => stages?,
        };

        pipes.close().context("Failed to remove pipe directory")?;
        self.advance(PipelineState::Closed)?;
        Ok(summary)
    }

    fn run_stages(
        &mut self,
        reader: &mut BamReader,
        header: &Header,
        output_header: &Header,
        writer: BamWriter,
        pipes: &PipeSet,
        gate: &StageGate,
    ) -> Result<RescueSummary> {
        self.advance(PipelineState::Marking)?;
        let opened = OpenOptions::new().write(true).open(pipes.mark_path());
        gate.mark_open_returned.store(true, Ordering::Release);
        let marked = opened.context("Failed to open marked-records pipe")?;
        let mark = self.mark(reader, header, marked)?;

        self.advance(PipelineState::Sorting)?;
        let opened = File::open(pipes.sorted_path());
        gate.sorted_open_returned.store(true, Ordering::Release);
        let sorted = opened.context("Failed to open sorted-records pipe")?;

        self.advance(PipelineState::Rescuing)?;
        let collapse = self.rescue(sorted, output_header, writer)?;

        Ok(RescueSummary { mark, collapse })
    }

    fn mark(&self, reader: &mut BamReader, header: &Header, pipe: File) -> Result<MarkMetrics> {
        let mut sink = create_bam_writer_from(Box::new(pipe), header, 1, 0, "marked-records pipe")?;
        let config = TaggerConfig {
            sort_key: Some(self.config.collapse.stack.scheme),
            ..self.config.tagger.clone()
        };
        let mut tagger = Tagger::new(config);
        let progress = ProgressTracker::new("Tagged records");

        tagger.run(reader.record_bufs(header), &progress, |record| {
            sink.write_alignment_record(header, record).context("Failed to write to sort")
        })?;
        progress.log_final();
        finish_bam_writer(sink, "marked-records pipe")?;

        let metrics = tagger.into_metrics();
        info!(
            "Tagged {} records ({} flagged, {} dropped)",
            metrics.total_records, metrics.flagged_records, metrics.dropped_records
        );
        Ok(metrics)
    }

    fn rescue(
        &self,
        pipe: File,
        output_header: &Header,
        mut writer: BamWriter,
    ) -> Result<CollapseMetrics> {
        let (mut reader, sorted_header) =
            create_bam_reader_from(Box::new(pipe), 1, "sorted-records pipe")?;
        let mut collapser = Collapser::new(self.config.collapse, self.config.threads)?;
        let progress = ProgressTracker::new("Collapsed records");

        collapser.run(reader.record_bufs(&sorted_header), &progress, |record| {
            writer.write_alignment_record(output_header, record).context("Failed to write output")
        })?;
        progress.log_final();
        finish_bam_writer(writer, &self.config.output.display().to_string())?;

        Ok(collapser.into_metrics())
    }
}
