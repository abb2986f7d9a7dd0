//! Streaming driver: stacks in, consensus records out.
//!
//! Sealed stacks are gathered into batches and collapsed on a rayon pool when one is
//! configured. Results are written in the order the stacks were sealed, so output is the
//! same for any thread count.

use std::io;

use anyhow::{Context, Result};
use log::debug;
use noodles::sam::alignment::record_buf::RecordBuf;
use rayon::prelude::*;

use super::family::ConsensusFamily;
use super::policy::QualityPolicy;
use crate::metrics::CollapseMetrics;
use crate::progress::ProgressTracker;
use crate::stack::{Stack, StackConfig, StackItem, Stacks};

/// Default number of stack items collapsed per batch.
pub const DEFAULT_BATCH_SIZE: usize = 4096;

/// Options for collapsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollapseConfig {
    pub stack: StackConfig,
    pub policy: QualityPolicy,
    pub batch_size: usize,
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self {
            stack: StackConfig::default(),
            policy: QualityPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Collapses one sealed stack into one record per consensus set.
#[must_use]
pub fn collapse_stack(stack: Stack, policy: &QualityPolicy) -> Vec<RecordBuf> {
    ConsensusFamily::from_stack(stack).emit(policy)
}

enum Collapsed {
    PassThrough(RecordBuf),
    Stack { size: usize, records: Vec<RecordBuf> },
}

fn collapse_item(item: StackItem, policy: &QualityPolicy) -> Collapsed {
    match item {
        StackItem::PassThrough(record) => Collapsed::PassThrough(record),
        StackItem::Stack(stack) => {
            let size = stack.len();
            Collapsed::Stack { size, records: collapse_stack(stack, policy) }
        }
    }
}

/// Stack builder and consensus collapser over a key-ordered stream.
pub struct Collapser {
    config: CollapseConfig,
    pool: Option<rayon::ThreadPool>,
    metrics: CollapseMetrics,
}

impl Collapser {
    /// Creates a collapser; `threads > 1` collapses batches on a dedicated rayon pool.
    ///
    /// # Errors
    /// Returns an error if the thread pool cannot be built.
    pub fn new(config: CollapseConfig, threads: usize) -> Result<Self> {
        let pool = if threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .context("Failed to build collapse thread pool")?,
            )
        } else {
            None
        };
        Ok(Self { config, pool, metrics: CollapseMetrics::default() })
    }

    #[must_use]
    pub fn metrics(&self) -> &CollapseMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn into_metrics(self) -> CollapseMetrics {
        self.metrics
    }

    /// Groups and collapses a whole stream, handing every output record to `write` in order.
    ///
    /// # Errors
    /// Returns an error if reading fails, the stream is out of order, or `write` fails.
    pub fn run<I, W>(&mut self, records: I, progress: &ProgressTracker, mut write: W) -> Result<()>
    where
        I: Iterator<Item = io::Result<RecordBuf>>,
        W: FnMut(&RecordBuf) -> Result<()>,
    {
        let batch_size = self.config.batch_size.max(1);
        let mut batch = Vec::with_capacity(batch_size);

        for item in Stacks::new(records, self.config.stack) {
            batch.push(item?);
            if batch.len() >= batch_size {
                self.flush(&mut batch, progress, &mut write)?;
            }
        }
        self.flush(&mut batch, progress, &mut write)?;

        self.metrics.finalize();
        debug!("Collapsing finished: {:?}", self.metrics);
        Ok(())
    }

    fn flush<W>(
        &mut self,
        batch: &mut Vec<StackItem>,
        progress: &ProgressTracker,
        write: &mut W,
    ) -> Result<()>
    where
        W: FnMut(&RecordBuf) -> Result<()>,
    {
        if batch.is_empty() {
            return Ok(());
        }
        let items = std::mem::take(batch);
        let policy = self.config.policy;
        let collapsed: Vec<Collapsed> = match &self.pool {
            Some(pool) => pool.install(|| {
                items.into_par_iter().map(|item| collapse_item(item, &policy)).collect()
            }),
            None => items.into_iter().map(|item| collapse_item(item, &policy)).collect(),
        };

        for result in collapsed {
            match result {
                Collapsed::PassThrough(record) => {
                    self.metrics.total_records += 1;
                    self.metrics.passthrough_records += 1;
                    progress.log_if_needed(1);
                    write(&record)?;
                }
                Collapsed::Stack { size, records } => {
                    self.metrics.total_records += size as u64;
                    self.metrics.record_stack(size, records.len());
                    progress.log_if_needed(size as u64);
                    for record in &records {
                        write(record)?;
                    }
                }
            }
        }
        Ok(())
    }
}
