//! Counts from stack building and consensus collapsing.

use serde::{Deserialize, Serialize};

use super::{Metric, ProcessingMetrics};

/// Record and stack counts from one collapse run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollapseMetrics {
    /// Records read from the sorted stream.
    pub total_records: u64,
    /// Unmapped, secondary, supplementary and QC-failed records written unchanged.
    pub passthrough_records: u64,
    /// Sealed stacks.
    pub stacks: u64,
    /// Stacks holding a single record.
    pub singleton_stacks: u64,
    /// Largest stack seen.
    pub max_stack_size: u64,
    /// Consensus records written, one per consensus set.
    pub consensus_records: u64,
    /// Stacked records merged away into another record's consensus.
    pub collapsed_records: u64,
    /// Mean number of records behind each consensus record.
    pub mean_family_size: f64,
}

impl CollapseMetrics {
    /// Records one sealed stack and the number of consensus records it produced.
    pub fn record_stack(&mut self, stack_size: usize, consensus_records: usize) {
        let stack_size = stack_size as u64;
        let consensus_records = consensus_records as u64;
        self.stacks += 1;
        if stack_size == 1 {
            self.singleton_stacks += 1;
        }
        self.max_stack_size = self.max_stack_size.max(stack_size);
        self.consensus_records += consensus_records;
        self.collapsed_records += stack_size.saturating_sub(consensus_records);
    }

    /// Computes derived fields once all stacks are recorded.
    pub fn finalize(&mut self) {
        self.mean_family_size = if self.consensus_records == 0 {
            0.0
        } else {
            (self.consensus_records + self.collapsed_records) as f64 / self.consensus_records as f64
        };
    }
}

impl Metric for CollapseMetrics {
    fn metric_name() -> &'static str {
        "collapse"
    }
}

impl ProcessingMetrics for CollapseMetrics {
    fn total_input(&self) -> u64 {
        self.total_records
    }

    fn total_output(&self) -> u64 {
        self.consensus_records + self.passthrough_records
    }

    fn total_filtered(&self) -> u64 {
        self.collapsed_records
    }
}
