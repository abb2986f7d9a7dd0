//! Counts from the tagging stage.

use serde::{Deserialize, Serialize};

use super::{Metric, ProcessingMetrics};

/// Record counts from one tagging run. Pair verdicts are counted once per mate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkMetrics {
    /// Records read from the input.
    pub total_records: u64,
    /// Records written without a QC-fail verdict.
    pub passed_records: u64,
    /// Records written with the QC-fail flag set by a failed predicate.
    pub flagged_records: u64,
    /// Records removed because a predicate failed.
    pub dropped_records: u64,
    /// Secondary and supplementary records written unchanged.
    pub passthrough_records: u64,
    /// Records failing the explicit QC-fail or barcode QC check.
    pub failed_qc: u64,
    /// Records failing the minimum insert length.
    pub failed_insert_length: u64,
    /// Records failing the minimum unambiguous-base fraction.
    pub failed_unambiguous_fraction: u64,
}

impl Metric for MarkMetrics {
    fn metric_name() -> &'static str {
        "mark"
    }
}

impl ProcessingMetrics for MarkMetrics {
    fn total_input(&self) -> u64 {
        self.total_records
    }

    fn total_output(&self) -> u64 {
        self.passed_records + self.flagged_records + self.passthrough_records
    }

    fn total_filtered(&self) -> u64 {
        self.dropped_records
    }
}
