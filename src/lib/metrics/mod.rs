//! Run metrics written as single-row TSV files.
//!
//! - [`mark`] - counts from the tagging stage
//! - [`collapse`] - counts from stack building and consensus collapsing

pub mod collapse;
pub mod mark;

use std::path::Path;

use anyhow::{Context, Result};
use fgoxide::io::DelimFile;
use serde::{Deserialize, Serialize};

pub use collapse::CollapseMetrics;
pub use mark::MarkMetrics;

/// A metric type that can be serialized to TSV files.
pub trait Metric: Serialize + for<'de> Deserialize<'de> + Clone + Default {
    /// Human-readable name, used in error messages.
    fn metric_name() -> &'static str;
}

/// Input, output and filtered counts shared by every stage.
pub trait ProcessingMetrics {
    /// Records consumed.
    fn total_input(&self) -> u64;

    /// Records emitted.
    fn total_output(&self) -> u64;

    /// Records removed from the stream.
    fn total_filtered(&self) -> u64;

    /// Output as a percentage of input.
    fn efficiency(&self) -> f64 {
        if self.total_input() == 0 {
            0.0
        } else {
            self.total_output() as f64 / self.total_input() as f64 * 100.0
        }
    }
}

/// Writes metric rows to a TSV file with a header line.
///
/// # Errors
/// Returns an error if the file cannot be created or written to.
///
/// # Example
/// ```no_run
/// use umirescue_lib::metrics::{MarkMetrics, write_metrics};
///
/// write_metrics("mark_metrics.txt", &[MarkMetrics::default()]).unwrap();
/// ```
pub fn write_metrics<P: AsRef<Path>, T: Metric>(path: P, metrics: &[T]) -> Result<()> {
    let path = path.as_ref();
    DelimFile::default()
        .write_tsv(&path, metrics)
        .with_context(|| format!("Failed to write {} metrics: {}", T::metric_name(), path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_efficiency_zero_input() {
        assert!(MarkMetrics::default().efficiency().abs() < f64::EPSILON);
    }

    #[test]
    fn test_write_and_read_back() -> Result<()> {
        let file = NamedTempFile::new()?;
        let metrics = MarkMetrics { total_records: 10, passed_records: 8, ..Default::default() };
        write_metrics(file.path(), std::slice::from_ref(&metrics))?;

        let content = fs::read_to_string(file.path())?;
        assert!(content.starts_with("total_records\t"));

        let back: Vec<MarkMetrics> = DelimFile::default().read_tsv(&file.path())?;
        assert_eq!(back, vec![metrics]);
        Ok(())
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let err = write_metrics("/no/such/dir/metrics.txt", &[CollapseMetrics::default()])
            .expect_err("missing directory");
        assert!(err.to_string().contains("Failed to write collapse metrics"));
    }
}
