//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use anyhow::Result;
use clap::Args;
use noodles::sam::Header;

use umirescue_lib::consensus::QualityPolicy;
use umirescue_lib::consensus::policy::{
    DEFAULT_CEILING_BONUS, DEFAULT_MAX_QUALITY, DEFAULT_VOTE_BONUS,
};
use umirescue_lib::stack::{DEFAULT_TOLERANCE, StackConfig};
use umirescue_lib::sort_key::SortKeyScheme;
use umirescue_lib::validation::{validate_compression_level, validate_quality_score};

use crate::version::VERSION;

/// Appends this program's `@PG` record to a header.
///
/// # Errors
///
/// Returns an error if the record cannot be added.
pub fn add_pg_record(header: Header, command_line: &str) -> Result<Header> {
    umirescue_lib::header::add_pg_record(header, VERSION.as_str(), command_line)
}

/// Options for output compression.
#[derive(Debug, Clone, Args)]
pub struct CompressionOptions {
    /// Compression level for output BAM (0-9; 0 writes uncompressed blocks).
    #[arg(short = 'l', long = "compression-level", default_value_t = 6)]
    pub compression_level: u32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self { compression_level: 6 }
    }
}

impl CompressionOptions {
    /// Validates the compression level.
    ///
    /// # Errors
    ///
    /// Returns an error if the level is outside 0-9.
    pub fn validate(&self) -> Result<()> {
        validate_compression_level(self.compression_level, "compression-level")?;
        Ok(())
    }
}

/// Options for grouping sorted records into stacks.
#[derive(Debug, Clone, Args)]
pub struct StackOptions {
    /// Maximum distance from a stack's first record for another record to join it.
    #[arg(short = 't', long = "tolerance", default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: u32,
}

impl StackOptions {
    #[must_use]
    pub fn to_config(&self, scheme: SortKeyScheme) -> StackConfig {
        StackConfig { tolerance: self.tolerance, scheme }
    }
}

/// Options for scoring consensus base qualities.
#[derive(Debug, Clone, Args)]
pub struct ConsensusOptions {
    /// Quality added for each agreeing observation beyond the first.
    #[arg(long = "vote-bonus", default_value_t = DEFAULT_VOTE_BONUS)]
    pub vote_bonus: u32,

    /// Maximum amount a consensus quality may exceed the best observed quality.
    #[arg(long = "ceiling-bonus", default_value_t = DEFAULT_CEILING_BONUS)]
    pub ceiling_bonus: u8,

    /// Maximum consensus base quality.
    #[arg(long = "max-quality", default_value_t = DEFAULT_MAX_QUALITY)]
    pub max_quality: u8,
}

impl Default for ConsensusOptions {
    fn default() -> Self {
        Self {
            vote_bonus: DEFAULT_VOTE_BONUS,
            ceiling_bonus: DEFAULT_CEILING_BONUS,
            max_quality: DEFAULT_MAX_QUALITY,
        }
    }
}

impl ConsensusOptions {
    /// Validates the consensus options.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_quality` exceeds the maximum Phred score.
    pub fn validate(&self) -> Result<()> {
        validate_quality_score(self.max_quality, "max-quality")?;
        Ok(())
    }

    #[must_use]
    pub fn to_policy(&self) -> QualityPolicy {
        QualityPolicy {
            vote_bonus: self.vote_bonus,
            ceiling_bonus: self.ceiling_bonus,
            max_quality: self.max_quality,
        }
    }
}

/// Options for worker threads.
#[derive(Debug, Clone, Args)]
pub struct ThreadingOptions {
    /// Threads for BAM compression and parallel collapsing.
    #[arg(long = "threads", default_value_t = 1)]
    pub threads: usize,
}
