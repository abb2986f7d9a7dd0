//! SAM/BAM record utilities and the aux tags used across the pipeline.
//!
//! - [`record_utils`] derives coordinates from CIGARs and reads typed tag values
//! - [`builder`] builds records for tests

pub mod builder;
pub mod record_utils;

use noodles::sam::alignment::record::data::field::Tag;

/// Self unclipped start (integer, 1-based).
pub const SELF_UNCLIPPED_START: Tag = Tag::new(b'S', b'U');

/// Mate unclipped start (integer, 1-based).
pub const MATE_UNCLIPPED_START: Tag = Tag::new(b'M', b'U');

/// Mate read length (integer).
pub const MATE_READ_LENGTH: Tag = Tag::new(b'L', b'M');

/// Copy of the mate's supplementary-alignment descriptor (string).
pub const MATE_SUPPLEMENTARY: Tag = Tag::new(b'm', b's');

/// Supplementary-alignment descriptor written by aligners.
pub const SUPPLEMENTARY_ALIGNMENT: Tag = Tag::new(b'S', b'A');

/// Fraction of the read's bases that are aligned (float).
pub const FRACTION_ALIGNED: Tag = Tag::new(b'A', b'F');

/// Barcode QC pass flag written by the demultiplexer (integer, 0 = fail).
pub const BARCODE_PASS: Tag = Tag::new(b'F', b'P');

/// Sort key consumed by the external sort (`samtools sort -t SK`).
pub const SORT_KEY: Tag = Tag::new(b'S', b'K');

/// Name of [`SORT_KEY`] as passed to `samtools sort -t`.
pub const SORT_KEY_NAME: &str = "SK";

/// Number of records collapsed into a consensus record (integer).
pub const FAMILY_SIZE: Tag = Tag::new(b'F', b'M');

/// Per-position count of contributors agreeing with the consensus base (integer array).
pub const AGREEMENT_COUNTS: Tag = Tag::new(b'F', b'A');

/// Per-position summed quality of the agreeing contributors (integer array).
pub const AGREEMENT_QUALITY_SUMS: Tag = Tag::new(b'P', b'V');

pub use record_utils::{int_tag, query_name, string_tag, unclipped_start};
