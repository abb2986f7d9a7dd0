//! Ordering keys that make physically coincident fragments adjacent after sorting.
//!
//! A [`SortKey`] is `(contig, position, strand, mate-number)`. The position is either the
//! 1-based aligned start or the unclipped start, depending on the [`SortKeyScheme`].
//! Records are sorted by an external tool, so the key is also rendered as a fixed-width
//! hex string (the `SK` tag) whose lexicographic order equals the key order.
//!
//! Unmapped records get the maximum contig and sort after every mapped record.

use std::cmp::Ordering;
use std::fmt;

use noodles::sam::alignment::record_buf::RecordBuf;

use crate::sam::{SELF_UNCLIPPED_START, int_tag, unclipped_start};

/// Contig value used for unmapped records.
pub const UNMAPPED_CONTIG: u32 = u32::MAX;

/// Offset added to positions so that negative unclipped starts encode as unsigned hex.
const POSITION_BIAS: i64 = 1 << 32;

/// Length of an encoded key: 8 hex contig digits, 9 hex position digits, 1 flag digit.
pub const ENCODED_LEN: usize = 18;

/// Which coordinate a key is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortKeyScheme {
    /// 1-based leftmost aligned position.
    #[value(name = "aligned")]
    AlignedPosition,
    /// Unclipped start, from the `SU` tag when present.
    #[default]
    #[value(name = "unclipped")]
    Unclipped,
}

impl fmt::Display for SortKeyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlignedPosition => write!(f, "aligned"),
            Self::Unclipped => write!(f, "unclipped"),
        }
    }
}

/// Ordering key of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortKey {
    /// Reference sequence index, or [`UNMAPPED_CONTIG`].
    pub contig: u32,
    /// 1-based coordinate chosen by the scheme; may be negative for unclipped starts.
    pub position: i64,
    /// Record is on the reverse strand.
    pub reverse: bool,
    /// Record is the first segment of a pair.
    pub read1: bool,
}

impl SortKey {
    /// Builds the key of a record under a scheme.
    #[must_use]
    pub fn from_record(record: &RecordBuf, scheme: SortKeyScheme) -> Self {
        let flags = record.flags();
        let reverse = flags.is_reverse_complemented();
        let read1 = flags.is_segmented() && flags.is_first_segment();

        let contig = match record.reference_sequence_id() {
            Some(id) if !flags.is_unmapped() => u32::try_from(id).unwrap_or(UNMAPPED_CONTIG),
            _ => UNMAPPED_CONTIG,
        };
        if contig == UNMAPPED_CONTIG {
            return Self { contig, position: 0, reverse, read1 };
        }

        let aligned = || record.alignment_start().map_or(0, |p| usize::from(p) as i64);
        let position = match scheme {
            SortKeyScheme::AlignedPosition => aligned(),
            SortKeyScheme::Unclipped => int_tag(record, SELF_UNCLIPPED_START)
                .or_else(|| unclipped_start(record).map(i64::from))
                .unwrap_or_else(aligned),
        };

        Self { contig, position, reverse, read1 }
    }

    /// True for keys of unmapped records.
    #[must_use]
    pub fn is_unmapped(&self) -> bool {
        self.contig == UNMAPPED_CONTIG
    }

    /// Renders the key so that string order equals key order.
    ///
    /// ```
    /// use umirescue_lib::sort_key::SortKey;
    ///
    /// let key = SortKey { contig: 1, position: 100, reverse: true, read1: false };
    /// assert_eq!(key.encode(), "000000011000000642");
    /// ```
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn encode(&self) -> String {
        let position = (self.position + POSITION_BIAS).max(0) as u64;
        format!("{:08x}{:09x}{:x}", self.contig, position, self.orientation_bits())
    }

    /// Parses an encoded key.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn decode(s: &str) -> Option<Self> {
        if s.len() != ENCODED_LEN || !s.is_ascii() {
            return None;
        }
        let contig = u32::from_str_radix(&s[0..8], 16).ok()?;
        let position = u64::from_str_radix(&s[8..17], 16).ok()? as i64 - POSITION_BIAS;
        let bits = u8::from_str_radix(&s[17..18], 16).ok()?;
        if bits > 3 {
            return None;
        }
        Some(Self { contig, position, reverse: bits & 0b10 != 0, read1: bits & 0b01 != 0 })
    }

    fn orientation_bits(&self) -> u8 {
        (u8::from(self.reverse) << 1) | u8::from(self.read1)
    }

    /// Compares only contig and position, the part of the key every sort order agrees on.
    #[must_use]
    pub fn cmp_locus(&self, other: &Self) -> Ordering {
        (self.contig, self.position).cmp(&(other.contig, other.position))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_locus(other).then_with(|| self.orientation_bits().cmp(&other.orientation_bits()))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
