//! Builders for constructing SAM/BAM records in tests.
//!
//! ```rust
//! use umirescue_lib::sam::builder::{RecordBuilder, RecordPairBuilder};
//!
//! let record = RecordBuilder::mapped_read()
//!     .name("read1")
//!     .sequence("ACGTACGT")
//!     .alignment_start(100)
//!     .build();
//! assert_eq!(record.reference_sequence_id(), Some(0));
//!
//! let (r1, r2) = RecordPairBuilder::new()
//!     .name("pair1")
//!     .r1_start(100)
//!     .r2_start(200)
//!     .build();
//! assert!(r1.flags().is_first_segment());
//! assert!(r2.flags().is_reverse_complemented());
//! ```

use noodles::core::Position;
use noodles::sam::Header;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::MappingQuality;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value as BufValue;
use noodles::sam::alignment::record_buf::{QualityScores, RecordBuf, Sequence};
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::ReferenceSequence;
use std::num::NonZeroUsize;

/// Base quality used when none is supplied.
pub const DEFAULT_BASE_QUALITY: u8 = 30;

/// Length of each reference sequence in [`test_header`].
pub const REFERENCE_LENGTH: usize = 1_000_000;

/// Header with `chr1`..`chrN` reference sequences.
///
/// # Panics
///
/// Panics if `REFERENCE_LENGTH` is zero.
#[must_use]
pub fn test_header(n_refs: usize) -> Header {
    let length = NonZeroUsize::new(REFERENCE_LENGTH).expect("reference length is non-zero");
    (1..=n_refs)
        .fold(Header::builder(), |builder, i| {
            builder.add_reference_sequence(format!("chr{i}"), Map::<ReferenceSequence>::new(length))
        })
        .build()
}

/// Builder for a single record.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    name: Option<Vec<u8>>,
    flags: Flags,
    reference_sequence_id: Option<usize>,
    alignment_start: Option<usize>,
    mapping_quality: Option<u8>,
    cigar: Option<String>,
    sequence: Vec<u8>,
    qualities: Vec<u8>,
    tags: Vec<(Tag, BufValue)>,
    mate_reference_sequence_id: Option<usize>,
    mate_alignment_start: Option<usize>,
    template_length: Option<i32>,
}

impl RecordBuilder {
    /// Creates a new builder with no fields set and mapping quality 60.
    #[must_use]
    pub fn new() -> Self {
        Self { mapping_quality: Some(60), ..Self::default() }
    }

    /// Creates a builder for a read mapped to reference 0.
    #[must_use]
    pub fn mapped_read() -> Self {
        Self { reference_sequence_id: Some(0), ..Self::new() }
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.as_bytes().to_vec());
        self
    }

    #[must_use]
    pub fn sequence(mut self, seq: &str) -> Self {
        self.sequence = seq.as_bytes().to_vec();
        self
    }

    /// Sets raw Phred quality scores.
    #[must_use]
    pub fn qualities(mut self, quals: &[u8]) -> Self {
        self.qualities = quals.to_vec();
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn paired(mut self, paired: bool) -> Self {
        self.flags.set(Flags::SEGMENTED, paired);
        self
    }

    /// Marks the record as read 1 (`true`) or read 2 (`false`). Implies paired.
    #[must_use]
    pub fn first_segment(mut self, is_first: bool) -> Self {
        self.flags.set(Flags::SEGMENTED, true);
        self.flags.set(Flags::FIRST_SEGMENT, is_first);
        self.flags.set(Flags::LAST_SEGMENT, !is_first);
        self
    }

    #[must_use]
    pub fn unmapped(mut self, unmapped: bool) -> Self {
        self.flags.set(Flags::UNMAPPED, unmapped);
        self
    }

    #[must_use]
    pub fn reverse_complement(mut self, reverse: bool) -> Self {
        self.flags.set(Flags::REVERSE_COMPLEMENTED, reverse);
        self
    }

    #[must_use]
    pub fn mate_reverse_complement(mut self, reverse: bool) -> Self {
        self.flags.set(Flags::MATE_REVERSE_COMPLEMENTED, reverse);
        self
    }

    #[must_use]
    pub fn mate_unmapped(mut self, unmapped: bool) -> Self {
        self.flags.set(Flags::MATE_UNMAPPED, unmapped);
        self
    }

    #[must_use]
    pub fn secondary(mut self, secondary: bool) -> Self {
        self.flags.set(Flags::SECONDARY, secondary);
        self
    }

    #[must_use]
    pub fn supplementary(mut self, supplementary: bool) -> Self {
        self.flags.set(Flags::SUPPLEMENTARY, supplementary);
        self
    }

    #[must_use]
    pub fn qc_fail(mut self, qc_fail: bool) -> Self {
        self.flags.set(Flags::QC_FAIL, qc_fail);
        self
    }

    #[must_use]
    pub fn duplicate(mut self, duplicate: bool) -> Self {
        self.flags.set(Flags::DUPLICATE, duplicate);
        self
    }

    /// Sets the reference sequence ID (0-based).
    #[must_use]
    pub fn reference_sequence_id(mut self, id: usize) -> Self {
        self.reference_sequence_id = Some(id);
        self
    }

    /// Sets the alignment start position (1-based).
    #[must_use]
    pub fn alignment_start(mut self, pos: usize) -> Self {
        self.alignment_start = Some(pos);
        self
    }

    #[must_use]
    pub fn mapping_quality(mut self, mapq: u8) -> Self {
        self.mapping_quality = Some(mapq);
        self
    }

    #[must_use]
    pub fn cigar(mut self, cigar: &str) -> Self {
        self.cigar = Some(cigar.to_string());
        self
    }

    #[must_use]
    pub fn mate_reference_sequence_id(mut self, id: usize) -> Self {
        self.mate_reference_sequence_id = Some(id);
        self
    }

    #[must_use]
    pub fn mate_alignment_start(mut self, pos: usize) -> Self {
        self.mate_alignment_start = Some(pos);
        self
    }

    #[must_use]
    pub fn template_length(mut self, tlen: i32) -> Self {
        self.template_length = Some(tlen);
        self
    }

    /// Adds an aux tag. Tags that are not two bytes long are ignored.
    #[must_use]
    pub fn tag<V: Into<BufValue>>(mut self, tag: &str, value: V) -> Self {
        if let [a, b] = tag.as_bytes() {
            self.tags.push((Tag::new(*a, *b), value.into()));
        }
        self
    }

    /// Builds the record.
    ///
    /// A CIGAR without a sequence generates an `ACGT...` sequence of the right length; a
    /// sequence without a CIGAR on a mapped record generates an all-match CIGAR.
    ///
    /// # Panics
    ///
    /// Panics on an invalid CIGAR string or a zero alignment start.
    #[must_use]
    pub fn build(self) -> RecordBuf {
        let mut record = RecordBuf::default();

        if let Some(name) = self.name {
            *record.name_mut() = Some(name.into());
        }
        *record.flags_mut() = self.flags;

        *record.reference_sequence_id_mut() = self.reference_sequence_id;
        if let Some(pos) = self.alignment_start {
            *record.alignment_start_mut() =
                Some(Position::try_from(pos).expect("alignment_start must be >= 1"));
        }
        *record.mate_reference_sequence_id_mut() = self.mate_reference_sequence_id;
        if let Some(pos) = self.mate_alignment_start {
            *record.mate_alignment_start_mut() =
                Some(Position::try_from(pos).expect("mate_alignment_start must be >= 1"));
        }
        if let Some(tlen) = self.template_length {
            *record.template_length_mut() = tlen;
        }
        if let Some(mapq) = self.mapping_quality.filter(|_| !self.flags.is_unmapped()) {
            *record.mapping_quality_mut() = MappingQuality::new(mapq);
        }

        let mapped = self.reference_sequence_id.is_some() && !self.flags.is_unmapped();
        let (ops, sequence) = match (self.cigar, self.sequence.is_empty()) {
            (Some(cigar), true) => {
                let ops = parse_cigar(&cigar);
                let seq = b"ACGT".iter().copied().cycle().take(cigar_read_length(&ops)).collect();
                (ops, seq)
            }
            (Some(cigar), false) => (parse_cigar(&cigar), self.sequence),
            (None, false) if mapped => {
                (vec![Op::new(Kind::Match, self.sequence.len())], self.sequence)
            }
            (None, _) => (Vec::new(), self.sequence),
        };
        *record.cigar_mut() = ops.into_iter().collect();

        let qualities = if self.qualities.is_empty() {
            vec![DEFAULT_BASE_QUALITY; sequence.len()]
        } else {
            self.qualities
        };
        *record.sequence_mut() = Sequence::from(sequence);
        *record.quality_scores_mut() = QualityScores::from(qualities);

        for (tag, value) in self.tags {
            record.data_mut().insert(tag, value);
        }

        record
    }
}

/// Builder for a read pair with consistent mate fields.
///
/// Read 2 defaults to the reverse strand. Unset starts leave the read unmapped.
#[derive(Debug, Default)]
pub struct RecordPairBuilder {
    name: Option<String>,
    r1_sequence: Option<String>,
    r2_sequence: Option<String>,
    r1_qualities: Option<Vec<u8>>,
    r2_qualities: Option<Vec<u8>>,
    r1_start: Option<usize>,
    r2_start: Option<usize>,
    r1_cigar: Option<String>,
    r2_cigar: Option<String>,
    reference_sequence_id: usize,
    r1_reverse: bool,
    r2_reverse: bool,
    template_length: Option<i32>,
    r1_tags: Vec<(String, BufValue)>,
    r2_tags: Vec<(String, BufValue)>,
}

impl RecordPairBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { r2_reverse: true, ..Self::default() }
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn r1_sequence(mut self, seq: &str) -> Self {
        self.r1_sequence = Some(seq.to_string());
        self
    }

    #[must_use]
    pub fn r2_sequence(mut self, seq: &str) -> Self {
        self.r2_sequence = Some(seq.to_string());
        self
    }

    #[must_use]
    pub fn r1_qualities(mut self, quals: &[u8]) -> Self {
        self.r1_qualities = Some(quals.to_vec());
        self
    }

    #[must_use]
    pub fn r2_qualities(mut self, quals: &[u8]) -> Self {
        self.r2_qualities = Some(quals.to_vec());
        self
    }

    #[must_use]
    pub fn r1_start(mut self, start: usize) -> Self {
        self.r1_start = Some(start);
        self
    }

    #[must_use]
    pub fn r2_start(mut self, start: usize) -> Self {
        self.r2_start = Some(start);
        self
    }

    #[must_use]
    pub fn r1_cigar(mut self, cigar: &str) -> Self {
        self.r1_cigar = Some(cigar.to_string());
        self
    }

    #[must_use]
    pub fn r2_cigar(mut self, cigar: &str) -> Self {
        self.r2_cigar = Some(cigar.to_string());
        self
    }

    #[must_use]
    pub fn reference_sequence_id(mut self, id: usize) -> Self {
        self.reference_sequence_id = id;
        self
    }

    #[must_use]
    pub fn r1_reverse(mut self, reverse: bool) -> Self {
        self.r1_reverse = reverse;
        self
    }

    #[must_use]
    pub fn r2_reverse(mut self, reverse: bool) -> Self {
        self.r2_reverse = reverse;
        self
    }

    /// Sets the template length of read 1; read 2 gets the negated value.
    #[must_use]
    pub fn template_length(mut self, tlen: i32) -> Self {
        self.template_length = Some(tlen);
        self
    }

    /// Adds a tag to both reads.
    #[must_use]
    pub fn tag<V: Into<BufValue> + Clone>(mut self, tag: &str, value: V) -> Self {
        self.r1_tags.push((tag.to_string(), value.clone().into()));
        self.r2_tags.push((tag.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn r1_tag<V: Into<BufValue>>(mut self, tag: &str, value: V) -> Self {
        self.r1_tags.push((tag.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn r2_tag<V: Into<BufValue>>(mut self, tag: &str, value: V) -> Self {
        self.r2_tags.push((tag.to_string(), value.into()));
        self
    }

    /// Builds `(read1, read2)`.
    #[must_use]
    pub fn build(self) -> (RecordBuf, RecordBuf) {
        let name = self.name.unwrap_or_else(|| "pair".to_string());
        let tlen = self.template_length.unwrap_or(0);

        let mate = Mate {
            reference_sequence_id: self.reference_sequence_id,
            start: self.r2_start,
            reverse: self.r2_reverse,
        };
        let r1 = Self::build_read(
            RecordBuilder::new().name(&name).first_segment(true).template_length(tlen),
            self.reference_sequence_id,
            self.r1_start,
            self.r1_reverse,
            self.r1_sequence,
            self.r1_qualities,
            self.r1_cigar,
            &mate,
            self.r1_tags,
        );

        let mate = Mate {
            reference_sequence_id: self.reference_sequence_id,
            start: self.r1_start,
            reverse: self.r1_reverse,
        };
        let r2 = Self::build_read(
            RecordBuilder::new().name(&name).first_segment(false).template_length(-tlen),
            self.reference_sequence_id,
            self.r2_start,
            self.r2_reverse,
            self.r2_sequence,
            self.r2_qualities,
            self.r2_cigar,
            &mate,
            self.r2_tags,
        );

        (r1, r2)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_read(
        mut builder: RecordBuilder,
        reference_sequence_id: usize,
        start: Option<usize>,
        reverse: bool,
        sequence: Option<String>,
        qualities: Option<Vec<u8>>,
        cigar: Option<String>,
        mate: &Mate,
        tags: Vec<(String, BufValue)>,
    ) -> RecordBuf {
        let sequence = sequence.unwrap_or_else(|| "ACGTACGTAC".to_string());
        builder = builder.sequence(&sequence).reverse_complement(reverse);
        if let Some(quals) = qualities {
            builder = builder.qualities(&quals);
        }
        builder = match start {
            Some(pos) => builder
                .reference_sequence_id(reference_sequence_id)
                .alignment_start(pos)
                .cigar(&cigar.unwrap_or_else(|| format!("{}M", sequence.len()))),
            None => builder.unmapped(true),
        };
        builder = builder.mate_reverse_complement(mate.reverse);
        builder = match mate.start {
            Some(pos) => builder
                .mate_reference_sequence_id(mate.reference_sequence_id)
                .mate_alignment_start(pos),
            None => builder.mate_unmapped(true),
        };
        for (tag, value) in tags {
            builder = builder.tag(&tag, value);
        }
        builder.build()
    }
}

struct Mate {
    reference_sequence_id: usize,
    start: Option<usize>,
    reverse: bool,
}

/// Number of read bases consumed by a CIGAR.
#[must_use]
pub fn cigar_read_length(ops: &[Op]) -> usize {
    ops.iter()
        .filter(|op| {
            matches!(
                op.kind(),
                Kind::Match
                    | Kind::Insertion
                    | Kind::SoftClip
                    | Kind::SequenceMatch
                    | Kind::SequenceMismatch
            )
        })
        .map(|op| op.len())
        .sum()
}

/// Parses a CIGAR string into operations.
///
/// # Panics
///
/// Panics if the CIGAR string contains invalid characters or formatting.
#[must_use]
pub fn parse_cigar(cigar_str: &str) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut num_str = String::new();

    for c in cigar_str.chars() {
        if c.is_ascii_digit() {
            num_str.push(c);
            continue;
        }
        let len: usize = num_str.parse().expect("Invalid CIGAR: expected number");
        let kind = match c {
            'M' => Kind::Match,
            'I' => Kind::Insertion,
            'D' => Kind::Deletion,
            'N' => Kind::Skip,
            'S' => Kind::SoftClip,
            'H' => Kind::HardClip,
            'P' => Kind::Pad,
            '=' => Kind::SequenceMatch,
            'X' => Kind::SequenceMismatch,
            _ => panic!("Unknown CIGAR operation: {c}"),
        };
        ops.push(Op::new(kind, len));
        num_str.clear();
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cigar_generates_sequence() {
        let record = RecordBuilder::mapped_read().alignment_start(10).cigar("3S5M2I").build();
        assert_eq!(record.sequence().len(), 10);
        assert_eq!(record.quality_scores().as_ref(), vec![DEFAULT_BASE_QUALITY; 10].as_slice());
    }

    #[test]
    fn test_sequence_generates_cigar_only_when_mapped() {
        let mapped = RecordBuilder::mapped_read().sequence("ACGTA").alignment_start(1).build();
        assert_eq!(mapped.cigar().as_ref(), &[Op::new(Kind::Match, 5)]);

        let unmapped = RecordBuilder::new().sequence("ACGTA").unmapped(true).build();
        assert!(unmapped.cigar().as_ref().is_empty());
    }

    #[test]
    fn test_pair_mate_fields_are_mirrored() {
        let (r1, r2) = RecordPairBuilder::new()
            .name("p")
            .r1_start(100)
            .r2_start(250)
            .template_length(160)
            .tag("RX", "ACGT")
            .build();

        assert!(r1.flags().is_first_segment());
        assert!(r2.flags().is_last_segment());
        assert!(r1.flags().is_mate_reverse_complemented());
        assert!(r2.flags().is_reverse_complemented());
        assert_eq!(r1.mate_alignment_start().map(usize::from), Some(250));
        assert_eq!(r2.mate_alignment_start().map(usize::from), Some(100));
        assert_eq!(r1.template_length(), 160);
        assert_eq!(r2.template_length(), -160);
        assert!(r2.data().get(&Tag::new(b'R', b'X')).is_some());
    }

    #[test]
    fn test_pair_unmapped_mate() {
        let (r1, r2) = RecordPairBuilder::new().r1_start(100).build();
        assert!(r1.flags().is_mate_unmapped());
        assert!(r2.flags().is_unmapped());
    }

    #[test]
    fn test_header_has_references() {
        let header = test_header(2);
        assert_eq!(header.reference_sequences().len(), 2);
        assert!(header.reference_sequences().contains_key(b"chr2".as_slice()));
    }
}
