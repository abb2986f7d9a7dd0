//! Record-level helpers: CIGAR-derived coordinates, base composition and typed tag access.

use bstr::BStr;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::alignment::record_buf::data::field::Value;

/// True for CIGAR operations that consume both read and reference bases.
#[must_use]
pub fn is_aligned_op(kind: Kind) -> bool {
    matches!(kind, Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch)
}

/// Sum of the lengths of all operations preceding the first aligned operation.
///
/// Soft clips, hard clips and leading insertions all count. A CIGAR with no aligned
/// operation returns the sum of every operation.
#[must_use]
pub fn leading_clip_length(record: &RecordBuf) -> usize {
    record
        .cigar()
        .as_ref()
        .iter()
        .take_while(|op| !is_aligned_op(op.kind()))
        .map(|op| op.len())
        .sum()
}

/// Sum of the lengths of all operations following the last aligned operation.
#[must_use]
pub fn trailing_clip_length(record: &RecordBuf) -> usize {
    record
        .cigar()
        .as_ref()
        .iter()
        .rev()
        .take_while(|op| !is_aligned_op(op.kind()))
        .map(|op| op.len())
        .sum()
}

/// Unclipped start of a mapped record, in 1-based coordinates.
///
/// Forward-strand records subtract the leading clip from the alignment start; reverse-strand
/// records add the trailing clip. The result may be zero or negative when clipped bases
/// hang off the start of the contig. Returns `None` for unmapped records or records without
/// an alignment start.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
pub fn unclipped_start(record: &RecordBuf) -> Option<i32> {
    if record.flags().is_unmapped() {
        return None;
    }
    let start = usize::from(record.alignment_start()?) as i32;
    if record.flags().is_reverse_complemented() {
        Some(start + trailing_clip_length(record) as i32)
    } else {
        Some(start - leading_clip_length(record) as i32)
    }
}

/// Number of read bases covered by aligned operations.
#[must_use]
pub fn aligned_base_count(record: &RecordBuf) -> usize {
    record
        .cigar()
        .as_ref()
        .iter()
        .filter(|op| is_aligned_op(op.kind()))
        .map(|op| op.len())
        .sum()
}

/// Fraction of the read's bases that are aligned. Zero for records without bases.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fraction_aligned(record: &RecordBuf) -> f32 {
    let len = record.sequence().len();
    if len == 0 {
        return 0.0;
    }
    aligned_base_count(record).min(len) as f32 / len as f32
}

/// Fraction of bases that are not `N`. Records without bases count as fully unambiguous.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn unambiguous_fraction(record: &RecordBuf) -> f64 {
    let bases = record.sequence().as_ref();
    if bases.is_empty() {
        return 1.0;
    }
    let n_count = bases.iter().filter(|&&b| b == b'N' || b == b'n').count();
    (bases.len() - n_count) as f64 / bases.len() as f64
}

/// Integer value of a tag, regardless of the integer width it was stored with.
#[must_use]
pub fn int_tag(record: &RecordBuf, tag: Tag) -> Option<i64> {
    record.data().get(&tag).and_then(Value::as_int)
}

/// String value of a tag.
#[must_use]
pub fn string_tag(record: &RecordBuf, tag: Tag) -> Option<&BStr> {
    match record.data().get(&tag) {
        Some(Value::String(s)) => Some(s.as_ref()),
        _ => None,
    }
}

/// Query name for diagnostics (`*` when absent).
#[must_use]
pub fn query_name(record: &RecordBuf) -> String {
    record.name().map_or_else(|| "*".to_string(), |n| String::from_utf8_lossy(n).to_string())
}
