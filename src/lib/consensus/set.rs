//! Per-partition vote tables.

use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::data::field::value::Array;
use noodles::sam::alignment::record_buf::{QualityScores, RecordBuf, Sequence};

use super::policy::{NO_CALL_QUALITY, QualityPolicy};
use crate::sam::{
    AGREEMENT_COUNTS, AGREEMENT_QUALITY_SUMS, FAMILY_SIZE, MATE_READ_LENGTH, MATE_UNCLIPPED_START,
    SELF_UNCLIPPED_START, SORT_KEY, int_tag, unclipped_start,
};

/// Symbols in vote-table column order; ties resolve to the earlier symbol.
pub const BASES: [u8; 5] = *b"ACGTN";

const N_INDEX: usize = 4;

/// Column of a base in the vote tables. Anything other than `ACGT` counts as `N`.
#[must_use]
pub fn base_index(base: u8) -> usize {
    match base.to_ascii_uppercase() {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' => 3,
        _ => N_INDEX,
    }
}

/// Name shared by a consensus read and its mate's consensus.
///
/// Read 1 lists its own coordinates first and read 2 lists its mate's first, so both mates
/// of one fragment synthesize the same string.
#[must_use]
pub fn synthesize_name(record: &RecordBuf) -> String {
    let flags = record.flags();
    let own_start = int_tag(record, SELF_UNCLIPPED_START)
        .or_else(|| unclipped_start(record).map(i64::from))
        .unwrap_or(0);
    let mate_start = int_tag(record, MATE_UNCLIPPED_START).unwrap_or(-1);
    let own_contig = record.reference_sequence_id().map_or(-1, |id| id as i64);
    let mate_contig = record.mate_reference_sequence_id().map_or(-1, |id| id as i64);
    let own_reverse = u8::from(flags.is_reverse_complemented());
    let mate_reverse = u8::from(flags.is_mate_reverse_complemented());
    let own_length = record.sequence().len() as i64;
    let mate_length = int_tag(record, MATE_READ_LENGTH).unwrap_or(0);

    if flags.is_last_segment() && !flags.is_first_segment() {
        format!(
            "collapsed:{mate_start}:{own_start}:{mate_contig}:{own_contig}:{mate_reverse}:{own_reverse}:{mate_length}:{own_length}"
        )
    } else {
        format!(
            "collapsed:{own_start}:{mate_start}:{own_contig}:{mate_contig}:{own_reverse}:{mate_reverse}:{own_length}:{mate_length}"
        )
    }
}

/// Consensus bases and per-position statistics for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalledConsensus {
    pub bases: Vec<u8>,
    pub qualities: Vec<u8>,
    /// Contributors agreeing with the called base.
    pub agreeing: Vec<i32>,
    /// Summed quality of the agreeing contributors.
    pub agreeing_quality_sums: Vec<i32>,
}

/// Vote and quality tables for records of one length and one mate number.
#[derive(Debug, Clone)]
pub struct ConsensusSet {
    read_length: usize,
    is_read1: bool,
    name: String,
    founder: usize,
    count: u32,
    votes: Vec<u32>,
    quality_sums: Vec<u32>,
    max_quality: Vec<u8>,
}

impl ConsensusSet {
    /// Creates a set from its founding record, which is also its first contributor.
    #[must_use]
    pub fn new(founder_index: usize, founder: &RecordBuf) -> Self {
        let read_length = founder.sequence().len();
        let mut set = Self {
            read_length,
            is_read1: founder.flags().is_first_segment(),
            name: synthesize_name(founder),
            founder: founder_index,
            count: 0,
            votes: vec![0; read_length * BASES.len()],
            quality_sums: vec![0; read_length * BASES.len()],
            max_quality: vec![0; read_length],
        };
        set.add(founder);
        set
    }

    /// Adds one record's bases and qualities to the tables.
    ///
    /// # Panics
    /// Panics if the record length differs from the set's read length.
    pub fn add(&mut self, record: &RecordBuf) {
        let bases = record.sequence().as_ref();
        let quals = record.quality_scores().as_ref();
        assert_eq!(bases.len(), self.read_length, "record length does not match consensus set");

        for (pos, &base) in bases.iter().enumerate() {
            let qual = quals.get(pos).copied().unwrap_or(0);
            let cell = pos * BASES.len() + base_index(base);
            self.votes[cell] += 1;
            self.quality_sums[cell] += u32::from(qual);
            self.max_quality[pos] = self.max_quality[pos].max(qual);
        }
        self.count += 1;
    }

    #[must_use]
    pub fn read_length(&self) -> usize {
        self.read_length
    }

    #[must_use]
    pub fn is_read1(&self) -> bool {
        self.is_read1
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arena index of the founding record.
    #[must_use]
    pub fn founder(&self) -> usize {
        self.founder
    }

    /// Number of contributing records.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Votes for `base` at `pos`.
    #[must_use]
    pub fn votes(&self, pos: usize, base: u8) -> u32 {
        self.votes[pos * BASES.len() + base_index(base)]
    }

    /// Calls the consensus base and quality at every position.
    #[must_use]
    pub fn call(&self, policy: &QualityPolicy) -> CalledConsensus {
        let mut called = CalledConsensus {
            bases: Vec::with_capacity(self.read_length),
            qualities: Vec::with_capacity(self.read_length),
            agreeing: Vec::with_capacity(self.read_length),
            agreeing_quality_sums: Vec::with_capacity(self.read_length),
        };

        for pos in 0..self.read_length {
            let row = pos * BASES.len();
            let votes = &self.votes[row..row + BASES.len()];
            let mut best = 0;
            for (i, &v) in votes.iter().enumerate().skip(1) {
                if v > votes[best] {
                    best = i;
                }
            }
            let best_votes = votes[best];
            let best_sum = self.quality_sums[row + best];

            called.bases.push(BASES[best]);
            called.qualities.push(if best == N_INDEX {
                NO_CALL_QUALITY
            } else {
                policy.quality(best_votes, best_sum, self.max_quality[pos])
            });
            called.agreeing.push(best_votes as i32);
            called.agreeing_quality_sums.push(best_sum as i32);
        }
        called
    }

    /// Builds the consensus record from the founding record's alignment fields.
    ///
    /// The founder's sort key is dropped; it described the founder alone.
    #[must_use]
    pub fn emit(&self, founder: &RecordBuf, policy: &QualityPolicy) -> RecordBuf {
        let called = self.call(policy);
        let mut record = founder.clone();

        *record.name_mut() = Some(self.name.as_bytes().into());
        record.flags_mut().remove(Flags::DUPLICATE);
        *record.sequence_mut() = Sequence::from(called.bases);
        *record.quality_scores_mut() = QualityScores::from(called.qualities);

        let data = record.data_mut();
        data.remove(&SORT_KEY);
        data.insert(FAMILY_SIZE, Value::Int32(self.count as i32));
        data.insert(AGREEMENT_COUNTS, Value::Array(Array::Int32(called.agreeing)));
        data.insert(AGREEMENT_QUALITY_SUMS, Value::Array(Array::Int32(called.agreeing_quality_sums)));
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sam::builder::RecordBuilder;
    use rstest::rstest;

    fn read(seq: &str, quals: &[u8]) -> RecordBuf {
        RecordBuilder::mapped_read()
            .first_segment(true)
            .alignment_start(10)
            .sequence(seq)
            .qualities(quals)
            .build()
    }

    #[rstest]
    #[case(b'A', 0)]
    #[case(b'c', 1)]
    #[case(b'G', 2)]
    #[case(b't', 3)]
    #[case(b'N', 4)]
    #[case(b'R', 4)]
    fn test_base_index(#[case] base: u8, #[case] expected: usize) {
        assert_eq!(base_index(base), expected);
    }

    #[test]
    fn test_votes_and_qualities_accumulate() {
        let mut set = ConsensusSet::new(0, &read("AC", &[30, 20]));
        set.add(&read("AG", &[10, 40]));

        assert_eq!(set.count(), 2);
        assert_eq!(set.votes(0, b'A'), 2);
        assert_eq!(set.votes(1, b'C'), 1);
        assert_eq!(set.votes(1, b'G'), 1);

        let called = set.call(&QualityPolicy::default());
        assert_eq!(called.bases, b"AC");
        assert_eq!(called.agreeing, vec![2, 1]);
        assert_eq!(called.agreeing_quality_sums, vec![40, 20]);
        // Position 0: mean 20 + bonus 2, capped by max 30 + 10.
        assert_eq!(called.qualities[0], 22);
        assert_eq!(called.qualities[1], 20);
    }

    #[test]
    fn test_ties_resolve_in_symbol_order() {
        let mut set = ConsensusSet::new(0, &read("TN", &[30, 30]));
        set.add(&read("GA", &[30, 30]));
        let called = set.call(&QualityPolicy::default());
        assert_eq!(called.bases, b"GA");
    }

    #[test]
    fn test_all_n_position_gets_no_call_quality() {
        let set = ConsensusSet::new(0, &read("NA", &[35, 35]));
        let called = set.call(&QualityPolicy::default());
        assert_eq!(called.bases, b"NA");
        assert_eq!(called.qualities, vec![NO_CALL_QUALITY, 35]);
    }

    #[test]
    #[should_panic(expected = "record length does not match")]
    fn test_length_mismatch_panics() {
        let mut set = ConsensusSet::new(0, &read("ACGT", &[30; 4]));
        set.add(&read("ACG", &[30; 3]));
    }

    #[test]
    fn test_mate_names_match() {
        let r1 = RecordBuilder::mapped_read()
            .first_segment(true)
            .alignment_start(100)
            .mate_reference_sequence_id(0)
            .mate_alignment_start(300)
            .mate_reverse_complement(true)
            .sequence("ACGTACGT")
            .tag("SU", 98_i32)
            .tag("MU", 310_i32)
            .tag("LM", 12_i32)
            .build();
        let r2 = RecordBuilder::mapped_read()
            .first_segment(false)
            .alignment_start(300)
            .reverse_complement(true)
            .mate_reference_sequence_id(0)
            .mate_alignment_start(100)
            .sequence("ACGTACGTACGT")
            .tag("SU", 310_i32)
            .tag("MU", 98_i32)
            .tag("LM", 8_i32)
            .build();
        assert_eq!(synthesize_name(&r1), "collapsed:98:310:0:0:0:1:8:12");
        assert_eq!(synthesize_name(&r1), synthesize_name(&r2));
    }

    #[test]
    fn test_emit_uses_founder_alignment() {
        let founder = RecordBuilder::mapped_read()
            .name("orig")
            .first_segment(true)
            .alignment_start(10)
            .sequence("ACGT")
            .duplicate(true)
            .tag("SU", 10_i32)
            .build();
        let set = ConsensusSet::new(0, &founder);
        let record = set.emit(&founder, &QualityPolicy::default());

        assert_eq!(record.name().map(|n| n.to_vec()), Some(set.name().as_bytes().to_vec()));
        assert!(!record.flags().is_duplicate());
        assert_eq!(record.alignment_start(), founder.alignment_start());
        assert_eq!(record.cigar(), founder.cigar());
        assert_eq!(int_tag(&record, FAMILY_SIZE), Some(1));
        assert_eq!(int_tag(&record, SELF_UNCLIPPED_START), Some(10));
        assert_eq!(record.sequence().as_ref(), b"ACGT");
        assert_eq!(record.quality_scores().as_ref(), &[30_u8; 4]);
    }

    #[test]
    fn test_emit_drops_founder_sort_key() {
        let founder = RecordBuilder::mapped_read()
            .first_segment(true)
            .alignment_start(10)
            .sequence("ACGT")
            .tag("SU", 10_i32)
            .tag("SK", "000000001000000090")
            .build();
        let mut set = ConsensusSet::new(0, &founder);
        set.add(&founder);
        let record = set.emit(&founder, &QualityPolicy::default());

        assert!(record.data().get(&SORT_KEY).is_none());
        assert_eq!(int_tag(&record, FAMILY_SIZE), Some(2));
        assert_eq!(int_tag(&record, SELF_UNCLIPPED_START), Some(10));
    }
}
