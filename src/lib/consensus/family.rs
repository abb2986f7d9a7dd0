//! Partitioning of one sealed stack into consensus sets.

use std::cmp::Ordering;

use ahash::AHashMap;
use noodles::sam::alignment::record_buf::RecordBuf;

use super::policy::QualityPolicy;
use super::set::ConsensusSet;
use crate::stack::Stack;

/// Partition key: read length and whether the record is read 1.
type PartitionKey = (usize, bool);

/// All consensus sets built from one stack, together with the stack's records.
///
/// Records are ordered by query name (unnamed records last) before partitioning, so sets
/// and their founders are chosen deterministically.
#[derive(Debug)]
pub struct ConsensusFamily {
    records: Vec<RecordBuf>,
    sets: Vec<ConsensusSet>,
}

impl ConsensusFamily {
    /// Builds the family for a sealed stack.
    #[must_use]
    pub fn from_stack(stack: Stack) -> Self {
        let mut records = stack.into_records();
        records.sort_by(compare_names);

        let mut partitions: AHashMap<PartitionKey, usize> = AHashMap::new();
        let mut sets: Vec<ConsensusSet> = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let key = (record.sequence().len(), record.flags().is_first_segment());
            match partitions.get(&key) {
                Some(&set) => sets[set].add(record),
                None => {
                    partitions.insert(key, sets.len());
                    sets.push(ConsensusSet::new(index, record));
                }
            }
        }

        Self { records, sets }
    }

    /// Records of the stack, in name order.
    #[must_use]
    pub fn records(&self) -> &[RecordBuf] {
        &self.records
    }

    /// Sets in order of their founders.
    #[must_use]
    pub fn sets(&self) -> &[ConsensusSet] {
        &self.sets
    }

    /// Emits one consensus record per set and discards the tables.
    #[must_use]
    pub fn emit(self, policy: &QualityPolicy) -> Vec<RecordBuf> {
        self.sets.iter().map(|set| set.emit(&self.records[set.founder()], policy)).collect()
    }
}

fn compare_names(a: &RecordBuf, b: &RecordBuf) -> Ordering {
    match (a.name(), b.name()) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
