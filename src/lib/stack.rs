//! Grouping of a key-ordered stream into candidate-duplicate stacks.
//!
//! The builder keeps one open [`Stack`] anchored at the key of its first record. A record
//! joins the open stack when it is on the same contig and strand as the anchor and its
//! position is within `tolerance` of the anchor position. Any other record seals the open
//! stack and anchors a new one. The end of the stream seals the last stack.
//!
//! Unmapped, secondary, supplementary and QC-failed records never join a stack; they are
//! yielded as [`StackItem::PassThrough`] as soon as they are read.

use std::collections::VecDeque;
use std::io;

use anyhow::Result;
use noodles::sam::alignment::record_buf::RecordBuf;

use crate::errors::RescueError;
use crate::sam::{SORT_KEY, query_name, string_tag};
use crate::sort_key::{SortKey, SortKeyScheme};

/// Default maximum distance between a record and its stack anchor.
pub const DEFAULT_TOLERANCE: u32 = 2;

/// Options for stack building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackConfig {
    /// Maximum absolute position difference from the anchor.
    pub tolerance: u32,
    /// Scheme used when a record carries no `SK` tag.
    pub scheme: SortKeyScheme,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self { tolerance: DEFAULT_TOLERANCE, scheme: SortKeyScheme::Unclipped }
    }
}

/// Records grouped under one anchor key.
///
/// Members are stored in arrival order and addressed by index.
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    anchor: SortKey,
    records: Vec<RecordBuf>,
}

impl Stack {
    /// Opens a stack with its anchoring record.
    #[must_use]
    pub fn new(anchor: SortKey, record: RecordBuf) -> Self {
        Self { anchor, records: vec![record] }
    }

    #[must_use]
    pub fn anchor(&self) -> SortKey {
        self.anchor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[RecordBuf] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<RecordBuf> {
        self.records
    }

    /// True if a record with `key` may join this stack.
    #[must_use]
    pub fn accepts(&self, key: &SortKey, tolerance: u32) -> bool {
        key.contig == self.anchor.contig
            && key.reverse == self.anchor.reverse
            && key.position.abs_diff(self.anchor.position) <= u64::from(tolerance)
    }

    fn push(&mut self, record: RecordBuf) {
        self.records.push(record);
    }
}

/// One unit of stack-builder output.
#[derive(Debug, Clone, PartialEq)]
pub enum StackItem {
    /// A record written unchanged.
    PassThrough(RecordBuf),
    /// A sealed stack ready for collapsing.
    Stack(Stack),
}

/// True for records that may be grouped into stacks.
#[must_use]
pub fn is_stackable(record: &RecordBuf) -> bool {
    let flags = record.flags();
    !(flags.is_unmapped() || flags.is_secondary() || flags.is_supplementary() || flags.is_qc_fail())
        && record.reference_sequence_id().is_some()
}

/// Incremental stack builder.
#[derive(Debug)]
pub struct StackBuilder {
    config: StackConfig,
    open: Option<Stack>,
    last_key: Option<SortKey>,
}

impl StackBuilder {
    #[must_use]
    pub fn new(config: StackConfig) -> Self {
        Self { config, open: None, last_key: None }
    }

    /// Key of a record: the decoded `SK` tag when present, otherwise computed.
    ///
    /// # Errors
    /// Returns [`RescueError::UnsortedInput`] if the `SK` tag cannot be decoded.
    pub fn key_of(&self, record: &RecordBuf) -> crate::errors::Result<SortKey> {
        match string_tag(record, SORT_KEY) {
            Some(encoded) => std::str::from_utf8(encoded)
                .ok()
                .and_then(SortKey::decode)
                .ok_or_else(|| RescueError::UnsortedInput {
                    reason: format!("malformed sort key '{encoded}' on read '{}'", query_name(record)),
                }),
            None => Ok(SortKey::from_record(record, self.config.scheme)),
        }
    }

    /// Adds a stackable record, returning the stack it sealed, if any.
    ///
    /// # Errors
    /// Returns [`RescueError::UnsortedInput`] if the record's contig and position precede
    /// those of the previous record.
    pub fn push(&mut self, record: RecordBuf) -> crate::errors::Result<Option<Stack>> {
        let key = self.key_of(&record)?;
        if let Some(last) = &self.last_key {
            if key.cmp_locus(last).is_lt() {
                return Err(RescueError::UnsortedInput {
                    reason: format!(
                        "read '{}' at {}:{} follows {}:{}",
                        query_name(&record),
                        key.contig,
                        key.position,
                        last.contig,
                        last.position
                    ),
                });
            }
        }
        self.last_key = Some(key);

        match &mut self.open {
            Some(stack) if stack.accepts(&key, self.config.tolerance) => {
                stack.push(record);
                Ok(None)
            }
            open => Ok(open.replace(Stack::new(key, record))),
        }
    }

    /// Seals and returns the open stack.
    pub fn finish(&mut self) -> Option<Stack> {
        self.open.take()
    }
}

/// Iterator adapter turning a record stream into [`StackItem`]s.
pub struct Stacks<I> {
    records: I,
    builder: StackBuilder,
    ready: VecDeque<StackItem>,
    exhausted: bool,
}

impl<I> Stacks<I>
where
    I: Iterator<Item = io::Result<RecordBuf>>,
{
    pub fn new(records: I, config: StackConfig) -> Self {
        Self { records, builder: StackBuilder::new(config), ready: VecDeque::new(), exhausted: false }
    }
}

impl<I> Iterator for Stacks<I>
where
    I: Iterator<Item = io::Result<RecordBuf>>,
{
    type Item = Result<StackItem>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(Ok(item));
            }
            if self.exhausted {
                return None;
            }
            match self.records.next() {
                Some(Err(e)) => {
                    self.exhausted = true;
                    return Some(Err(e.into()));
                }
                Some(Ok(record)) if !is_stackable(&record) => {
                    self.ready.push_back(StackItem::PassThrough(record));
                }
                Some(Ok(record)) => match self.builder.push(record) {
                    Ok(Some(sealed)) => self.ready.push_back(StackItem::Stack(sealed)),
                    Ok(None) => {}
                    Err(e) => {
                        self.exhausted = true;
                        return Some(Err(e.into()));
                    }
                },
                None => {
                    self.exhausted = true;
                    if let Some(last) = self.builder.finish() {
                        self.ready.push_back(StackItem::Stack(last));
                    }
                }
            }
        }
    }
}
