//! Single-pass annotation of name-sorted reads.
//!
//! In paired mode records are consumed two at a time. Each mate receives its own unclipped
//! start (`SU`), its mate's unclipped start (`MU`), its mate's read length (`LM`) and a copy
//! of its mate's supplementary-alignment descriptor (`ms`), so that after coordinate sorting
//! every record can be grouped without looking at its mate.
//!
//! Pairs are then checked against a reject predicate (explicit QC-fail or failed barcode QC,
//! minimum insert length, minimum fraction of unambiguous bases). Failing pairs are either
//! dropped or written with the QC-fail flag set on both mates.
//!
//! Secondary and supplementary records do not take part in pairing and are written
//! unchanged as soon as they are read.

use anyhow::Result;
use bstr::BString;
use log::debug;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::alignment::record_buf::data::field::Value;

use crate::errors::RescueError;
use crate::metrics::MarkMetrics;
use crate::progress::ProgressTracker;
use crate::sam::record_utils::{fraction_aligned, unambiguous_fraction};
use crate::sam::{
    BARCODE_PASS, FRACTION_ALIGNED, MATE_READ_LENGTH, MATE_SUPPLEMENTARY, MATE_UNCLIPPED_START,
    SELF_UNCLIPPED_START, SORT_KEY, SUPPLEMENTARY_ALIGNMENT, int_tag, query_name, string_tag,
    unclipped_start,
};
use crate::sort_key::{SortKey, SortKeyScheme};

/// Options controlling tagging and the reject predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggerConfig {
    /// Drop failing records instead of flagging them.
    pub remove_qcfail: bool,
    /// Minimum absolute template length; 0 disables the check.
    pub min_insert_length: u32,
    /// Minimum fraction of non-`N` bases per read; 0 disables the check.
    pub min_frac_unambiguous: f64,
    /// Write the fraction-aligned tag `AF` on paired reads.
    pub add_fraction_aligned: bool,
    /// Treat every record independently.
    pub single_end: bool,
    /// Also write the `SK` sort-key tag under this scheme.
    pub sort_key: Option<SortKeyScheme>,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            remove_qcfail: false,
            min_insert_length: 0,
            min_frac_unambiguous: 0.0,
            add_fraction_aligned: true,
            single_end: false,
            sort_key: None,
        }
    }
}

/// Why a pair or single read failed the reject predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// QC-fail flag already set, or barcode QC failed.
    QcFail,
    /// Template shorter than the minimum insert length.
    InsertLength,
    /// Too many ambiguous bases.
    Ambiguous,
}

/// Outcome of tagging one pair or single read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Passed every check.
    Pass,
    /// Failed a check and written with the QC-fail flag.
    Flagged(RejectReason),
    /// Failed a check and removed from the output.
    Dropped(RejectReason),
}

impl Verdict {
    /// True when the records should be written.
    #[must_use]
    pub fn is_written(&self) -> bool {
        !matches!(self, Self::Dropped(_))
    }
}

/// Stateful tagger accumulating [`MarkMetrics`].
#[derive(Debug)]
pub struct Tagger {
    config: TaggerConfig,
    metrics: MarkMetrics,
}

impl Tagger {
    /// Creates a tagger.
    #[must_use]
    pub fn new(config: TaggerConfig) -> Self {
        Self { config, metrics: MarkMetrics::default() }
    }

    #[must_use]
    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> &MarkMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn into_metrics(self) -> MarkMetrics {
        self.metrics
    }

    /// Tags both mates of a pair and applies the reject predicate to the pair as a whole.
    ///
    /// # Errors
    /// Returns [`RescueError::NameMismatch`] if the two records carry different names.
    pub fn tag_pair(
        &mut self,
        r1: &mut RecordBuf,
        r2: &mut RecordBuf,
    ) -> crate::errors::Result<Verdict> {
        if r1.name() != r2.name() {
            return Err(RescueError::NameMismatch {
                first: query_name(r1),
                second: query_name(r2),
            });
        }

        if fails_barcode_qc(r1) || fails_barcode_qc(r2) {
            set_qc_fail(r1);
            set_qc_fail(r2);
        }

        add_mate_tags(r1, r2, self.config.add_fraction_aligned);
        if let Some(scheme) = self.config.sort_key {
            add_sort_key(r1, scheme);
            add_sort_key(r2, scheme);
        }

        let verdict = self.judge(pair_reject_reason(r1, r2, &self.config));
        if let Verdict::Flagged(_) = verdict {
            set_qc_fail(r1);
            set_qc_fail(r2);
        }
        self.count(verdict, 2);
        Ok(verdict)
    }

    /// Tags a read on its own, writing `SU` but no mate tags.
    pub fn tag_single(&mut self, record: &mut RecordBuf) -> Verdict {
        if fails_barcode_qc(record) {
            set_qc_fail(record);
        }
        set_int_tag(record, SELF_UNCLIPPED_START, unclipped_start(record));
        if let Some(scheme) = self.config.sort_key {
            add_sort_key(record, scheme);
        }

        let verdict = self.judge(single_reject_reason(record, &self.config));
        if let Verdict::Flagged(_) = verdict {
            set_qc_fail(record);
        }
        self.count(verdict, 1);
        verdict
    }

    /// Tags a whole name-sorted stream, handing every written record to `write` in order.
    ///
    /// # Errors
    /// Returns an error if reading fails, a pair has mismatched names, the stream ends on an
    /// unpaired read, or `write` fails.
    pub fn run<I, W>(&mut self, records: I, progress: &ProgressTracker, mut write: W) -> Result<()>
    where
        I: IntoIterator<Item = std::io::Result<RecordBuf>>,
        W: FnMut(&RecordBuf) -> Result<()>,
    {
        let mut pending: Option<RecordBuf> = None;

        for result in records {
            let mut record = result?;
            self.metrics.total_records += 1;
            progress.log_if_needed(1);

            let flags = record.flags();
            if flags.is_secondary() || flags.is_supplementary() {
                self.metrics.passthrough_records += 1;
                write(&record)?;
                continue;
            }

            if self.config.single_end || !flags.is_segmented() {
                if self.tag_single(&mut record).is_written() {
                    write(&record)?;
                }
                continue;
            }

            match pending.take() {
                None => pending = Some(record),
                Some(mut first) => {
                    if self.tag_pair(&mut first, &mut record)?.is_written() {
                        write(&first)?;
                        write(&record)?;
                    }
                }
            }
        }

        if let Some(dangling) = pending {
            return Err(RescueError::UnpairedRead { name: query_name(&dangling) }.into());
        }
        debug!("Tagging finished: {:?}", self.metrics);
        Ok(())
    }

    fn judge(&self, reason: Option<RejectReason>) -> Verdict {
        match reason {
            None => Verdict::Pass,
            Some(reason) if self.config.remove_qcfail => Verdict::Dropped(reason),
            Some(reason) => Verdict::Flagged(reason),
        }
    }

    fn count(&mut self, verdict: Verdict, records: u64) {
        let reason = match verdict {
            Verdict::Pass => {
                self.metrics.passed_records += records;
                return;
            }
            Verdict::Flagged(reason) => {
                self.metrics.flagged_records += records;
                reason
            }
            Verdict::Dropped(reason) => {
                self.metrics.dropped_records += records;
                reason
            }
        };
        match reason {
            RejectReason::QcFail => self.metrics.failed_qc += records,
            RejectReason::InsertLength => self.metrics.failed_insert_length += records,
            RejectReason::Ambiguous => self.metrics.failed_unambiguous_fraction += records,
        }
    }
}

/// Writes the cross-mate tags on both reads of a pair. `AF` is written only when
/// `add_fraction_aligned` is set.
pub fn add_mate_tags(r1: &mut RecordBuf, r2: &mut RecordBuf, add_fraction_aligned: bool) {
    let (u1, u2) = (unclipped_start(r1), unclipped_start(r2));
    set_int_tag(r1, SELF_UNCLIPPED_START, u1);
    set_int_tag(r1, MATE_UNCLIPPED_START, u2);
    set_int_tag(r2, SELF_UNCLIPPED_START, u2);
    set_int_tag(r2, MATE_UNCLIPPED_START, u1);
    if add_fraction_aligned {
        let (af1, af2) = (fraction_aligned(r1), fraction_aligned(r2));
        r1.data_mut().insert(FRACTION_ALIGNED, Value::Float(af1));
        r2.data_mut().insert(FRACTION_ALIGNED, Value::Float(af2));
    }

    let (len1, len2) = (r1.sequence().len(), r2.sequence().len());
    set_int_tag(r1, MATE_READ_LENGTH, i32::try_from(len2).ok());
    set_int_tag(r2, MATE_READ_LENGTH, i32::try_from(len1).ok());

    let sa1 = string_tag(r1, SUPPLEMENTARY_ALIGNMENT).map(ToOwned::to_owned);
    let sa2 = string_tag(r2, SUPPLEMENTARY_ALIGNMENT).map(ToOwned::to_owned);
    set_mate_supplementary(r1, sa2);
    set_mate_supplementary(r2, sa1);
}

fn set_mate_supplementary(record: &mut RecordBuf, sa: Option<BString>) {
    match sa {
        Some(sa) => {
            record.data_mut().insert(MATE_SUPPLEMENTARY, Value::String(sa));
        }
        None => {
            record.data_mut().remove(&MATE_SUPPLEMENTARY);
        }
    }
}

/// First failing check of a pair, if any.
#[must_use]
pub fn pair_reject_reason(
    r1: &RecordBuf,
    r2: &RecordBuf,
    config: &TaggerConfig,
) -> Option<RejectReason> {
    if r1.flags().is_qc_fail() || r2.flags().is_qc_fail() {
        return Some(RejectReason::QcFail);
    }
    if config.min_insert_length > 0
        && r1.template_length().unsigned_abs() < config.min_insert_length
    {
        return Some(RejectReason::InsertLength);
    }
    if config.min_frac_unambiguous > 0.0
        && (unambiguous_fraction(r1) < config.min_frac_unambiguous
            || unambiguous_fraction(r2) < config.min_frac_unambiguous)
    {
        return Some(RejectReason::Ambiguous);
    }
    None
}

/// First failing check of a single read. Insert length does not apply.
#[must_use]
pub fn single_reject_reason(record: &RecordBuf, config: &TaggerConfig) -> Option<RejectReason> {
    if record.flags().is_qc_fail() {
        Some(RejectReason::QcFail)
    } else if config.min_frac_unambiguous > 0.0
        && unambiguous_fraction(record) < config.min_frac_unambiguous
    {
        Some(RejectReason::Ambiguous)
    } else {
        None
    }
}

/// A read fails barcode QC when its `FP` tag is present and zero.
#[must_use]
pub fn fails_barcode_qc(record: &RecordBuf) -> bool {
    int_tag(record, BARCODE_PASS) == Some(0)
}

fn add_sort_key(record: &mut RecordBuf, scheme: SortKeyScheme) {
    let key = SortKey::from_record(record, scheme).encode();
    record.data_mut().insert(SORT_KEY, Value::String(key.into()));
}

fn set_qc_fail(record: &mut RecordBuf) {
    record.flags_mut().insert(Flags::QC_FAIL);
}

fn set_int_tag(record: &mut RecordBuf, tag: Tag, value: Option<i32>) {
    match value {
        Some(v) => {
            record.data_mut().insert(tag, Value::Int32(v));
        }
        None => {
            record.data_mut().remove(&tag);
        }
    }
}
