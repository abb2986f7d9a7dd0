//! Assertion helpers for records written by umirescue.

#![allow(dead_code)]

use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::record_buf::data::field::value::Array;
use umirescue_lib::sam::{AGREEMENT_COUNTS, FAMILY_SIZE, SORT_KEY, int_tag, string_tag};

/// Asserts that a record has an integer tag with the given value.
///
/// # Panics
///
/// Panics if the tag is missing or has a different value.
pub fn assert_int_tag(record: &RecordBuf, tag: [u8; 2], expected: i64) {
    let value = int_tag(record, tag.into());
    assert_eq!(
        value,
        Some(expected),
        "{} tag mismatch for record {:?}",
        String::from_utf8_lossy(&tag),
        record.name()
    );
}

/// Family sizes of every consensus record, in output order.
pub fn family_sizes(records: &[RecordBuf]) -> Vec<i64> {
    records.iter().filter_map(|r| int_tag(r, FAMILY_SIZE)).collect()
}

/// Asserts that every record carries a well-formed sort key.
///
/// # Panics
///
/// Panics if a record lacks the `SK` tag or it has the wrong length.
pub fn assert_has_sort_keys(records: &[RecordBuf]) {
    for record in records {
        let key = string_tag(record, SORT_KEY).expect("Record should have SK tag");
        assert_eq!(key.len(), 18, "Unexpected SK {key} on {:?}", record.name());
    }
}

/// Asserts that the record's `FA` array holds `expected`.
///
/// # Panics
///
/// Panics if the tag is missing or not an `Int32` array.
pub fn assert_agreement_counts(record: &RecordBuf, expected: &[i32]) {
    match record.data().get(&AGREEMENT_COUNTS) {
        Some(Value::Array(Array::Int32(values))) => assert_eq!(values.as_slice(), expected),
        other => panic!("FA tag should be an Int32 array, got {other:?}"),
    }
}
