//! CLI command implementations for umirescue.
//!
//! - [`mark`] - Tag name-sorted reads with unclipped starts, mate info and a sort key
//! - [`collapse`] - Collapse key-sorted candidate duplicates into consensus reads
//! - [`rescue`] - Run both around an external `samtools sort`, connected by named pipes

#![allow(
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

pub mod collapse;
pub mod command;
pub mod common;
pub mod mark;
pub mod rescue;
