//! End-to-end tests for the umirescue binary.
//!
//! Each test writes a small BAM, runs one subcommand and inspects the output.

mod helpers;
mod test_collapse_command;
mod test_mark_command;
mod test_rescue_command;
