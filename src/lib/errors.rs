//! Custom error types for duplicate-rescue operations.
//!
//! Errors fall into three fatal families: usage errors (bad parameters or missing inputs),
//! contract violations (input that is not ordered the way a stage requires), and resource
//! errors (pipes and the external sort subprocess). Records that fail QC predicates are
//! not errors; they are counted and dropped or flagged by the tagger.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Result type alias for duplicate-rescue operations
pub type Result<T> = std::result::Result<T, RescueError>;

/// Error type for duplicate-rescue operations
#[derive(Error, Debug)]
pub enum RescueError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "Input BAM")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Adjacent records of a pair carry different query names
    #[error(
        "Adjacent reads have different names ('{first}' vs '{second}'). Is the input name-sorted?"
    )]
    NameMismatch {
        /// Name of the first record of the pair
        first: String,
        /// Name of the second record of the pair
        second: String,
    },

    /// Paired input ended with a record that has no mate
    #[error("Input ended with an unpaired read '{name}'. Is the input name-sorted?")]
    UnpairedRead {
        /// Name of the dangling record
        name: String,
    },

    /// A record arrived out of the order the stack builder requires
    #[error("Input is not sorted by sort key: {reason}")]
    UnsortedInput {
        /// Description of the ordering violation
        reason: String,
    },

    /// A named pipe could not be created
    #[error("Could not create named pipe '{}': {source}", path.display())]
    PipeCreation {
        /// Path of the pipe
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The external sort subprocess could not be started
    #[error("Could not launch external sort '{program}': {source}")]
    SortSpawn {
        /// Program that failed to start
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The external sort subprocess exited unsuccessfully
    #[error("External sort failed with {status}")]
    SortFailed {
        /// Exit status reported by the subprocess
        status: ExitStatus,
    },
}
