//! Orchestration of the tag, sort and collapse stages over named pipes.
//!
//! - [`fifo`] - salted pipe names and the scratch directory holding them
//! - [`sorter`] - the external `samtools sort` child process
//! - [`orchestrator`] - the run state machine and failure handling

pub mod fifo;
pub mod orchestrator;
pub mod sorter;

pub use fifo::PipeSet;
pub use orchestrator::{PipelineState, RescueConfig, RescuePipeline, RescueSummary};
pub use sorter::{DEFAULT_SORT_MEMORY, DEFAULT_SORT_PROGRAM, SortConfig, is_available};
