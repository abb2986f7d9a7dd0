//! Command trait definition for CLI commands.
//!
//! Every umirescue subcommand implements [`Command`]; `enum_dispatch` routes the parsed
//! subcommand to its implementation.

use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// Trait implemented by all umirescue CLI commands.
///
/// The `command_line` parameter holds the full invocation for the output `@PG` record.
#[enum_dispatch]
pub trait Command {
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self, command_line: &str) -> Result<()>;
}
