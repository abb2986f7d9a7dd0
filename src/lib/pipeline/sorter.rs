//! The external coordinate sort, run as a child process.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use log::debug;

use crate::errors::{RescueError, Result};
use crate::sam::SORT_KEY_NAME;

/// Program used when none is configured.
pub const DEFAULT_SORT_PROGRAM: &str = "samtools";

/// Default sort memory per thread, in bytes.
pub const DEFAULT_SORT_MEMORY: usize = 500 * 1024 * 1024;

/// Invocation of `samtools sort` over a pair of paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortConfig {
    /// Executable to run.
    pub program: PathBuf,
    /// Memory per sort thread, in bytes.
    pub memory_per_thread: usize,
    /// Sort threads.
    pub threads: usize,
    /// Prefix for the sort's temporary files; defaults to one next to the output.
    pub tmp_prefix: Option<PathBuf>,
}

impl SortConfig {
    /// Argument vector for sorting `input` into `output` by the `SK` tag.
    #[must_use]
    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let tmp_prefix = self.tmp_prefix.clone().unwrap_or_else(|| output.with_extension("tmp"));
        let mut args: Vec<OsString> = vec![
            "sort".into(),
            "-T".into(),
            tmp_prefix.into(),
            "-O".into(),
            "bam".into(),
            "-l".into(),
            "0".into(),
            "-m".into(),
            self.memory_per_thread.to_string().into(),
            "-@".into(),
            self.threads.max(1).to_string().into(),
            "-t".into(),
            SORT_KEY_NAME.into(),
            "-o".into(),
        ];
        args.push(output.into());
        args.push(input.into());
        args
    }

    /// Starts the sort with its standard streams detached from ours, except stderr.
    ///
    /// # Errors
    /// Returns [`RescueError::SortSpawn`] if the program cannot be started.
    pub fn spawn(&self, input: &Path, output: &Path) -> Result<Child> {
        let args = self.args(input, output);
        debug!("Running {} {:?}", self.program.display(), args);
        Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| RescueError::SortSpawn {
                program: self.program.display().to_string(),
                source,
            })
    }
}

/// True if `program --version` runs successfully.
#[must_use]
pub fn is_available(program: &Path) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
