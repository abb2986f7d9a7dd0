//! Named pipes connecting the tagging stage, the external sort and the collapsing stage.

use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use rand::Rng;
use rand::distr::Alphanumeric;
use tempfile::TempDir;

use crate::errors::{RescueError, Result};

/// Random characters in each pipe-name salt.
pub const SALT_LEN: usize = 20;

/// Unique prefix for a run: random alphanumerics followed by the input's file name.
#[must_use]
pub fn salt_for(input: &Path) -> String {
    let random: String =
        rand::rng().sample_iter(&Alphanumeric).take(SALT_LEN).map(char::from).collect();
    match input.file_name() {
        Some(name) => format!("{random}.{}", name.to_string_lossy()),
        None => random,
    }
}

/// Creates a FIFO readable and writable by the current user.
///
/// # Errors
/// Returns [`RescueError::PipeCreation`] if the FIFO cannot be created.
pub fn create_fifo(path: &Path) -> Result<()> {
    mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR).map_err(|errno| RescueError::PipeCreation {
        path: path.to_path_buf(),
        source: io::Error::from(errno),
    })
}

/// A private scratch directory holding the two pipes of one run.
///
/// Dropping the set removes the directory and both pipes.
#[derive(Debug)]
pub struct PipeSet {
    dir: TempDir,
    salt: String,
    mark: PathBuf,
    sorted: PathBuf,
}

impl PipeSet {
    /// Creates the scratch directory under `parent` and both pipes inside it.
    ///
    /// # Errors
    /// Returns [`RescueError::PipeCreation`] if the directory or either pipe cannot be
    /// created. Anything already created is removed.
    pub fn create(input: &Path, parent: &Path) -> Result<Self> {
        let salt = salt_for(input);
        let dir = tempfile::Builder::new()
            .prefix(&format!(".umirescue.{salt}."))
            .tempdir_in(parent)
            .map_err(|source| RescueError::PipeCreation { path: parent.to_path_buf(), source })?;

        let mark = dir.path().join(format!("{salt}.marked.fifo"));
        let sorted = dir.path().join(format!("{salt}.sorted.fifo"));
        create_fifo(&mark)?;
        create_fifo(&sorted)?;
        debug!("Created pipes {} and {}", mark.display(), sorted.display());

        Ok(Self { dir, salt, mark, sorted })
    }

    /// Pipe carrying tagged records into the sort.
    #[must_use]
    pub fn mark_path(&self) -> &Path {
        &self.mark
    }

    /// Pipe carrying sorted records out of the sort.
    #[must_use]
    pub fn sorted_path(&self) -> &Path {
        &self.sorted
    }

    #[must_use]
    pub fn salt(&self) -> &str {
        &self.salt
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the pipes, reporting any failure.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be removed.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}
