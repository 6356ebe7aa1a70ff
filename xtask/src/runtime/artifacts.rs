//! Artifact path management and copy helpers for xtask workflows.

use crate::runtime::error::{XtaskError, XtaskResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const AUTOMATION_RUNS_DIR: &str = ".artifacts/automation/runs";

/// Central artifact path policy for xtask.
///
/// Pipelines go through this type for every filesystem mutation so path resolution and error
/// wording stay uniform.
#[derive(Clone, Debug)]
pub struct ArtifactManager {
    root: PathBuf,
}

impl ArtifactManager {
    /// Create an artifact manager rooted at the workspace.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve a possibly-relative workspace path.
    ///
    /// Absolute paths are preserved, while relative paths are anchored to the workspace root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Return the standard automation run root used by [`WorkflowRecorder`](crate::runtime::workflow::WorkflowRecorder).
    pub fn automation_runs_dir(&self) -> PathBuf {
        self.root.join(AUTOMATION_RUNS_DIR)
    }

    /// Ensure a directory exists.
    ///
    /// This helper is idempotent and succeeds when the directory already exists.
    pub fn ensure_dir(&self, path: &Path) -> XtaskResult<()> {
        fs::create_dir_all(path).map_err(|err| {
            XtaskError::io(format!("failed to create {}: {err}", path.display())).with_path(path)
        })
    }

    /// Remove a file, treating a missing file as success.
    pub fn remove_file_if_exists(&self, path: &Path) -> XtaskResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(
                XtaskError::io(format!("failed to remove {}: {err}", path.display()))
                    .with_path(path),
            ),
        }
    }

    /// Copy one file, overwriting the destination.
    ///
    /// A missing source is reported as an IO error naming the source path.
    pub fn copy_file(&self, from: &Path, to: &Path) -> XtaskResult<()> {
        if !from.is_file() {
            return Err(
                XtaskError::io(format!("build artifact {} does not exist", from.display()))
                    .with_path(from),
            );
        }
        fs::copy(from, to).map(|_| ()).map_err(|err| {
            XtaskError::io(format!(
                "failed to copy {} to {}: {err}",
                from.display(),
                to.display()
            ))
            .with_path(to)
        })
    }

    /// Recursively copy the contents of `from` into `to`, overwriting existing files.
    ///
    /// Symlinks are followed, so linked files and directories land in `to` as real copies.
    pub fn copy_tree(&self, from: &Path, to: &Path) -> XtaskResult<()> {
        if !from.is_dir() {
            return Err(XtaskError::io(format!(
                "build artifact directory {} does not exist",
                from.display()
            ))
            .with_path(from));
        }

        for entry in WalkDir::new(from).follow_links(true) {
            let entry = entry.map_err(|err| {
                XtaskError::io(format!("failed to walk {}: {err}", from.display())).with_path(from)
            })?;
            let relative = entry.path().strip_prefix(from).map_err(|err| {
                XtaskError::io(format!(
                    "failed to relativize {}: {err}",
                    entry.path().display()
                ))
            })?;
            let dest = to.join(relative);
            if entry.file_type().is_dir() {
                self.ensure_dir(&dest)?;
            } else {
                self.copy_file(entry.path(), &dest)?;
            }
        }
        Ok(())
    }
}
