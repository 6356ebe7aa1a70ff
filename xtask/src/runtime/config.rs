//! Typed configuration loading helpers.

use crate::runtime::error::{XtaskError, XtaskResult};
use serde::de::DeserializeOwned;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Generic TOML-backed config loader.
///
/// `ConfigLoader<T>` only reads and deserializes; semantic validation stays with the command
/// domain that owns `T`.
///
/// ```rust
/// # use serde::Deserialize;
/// # use std::path::Path;
/// # use xtask::runtime::config::ConfigLoader;
/// #[derive(Deserialize)]
/// struct Layout {
///     portable_dir: String,
/// }
///
/// let loader = ConfigLoader::<Layout>::new(Path::new("/workspace"), "tools/automation/koishell.toml");
/// assert!(loader.path().ends_with("koishell.toml"));
/// ```
#[derive(Clone, Debug)]
pub struct ConfigLoader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> ConfigLoader<T>
where
    T: DeserializeOwned,
{
    /// Create a loader for the given workspace-relative path.
    pub fn new(root: &Path, relative_path: &str) -> Self {
        Self {
            path: root.join(relative_path),
            _marker: PhantomData,
        }
    }

    /// Load and deserialize the configuration file.
    ///
    /// Missing files, unreadable files, and TOML parse failures are all surfaced as
    /// [`XtaskErrorCategory::Config`](crate::runtime::error::XtaskErrorCategory::Config).
    pub fn load(&self) -> XtaskResult<T> {
        let body = fs::read_to_string(&self.path).map_err(|err| {
            XtaskError::config(format!("failed to read {}: {err}", self.path.display()))
                .with_path(&self.path)
        })?;
        Self::parse(&body).map_err(|err| err.with_path(&self.path))
    }

    /// Deserialize a TOML document that did not come from disk.
    pub fn parse(body: &str) -> XtaskResult<T> {
        toml::from_str(body)
            .map_err(|err| XtaskError::config(format!("failed to parse config: {err}")))
    }

    /// Return the config path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
