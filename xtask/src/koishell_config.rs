//! Versioned KoiShell build layout and developer tool pins.

use crate::runtime::artifacts::ArtifactManager;
use crate::runtime::config::ConfigLoader;
use crate::runtime::error::{XtaskError, XtaskResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Workspace-relative location of the KoiShell automation config.
pub const KOISHELL_CONFIG_PATH: &str = "tools/automation/koishell.toml";

/// Typed contents of `tools/automation/koishell.toml`.
#[derive(Clone, Debug, Deserialize)]
pub struct KoishellConfig {
    /// Source, build, and distribution directories.
    pub layout: ShellLayout,
    /// Pinned developer tools installed by `cargo xtask tools`.
    #[serde(default)]
    pub tools: Vec<ToolPin>,
}

/// Directory layout used by the shell build pipelines.
///
/// Paths are workspace-relative in the file and absolute after [`ShellLayout::anchored`].
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ShellLayout {
    /// Portable distribution folder receiving every platform's artifacts.
    pub portable_dir: PathBuf,
    /// CMake project of the Windows shell.
    pub src_windows: PathBuf,
    /// Swift package of the macOS shell.
    pub src_macos: PathBuf,
    /// CMake project of the Linux shell.
    pub src_linux: PathBuf,
    /// Out-of-tree CMake build directory for Windows.
    pub build_windows: PathBuf,
    /// Out-of-tree CMake build directory for Linux.
    pub build_linux: PathBuf,
}

impl ShellLayout {
    /// Resolve every relative path against the workspace root.
    pub fn anchored(&self, artifacts: &ArtifactManager) -> Self {
        let anchor = |path: &Path| artifacts.resolve_path(path);
        Self {
            portable_dir: anchor(&self.portable_dir),
            src_windows: anchor(&self.src_windows),
            src_macos: anchor(&self.src_macos),
            src_linux: anchor(&self.src_linux),
            build_windows: anchor(&self.build_windows),
            build_linux: anchor(&self.build_linux),
        }
    }

    fn validate(&self) -> XtaskResult<()> {
        let entries = [
            ("portable_dir", &self.portable_dir),
            ("src_windows", &self.src_windows),
            ("src_macos", &self.src_macos),
            ("src_linux", &self.src_linux),
            ("build_windows", &self.build_windows),
            ("build_linux", &self.build_linux),
        ];
        for (key, path) in entries {
            if path.as_os_str().is_empty() {
                return Err(XtaskError::config(format!(
                    "layout.{key} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// One `go install` tool pin.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ToolPin {
    /// Short display name.
    pub name: String,
    /// Go module path of the command.
    pub module: String,
    /// Pinned version, e.g. `v1.55.2`.
    pub version: String,
    /// Only installed on Windows hosts.
    #[serde(default)]
    pub windows_only: bool,
}

impl ToolPin {
    /// `module@version` argument passed to the installer.
    pub fn install_spec(&self) -> String {
        format!("{}@{}", self.module, self.version)
    }

    fn validate(&self) -> XtaskResult<()> {
        if self.name.is_empty() || self.module.is_empty() {
            return Err(XtaskError::config("tool pins need a name and a module"));
        }
        if self.version.is_empty() || self.version.contains('@') {
            return Err(XtaskError::config(format!(
                "tool `{}` has an invalid version `{}`",
                self.name, self.version
            )));
        }
        Ok(())
    }
}

impl KoishellConfig {
    fn validate(self) -> XtaskResult<Self> {
        self.layout.validate()?;
        for tool in &self.tools {
            tool.validate()?;
        }
        Ok(self)
    }
}

/// Load and validate the KoiShell config from the workspace.
pub fn load_koishell_config(root: &Path) -> XtaskResult<KoishellConfig> {
    ConfigLoader::<KoishellConfig>::new(root, KOISHELL_CONFIG_PATH)
        .load()
        .map_err(|err| err.with_operation("load koishell config"))?
        .validate()
}
