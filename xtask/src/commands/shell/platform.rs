//! Host platform and build profile selection.

use crate::runtime::error::{XtaskError, XtaskResult};
use std::fmt::{self, Display, Formatter};

/// Operating systems with a KoiShell build pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Platform {
    /// CMake + MSVC.
    Windows,
    /// Swift Package Manager.
    MacOs,
    /// CMake + Make.
    Linux,
}

impl Platform {
    /// Map an OS name to a platform.
    ///
    /// Accepts Rust's `std::env::consts::OS` names and the Node-style aliases `win32` and
    /// `darwin`. Anything else is an unsupported-platform error.
    pub fn parse(os: &str) -> XtaskResult<Self> {
        match os {
            "windows" | "win32" => Ok(Self::Windows),
            "macos" | "darwin" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            other => Err(XtaskError::unsupported_platform(format!(
                "`{other}` has no KoiShell build pipeline"
            ))
            .with_hint("KoiShell builds on windows, macos, and linux hosts")),
        }
    }

    /// Platform of the running process.
    pub fn detect() -> XtaskResult<Self> {
        Self::parse(std::env::consts::OS)
    }

    /// Stable lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Release or debug build, fixed for one run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BuildProfile {
    is_release: bool,
}

impl BuildProfile {
    /// Release profile.
    pub const RELEASE: Self = Self { is_release: true };
    /// Debug profile.
    pub const DEBUG: Self = Self { is_release: false };

    /// Build a profile from a release flag.
    pub fn from_release(is_release: bool) -> Self {
        Self { is_release }
    }

    /// Whether this is a release build.
    pub fn is_release(self) -> bool {
        self.is_release
    }

    /// CMake `--config` / `CMAKE_BUILD_TYPE` value.
    pub fn cmake_config(self) -> &'static str {
        if self.is_release {
            "MinSizeRel"
        } else {
            "Debug"
        }
    }

    /// `swift build -c` value.
    pub fn swift_config(self) -> &'static str {
        if self.is_release {
            "release"
        } else {
            "debug"
        }
    }

    /// Toolchain label used by `platform`.
    pub fn label(self, platform: Platform) -> &'static str {
        match platform {
            Platform::Windows | Platform::Linux => self.cmake_config(),
            Platform::MacOs => self.swift_config(),
        }
    }
}
