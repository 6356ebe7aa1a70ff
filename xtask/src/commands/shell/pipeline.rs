//! Per-platform KoiShell build pipelines.
//!
//! A pipeline is plain data: planning never touches the filesystem or spawns a process, so the
//! exact tool contracts can be checked without a toolchain installed.

use super::platform::{BuildProfile, Platform};
use crate::koishell_config::ShellLayout;
use crate::runtime::process::Invocation;
use std::path::PathBuf;

/// CMake target and executable stem of the native shell.
pub const SHELL_TARGET: &str = "koishell";
/// CMake generator used on Windows.
pub const WINDOWS_GENERATOR: &str = "Visual Studio 17 2022";
/// CMake generator used on Linux.
pub const LINUX_GENERATOR: &str = "Unix Makefiles";
/// Swift product name of the macOS shell.
pub const MAC_PRODUCT: &str = "KoiShell";
/// Resource bundle emitted next to the macOS product.
pub const MAC_BUNDLE: &str = "KoiShell_KoiShell.bundle";

/// Where a copied artifact comes from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ArtifactSource {
    /// A path known when the pipeline is planned.
    Fixed(PathBuf),
    /// A path relative to the directory reported by [`PipelineStep::ResolveOutputDir`].
    InOutputDir(PathBuf),
}

/// One strictly ordered pipeline step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PipelineStep {
    /// Create a directory; existing directories are fine.
    EnsureDir(PathBuf),
    /// Delete a stale file; a missing file is fine.
    RemoveFile(PathBuf),
    /// Run a build tool and require exit status zero.
    Run(Invocation),
    /// Run a tool whose trimmed stdout names the output directory for later copies.
    ResolveOutputDir(Invocation),
    /// Copy one file, overwriting the destination.
    CopyFile { from: ArtifactSource, to: PathBuf },
    /// Copy a directory tree into an existing destination directory.
    CopyTree { from: ArtifactSource, to: PathBuf },
}

impl PipelineStep {
    /// Short label used for stage banners and run manifests.
    pub fn describe(&self) -> String {
        match self {
            Self::EnsureDir(path) => format!("ensure {}", path.display()),
            Self::RemoveFile(path) => format!("remove stale {}", path.display()),
            Self::Run(invocation) => invocation.to_string(),
            Self::ResolveOutputDir(invocation) => format!("resolve output dir: {invocation}"),
            Self::CopyFile { from, to } | Self::CopyTree { from, to } => {
                let from = match from {
                    ArtifactSource::Fixed(path) => path.display().to_string(),
                    ArtifactSource::InOutputDir(path) => format!("<output>/{}", path.display()),
                };
                format!("copy {from} -> {}", to.display())
            }
        }
    }
}

/// Fixed step sequence for one platform and profile.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pipeline {
    pub platform: Platform,
    pub profile: BuildProfile,
    pub steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// External tool invocations in execution order.
    pub fn invocations(&self) -> impl Iterator<Item = &Invocation> {
        self.steps.iter().filter_map(|step| match step {
            PipelineStep::Run(invocation) | PipelineStep::ResolveOutputDir(invocation) => {
                Some(invocation)
            }
            _ => None,
        })
    }
}

/// Plan the shell build for `platform`.
pub fn shell_pipeline(platform: Platform, profile: BuildProfile, layout: &ShellLayout) -> Pipeline {
    let steps = match platform {
        Platform::Windows => windows_steps(profile, layout),
        Platform::MacOs => mac_steps(profile, layout),
        Platform::Linux => linux_steps(profile, layout),
    };
    Pipeline {
        platform,
        profile,
        steps,
    }
}

fn windows_steps(profile: BuildProfile, layout: &ShellLayout) -> Vec<PipelineStep> {
    let build_dir = &layout.build_windows;
    let conf = profile.cmake_config();
    let exe = format!("{SHELL_TARGET}.exe");

    vec![
        PipelineStep::EnsureDir(build_dir.clone()),
        PipelineStep::Run(
            Invocation::new("cmake", &["-G", WINDOWS_GENERATOR], build_dir)
                .arg(layout.src_windows.display().to_string()),
        ),
        PipelineStep::Run(Invocation::new(
            "cmake",
            &["--build", ".", "--target", SHELL_TARGET, "--config", conf],
            build_dir,
        )),
        PipelineStep::EnsureDir(layout.portable_dir.clone()),
        PipelineStep::CopyFile {
            from: ArtifactSource::Fixed(build_dir.join(conf).join(&exe)),
            to: layout.portable_dir.join(&exe),
        },
    ]
}

fn mac_steps(profile: BuildProfile, layout: &ShellLayout) -> Vec<PipelineStep> {
    let src_dir = &layout.src_macos;
    let conf = profile.swift_config();
    let dist_binary = layout.portable_dir.join(SHELL_TARGET);
    let dist_bundle = layout.portable_dir.join(MAC_BUNDLE);

    vec![
        PipelineStep::RemoveFile(dist_binary.clone()),
        PipelineStep::ResolveOutputDir(Invocation::new(
            "swift",
            &["build", "--show-bin-path", "-c", conf],
            src_dir,
        )),
        PipelineStep::Run(Invocation::new("swift", &["build", "-c", conf], src_dir)),
        PipelineStep::EnsureDir(layout.portable_dir.clone()),
        PipelineStep::CopyFile {
            from: ArtifactSource::InOutputDir(PathBuf::from(MAC_PRODUCT)),
            to: dist_binary,
        },
        PipelineStep::EnsureDir(dist_bundle.clone()),
        PipelineStep::CopyTree {
            from: ArtifactSource::InOutputDir(PathBuf::from(MAC_BUNDLE)),
            to: dist_bundle,
        },
    ]
}

fn linux_steps(profile: BuildProfile, layout: &ShellLayout) -> Vec<PipelineStep> {
    let build_dir = &layout.build_linux;
    let build_type = format!("-DCMAKE_BUILD_TYPE={}", profile.cmake_config());

    vec![
        PipelineStep::EnsureDir(build_dir.clone()),
        PipelineStep::Run(
            Invocation::new("cmake", &[build_type.as_str(), "-G", LINUX_GENERATOR], build_dir)
                .arg(layout.src_linux.display().to_string()),
        ),
        PipelineStep::Run(Invocation::new(
            "cmake",
            &["--build", ".", "--target", SHELL_TARGET],
            build_dir,
        )),
        PipelineStep::EnsureDir(layout.portable_dir.clone()),
        PipelineStep::CopyFile {
            from: ArtifactSource::Fixed(build_dir.join(SHELL_TARGET)),
            to: layout.portable_dir.join(SHELL_TARGET),
        },
    ]
}
