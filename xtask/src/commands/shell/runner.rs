//! Sequential pipeline execution.

use super::pipeline::{shell_pipeline, ArtifactSource, Pipeline, PipelineStep};
use super::platform::{BuildProfile, Platform};
use crate::koishell_config::ShellLayout;
use crate::runtime::artifacts::ArtifactManager;
use crate::runtime::error::{XtaskError, XtaskResult};
use crate::runtime::process::CommandExecutor;
use crate::runtime::workflow::WorkflowRecorder;
use std::path::PathBuf;
use tracing::{debug, info};

/// Executes a [`Pipeline`] one step at a time.
///
/// Every step is a timed workflow stage. The first failing step ends the run and its error is
/// returned with the step label attached; later steps never execute.
#[derive(Debug)]
pub struct PipelineRunner<'a, E> {
    executor: &'a E,
    artifacts: &'a ArtifactManager,
    workflow: &'a WorkflowRecorder,
}

impl<'a, E> PipelineRunner<'a, E>
where
    E: CommandExecutor,
{
    pub fn new(
        executor: &'a E,
        artifacts: &'a ArtifactManager,
        workflow: &'a WorkflowRecorder,
    ) -> Self {
        Self {
            executor,
            artifacts,
            workflow,
        }
    }

    /// Run every step of `pipeline` in order.
    pub fn run(&self, pipeline: &Pipeline) -> XtaskResult<()> {
        info!(
            platform = %pipeline.platform,
            config = pipeline.profile.label(pipeline.platform),
            steps = pipeline.steps.len(),
            "running shell pipeline"
        );

        // Directory printed by `swift build --show-bin-path`; scoped to this run.
        let mut output_dir: Option<PathBuf> = None;
        for step in &pipeline.steps {
            let label = step.describe();
            self.workflow
                .run_timed_stage(&label, || self.execute(step, &mut output_dir))
                .map_err(|err| match err.operation {
                    Some(_) => err,
                    None => err.with_operation(label.clone()),
                })?;
        }
        Ok(())
    }

    fn execute(&self, step: &PipelineStep, output_dir: &mut Option<PathBuf>) -> XtaskResult<()> {
        match step {
            PipelineStep::EnsureDir(path) => self.artifacts.ensure_dir(path),
            PipelineStep::RemoveFile(path) => self.artifacts.remove_file_if_exists(path),
            PipelineStep::Run(invocation) => self
                .executor
                .run(invocation)?
                .into_success(invocation)
                .map(|_| ()),
            PipelineStep::ResolveOutputDir(invocation) => {
                let output = self
                    .executor
                    .capture(invocation)?
                    .into_success(invocation)?;
                let dir = output.stdout.trim();
                if dir.is_empty() {
                    return Err(XtaskError::process_exit(format!(
                        "`{invocation}` printed no output directory"
                    )));
                }
                debug!(dir, "resolved build output directory");
                *output_dir = Some(PathBuf::from(dir));
                Ok(())
            }
            PipelineStep::CopyFile { from, to } => {
                let from = resolve_source(from, output_dir.as_ref())?;
                self.artifacts.copy_file(&from, to)
            }
            PipelineStep::CopyTree { from, to } => {
                let from = resolve_source(from, output_dir.as_ref())?;
                self.artifacts.copy_tree(&from, to)
            }
        }
    }
}

fn resolve_source(source: &ArtifactSource, output_dir: Option<&PathBuf>) -> XtaskResult<PathBuf> {
    match source {
        ArtifactSource::Fixed(path) => Ok(path.clone()),
        ArtifactSource::InOutputDir(relative) => output_dir
            .map(|dir| dir.join(relative))
            .ok_or_else(|| {
                XtaskError::validation(format!(
                    "{} is relative to a build output directory that was never resolved",
                    relative.display()
                ))
            }),
    }
}

/// Plan the build for the host named `os` without touching the filesystem.
pub fn plan_build(os: &str, profile: BuildProfile, layout: &ShellLayout) -> XtaskResult<Pipeline> {
    let platform = Platform::parse(os)?;
    Ok(shell_pipeline(platform, profile, layout))
}

/// Build the shell for the host named `os`.
///
/// An unsupported `os` fails before any step is planned, so no directory is created and no
/// process is spawned.
pub fn run_build<E>(
    runner: &PipelineRunner<'_, E>,
    os: &str,
    profile: BuildProfile,
    layout: &ShellLayout,
) -> XtaskResult<()>
where
    E: CommandExecutor,
{
    runner.run(&plan_build(os, profile, layout)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::shell::pipeline::tests::layout_at;
    use crate::runtime::error::XtaskErrorCategory;
    use crate::runtime::process::testing::ScriptedExecutor;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_root() -> PathBuf {
        std::env::temp_dir().join(format!(
            "xtask-shell-runner-test-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("time")
                .as_nanos()
        ))
    }

    struct Fixture {
        root: PathBuf,
        layout: ShellLayout,
        artifacts: ArtifactManager,
        workflow: WorkflowRecorder,
    }

    impl Fixture {
        fn new() -> Self {
            let root = unique_temp_root();
            let artifacts = ArtifactManager::new(root.clone());
            Self {
                layout: layout_at(&root),
                workflow: WorkflowRecorder::new(artifacts.clone()),
                artifacts,
                root,
            }
        }

        fn build(&self, executor: &ScriptedExecutor, os: &str, profile: BuildProfile) -> XtaskResult<()> {
            let runner = PipelineRunner::new(executor, &self.artifacts, &self.workflow);
            run_build(&runner, os, profile, &self.layout)
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    #[test]
    fn linux_debug_runs_two_commands_then_copies_artifact() {
        let fixture = Fixture::new();
        fs::create_dir_all(&fixture.layout.build_linux).expect("build dir");
        fs::write(fixture.layout.build_linux.join("koishell"), "elf").expect("artifact");

        let executor = ScriptedExecutor::new();
        fixture
            .build(&executor, "linux", BuildProfile::DEBUG)
            .expect("linux build");

        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0]
            .args
            .contains(&"-DCMAKE_BUILD_TYPE=Debug".to_string()));
        assert_eq!(calls[1].args, vec!["--build", ".", "--target", "koishell"]);
        assert_eq!(
            fs::read_to_string(fixture.layout.portable_dir.join("koishell")).expect("copied"),
            "elf"
        );
    }

    #[test]
    fn nonzero_configure_exit_aborts_before_build_and_copy() {
        let fixture = Fixture::new();
        let executor = ScriptedExecutor::new().with_exit_codes(&[1]);

        let err = fixture
            .build(&executor, "linux", BuildProfile::DEBUG)
            .expect_err("configure fails");

        assert_eq!(err.category, XtaskErrorCategory::ProcessExit);
        assert_eq!(err.exit_code, Some(1));
        assert!(err.message.contains("cmake failed"));
        assert_eq!(executor.calls().len(), 1);
        assert!(!fixture.layout.portable_dir.join("koishell").exists());
    }

    #[test]
    fn nonzero_build_exit_aborts_before_copy() {
        let fixture = Fixture::new();
        let executor = ScriptedExecutor::new().with_exit_codes(&[0, 2]);

        let err = fixture
            .build(&executor, "linux", BuildProfile::RELEASE)
            .expect_err("build fails");

        assert_eq!(err.exit_code, Some(2));
        assert_eq!(executor.calls().len(), 2);
        assert!(!fixture.layout.portable_dir.exists());
    }

    #[test]
    fn unsupported_platform_spawns_nothing() {
        let fixture = Fixture::new();
        let executor = ScriptedExecutor::new();

        let err = fixture
            .build(&executor, "freebsd", BuildProfile::RELEASE)
            .expect_err("unsupported");

        assert_eq!(err.category, XtaskErrorCategory::UnsupportedPlatform);
        assert!(executor.calls().is_empty());
        assert!(!fixture.root.exists());
    }

    #[test]
    fn planning_accepts_node_names_and_rejects_unknown_hosts() {
        let fixture = Fixture::new();
        let plan = plan_build("darwin", BuildProfile::DEBUG, &fixture.layout).expect("plan");
        assert_eq!(plan.platform, Platform::MacOs);
        assert_eq!(plan.invocations().count(), 2);

        let err = plan_build("aix", BuildProfile::DEBUG, &fixture.layout).expect_err("unsupported");
        assert_eq!(err.category, XtaskErrorCategory::UnsupportedPlatform);
        assert!(!fixture.root.exists());
    }

    #[test]
    fn missing_artifact_is_terminal_io_error() {
        let fixture = Fixture::new();
        let executor = ScriptedExecutor::new();

        let err = fixture
            .build(&executor, "win32", BuildProfile::DEBUG)
            .expect_err("no koishell.exe produced");

        assert_eq!(err.category, XtaskErrorCategory::Io);
        assert!(err.message.contains("koishell.exe"));
        assert_eq!(executor.calls().len(), 2);
    }

    #[test]
    fn mac_copies_binary_and_bundle_from_resolved_bin_path() {
        let fixture = Fixture::new();
        let bin_dir = fixture.root.join("swift-bin/release");
        let bundle = bin_dir.join("KoiShell_KoiShell.bundle");
        fs::create_dir_all(bundle.join("Contents")).expect("bundle");
        fs::write(bin_dir.join("KoiShell"), "macho").expect("binary");
        fs::write(bundle.join("Contents/Info.plist"), "plist").expect("plist");
        fs::create_dir_all(&fixture.layout.portable_dir).expect("portable");
        fs::write(fixture.layout.portable_dir.join("koishell"), "stale").expect("stale");

        let executor =
            ScriptedExecutor::new().with_capture_stdout(format!("{}\n", bin_dir.display()));
        fixture
            .build(&executor, "darwin", BuildProfile::RELEASE)
            .expect("mac build");

        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args, vec!["build", "--show-bin-path", "-c", "release"]);
        assert_eq!(calls[1].args, vec!["build", "-c", "release"]);
        assert_eq!(
            fs::read_to_string(fixture.layout.portable_dir.join("koishell")).expect("binary"),
            "macho"
        );
        assert!(fixture
            .layout
            .portable_dir
            .join("KoiShell_KoiShell.bundle/Contents/Info.plist")
            .is_file());
    }

    #[test]
    fn copy_before_resolution_is_rejected() {
        let err = resolve_source(&ArtifactSource::InOutputDir(PathBuf::from("KoiShell")), None)
            .expect_err("unresolved");
        assert_eq!(err.category, XtaskErrorCategory::Validation);
    }
}
