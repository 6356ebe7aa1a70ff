//! Native KoiShell build workflow.
//!
//! The host platform selects one of three fixed pipelines (CMake on Windows and Linux, SwiftPM
//! on macOS). Each pipeline compiles the shell and copies its artifacts into the portable
//! distribution folder.

mod pipeline;
mod platform;
mod runner;

use crate::koishell_config::load_koishell_config;
use crate::runtime::context::CommandContext;
use crate::runtime::error::{XtaskError, XtaskResult};
use crate::XtaskCommand;
pub use pipeline::{shell_pipeline, ArtifactSource, Pipeline, PipelineStep};
pub use platform::{BuildProfile, Platform};
pub use runner::{plan_build, run_build, PipelineRunner};
use tracing::info;

/// `cargo xtask shell`
pub struct ShellCommand;

/// Parsed `cargo xtask shell` options.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ShellOptions {
    /// `Some(true)` for `--release`, `Some(false)` for `--debug`, `None` to follow `CI`.
    pub profile_override: Option<bool>,
    /// Print the planned steps without running them.
    pub dry_run: bool,
    pub show_help: bool,
}

impl ShellOptions {
    /// Resolve the build profile; explicit flags win over the CI environment.
    pub fn profile(&self, ci: bool) -> BuildProfile {
        BuildProfile::from_release(self.profile_override.unwrap_or(ci))
    }
}

impl XtaskCommand for ShellCommand {
    type Options = ShellOptions;

    fn parse(args: &[String]) -> XtaskResult<Self::Options> {
        parse_shell_options(args)
    }

    fn run(ctx: &CommandContext, options: Self::Options) -> XtaskResult<()> {
        if options.show_help {
            print_shell_usage();
            return Ok(());
        }

        let os = std::env::consts::OS;
        let layout = load_koishell_config(ctx.root())?
            .layout
            .anchored(ctx.artifacts());
        let profile = options.profile(ctx.env().is_ci());
        let plan = plan_build(os, profile, &layout)?;
        info!(platform = %plan.platform, release = profile.is_release(), "planned shell build");

        if options.dry_run {
            print_plan(&plan);
            return Ok(());
        }

        let label = profile.label(plan.platform).to_string();
        ctx.workflow().with_workflow_run("shell", Some(label), || {
            let runner = PipelineRunner::new(ctx.process(), ctx.artifacts(), ctx.workflow());
            run_build(&runner, os, profile, &layout)
        })
    }
}

fn parse_shell_options(args: &[String]) -> XtaskResult<ShellOptions> {
    let mut options = ShellOptions::default();
    for arg in args {
        match arg.as_str() {
            "--release" => set_profile(&mut options, true)?,
            "--debug" => set_profile(&mut options, false)?,
            "--dry-run" => options.dry_run = true,
            "help" | "--help" | "-h" => options.show_help = true,
            other => {
                return Err(XtaskError::validation(format!(
                    "unknown shell argument: {other}"
                )))
            }
        }
    }
    Ok(options)
}

fn set_profile(options: &mut ShellOptions, release: bool) -> XtaskResult<()> {
    match options.profile_override {
        Some(existing) if existing != release => Err(XtaskError::validation(
            "`--release` and `--debug` are mutually exclusive",
        )),
        _ => {
            options.profile_override = Some(release);
            Ok(())
        }
    }
}

fn print_plan(plan: &Pipeline) {
    println!(
        "shell build plan for {} ({}):",
        plan.platform,
        plan.profile.label(plan.platform)
    );
    for (index, step) in plan.steps.iter().enumerate() {
        println!("  {}. {}", index + 1, step.describe());
    }
}

pub(crate) fn print_shell_usage() {
    eprintln!(
        "Usage: cargo xtask shell [--release|--debug] [--dry-run]\n\
         \n\
         Builds the native KoiShell for the host platform and copies it into the portable folder.\n\
         \n\
         Options:\n\
           --release            Optimized build (default when CI is set)\n\
           --debug              Debug build (default outside CI)\n\
           --dry-run            Print the planned steps without running them\n"
    );
}
