//! KoiShell build automation (`cargo xtask`).
//!
//! The crate is a small CLI layer over a shared automation runtime. Command modules own
//! workflow-specific policy (which pipeline runs on which host, which tools are pinned) while
//! [`runtime`] owns process execution, artifact copies, workflow recording, and environment
//! normalization.

pub mod cli;
pub mod commands;
pub mod koishell_config;
pub mod runtime;

use crate::cli::TopLevelCommand;
use crate::commands::shell::ShellCommand;
use crate::commands::tools::ToolsCommand;
use crate::runtime::context::CommandContext;
use crate::runtime::error::XtaskResult;

/// Shared command contract for top-level xtask command families.
///
/// Implementations treat [`XtaskCommand::parse`] as a pure translation from raw CLI arguments
/// into typed options and keep side effects in [`XtaskCommand::run`].
pub trait XtaskCommand {
    /// Typed options produced by CLI parsing for the command family.
    type Options;

    /// Parse command-line arguments into typed options.
    ///
    /// Invalid argument shapes are reported as
    /// [`XtaskError::validation`](crate::runtime::error::XtaskError::validation).
    fn parse(args: &[String]) -> XtaskResult<Self::Options>;

    /// Execute the command family using the shared runtime context.
    fn run(ctx: &CommandContext, options: Self::Options) -> XtaskResult<()>;
}

/// Executes the `xtask` binary using the current process arguments.
pub fn execute_from_env() -> XtaskResult<()> {
    let parsed = cli::parse(std::env::args().skip(1).collect())?;
    let ctx = CommandContext::new()?;

    match parsed {
        TopLevelCommand::Shell(args) => ShellCommand::run(&ctx, ShellCommand::parse(&args)?),
        TopLevelCommand::Tools(args) => ToolsCommand::run(&ctx, ToolsCommand::parse(&args)?),
        TopLevelCommand::Help => {
            cli::print_usage();
            Ok(())
        }
    }
}

/// Converts an xtask result into a stable process exit code.
///
/// Every failure maps to exit code `1` after the formatted error is printed to stderr.
pub fn exit_code(result: XtaskResult<()>) -> std::process::ExitCode {
    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::ExitCode::from(1)
        }
    }
}
