//! Pinned developer tool installation (`go install module@version`).

use crate::commands::shell::Platform;
use crate::koishell_config::{load_koishell_config, ToolPin};
use crate::runtime::context::CommandContext;
use crate::runtime::error::{XtaskError, XtaskResult};
use crate::runtime::process::{install_hint, CommandExecutor, Invocation};
use crate::runtime::workflow::WorkflowRecorder;
use crate::XtaskCommand;
use std::path::Path;
use tracing::warn;

/// `cargo xtask tools`
pub struct ToolsCommand;

/// Parsed `cargo xtask tools` options.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ToolsOptions {
    /// Print the pinned tools for this host instead of installing them.
    pub list: bool,
    pub show_help: bool,
}

impl XtaskCommand for ToolsCommand {
    type Options = ToolsOptions;

    fn parse(args: &[String]) -> XtaskResult<Self::Options> {
        let mut options = ToolsOptions::default();
        for arg in args {
            match arg.as_str() {
                "--list" => options.list = true,
                "help" | "--help" | "-h" => options.show_help = true,
                other => {
                    return Err(XtaskError::validation(format!(
                        "unknown tools argument: {other}"
                    )))
                }
            }
        }
        Ok(options)
    }

    fn run(ctx: &CommandContext, options: Self::Options) -> XtaskResult<()> {
        if options.show_help {
            print_tools_usage();
            return Ok(());
        }

        let config = load_koishell_config(ctx.root())?;
        let tools = tools_for_host(&config.tools, Platform::detect().ok());

        if options.list {
            for tool in &tools {
                println!("{:<16} {}", tool.name, tool.install_spec());
            }
            return Ok(());
        }

        ctx.process().ensure_command("go", &install_hint("go"))?;
        ctx.workflow().with_workflow_run("tools", None, || {
            install_tools(ctx.process(), ctx.workflow(), ctx.root(), &tools)
        })
    }
}

/// Tools that apply to `host`; Windows-only pins are dropped elsewhere.
pub fn tools_for_host(tools: &[ToolPin], host: Option<Platform>) -> Vec<ToolPin> {
    tools
        .iter()
        .filter(|tool| !tool.windows_only || host == Some(Platform::Windows))
        .cloned()
        .collect()
}

/// Install every tool independently, then fail if any install failed.
pub fn install_tools<E>(
    executor: &E,
    workflow: &WorkflowRecorder,
    cwd: &Path,
    tools: &[ToolPin],
) -> XtaskResult<()>
where
    E: CommandExecutor,
{
    let mut failed = Vec::new();
    for tool in tools {
        let invocation = Invocation::new("go", &["install"], cwd).arg(tool.install_spec());
        let result = workflow.run_timed_stage(&format!("install {}", tool.name), || {
            executor
                .run(&invocation)?
                .into_success(&invocation)
                .map(|_| ())
        });
        if let Err(err) = result {
            warn!(tool = %tool.name, error = %err, "tool install failed");
            failed.push(tool.name.as_str());
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(XtaskError::process_exit(format!(
            "failed to install {} of {} tools: {}",
            failed.len(),
            tools.len(),
            failed.join(", ")
        ))
        .with_operation("go install"))
    }
}

pub(crate) fn print_tools_usage() {
    eprintln!(
        "Usage: cargo xtask tools [--list]\n\
         \n\
         Installs the pinned Go developer tools from tools/automation/koishell.toml.\n\
         \n\
         Options:\n\
           --list               Print the tools that apply to this host and exit\n"
    );
}
