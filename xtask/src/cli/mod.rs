//! Top-level CLI parsing and help output.

use crate::runtime::error::{XtaskError, XtaskResult};

/// Top-level `xtask` command families.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TopLevelCommand {
    Shell(Vec<String>),
    Tools(Vec<String>),
    Help,
}

/// Parse raw command-line arguments into a top-level command selection.
pub fn parse(args: Vec<String>) -> XtaskResult<TopLevelCommand> {
    let Some(cmd) = args.first().cloned() else {
        return Ok(TopLevelCommand::Help);
    };

    let rest = args[1..].to_vec();
    match cmd.as_str() {
        "shell" => Ok(TopLevelCommand::Shell(rest)),
        "tools" => Ok(TopLevelCommand::Tools(rest)),
        "help" | "--help" | "-h" => Ok(TopLevelCommand::Help),
        other => Err(XtaskError::validation(format!(
            "unknown xtask command: {other}"
        ))
        .with_hint("run `cargo xtask help` for the command list")),
    }
}

/// Print the canonical top-level usage text.
pub fn print_usage() {
    eprintln!(
        "Usage: cargo xtask <command> [args]\n\
         \n\
         Commands:\n\
           shell [--release|--debug] [--dry-run]\n\
                              Build the native KoiShell into the portable folder\n\
           tools [--list]      Install pinned Go developer tools\n\
         \n\
         Environment:\n\
           CI                  Non-empty selects the release profile\n\
           XTASK_LOG           tracing filter for diagnostics (default: warn)\n"
    );
}
