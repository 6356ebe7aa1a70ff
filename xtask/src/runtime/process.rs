//! Shared process execution helpers.

use crate::runtime::error::{XtaskError, XtaskResult};
use std::fmt::{self, Display, Formatter};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Number of stderr lines kept in a process-exit error message.
const STDERR_TAIL_LINES: usize = 20;

/// One external tool invocation: program, arguments, and working directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Invocation {
    /// Program name resolved through `PATH`.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Working directory of the child process.
    pub cwd: PathBuf,
}

impl Invocation {
    /// Build an invocation from borrowed arguments.
    pub fn new(program: &str, args: &[&str], cwd: &Path) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            cwd: cwd.to_path_buf(),
        }
    }

    /// Append one owned argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished child process.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the child was terminated by a signal.
    pub code: Option<i32>,
    /// Captured stdout (empty when stdout was inherited).
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl ProcessOutput {
    /// Return whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convert a non-zero exit into a [`XtaskError::process_exit`] error.
    ///
    /// The error carries the exit code and the tail of the captured stderr.
    pub fn into_success(self, invocation: &Invocation) -> XtaskResult<Self> {
        if self.success() {
            return Ok(self);
        }

        let status = match self.code {
            Some(code) => format!("status {code}"),
            None => "a signal".to_string(),
        };
        let mut message = format!("`{}` exited with {status}", invocation.program);
        let tail = tail_lines(&self.stderr, STDERR_TAIL_LINES);
        if !tail.is_empty() {
            message.push_str(":\n");
            message.push_str(&tail);
        }
        Err(XtaskError::process_exit(message)
            .with_operation(invocation.to_string())
            .with_exit_code(self.code))
    }
}

/// Process-execution seam used by build pipelines.
///
/// Implementations run the child to completion and report its status; a non-zero exit is data,
/// not an error. Only failures to launch the child are returned as `Err`.
pub trait CommandExecutor {
    /// Run a command with stdout streamed to the terminal and stderr captured.
    fn run(&self, invocation: &Invocation) -> XtaskResult<ProcessOutput>;

    /// Run a command with both stdout and stderr captured.
    fn capture(&self, invocation: &Invocation) -> XtaskResult<ProcessOutput>;
}

/// Shared process runner used by command modules.
///
/// Commands are echoed in a stable `+ ...` format before they start. Stderr is forwarded line by
/// line while also being kept for the failure report.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a process runner.
    pub fn new() -> Self {
        Self
    }

    /// Return whether the given program is available by checking `--version`.
    ///
    /// Probe failures are treated as `false`.
    pub fn command_available(&self, program: &str) -> bool {
        Command::new(program)
            .arg(version_flag(program))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Require a command to exist.
    ///
    /// Returns an environment error with the supplied hint when the command is unavailable.
    pub fn ensure_command(&self, program: &str, hint: &str) -> XtaskResult<()> {
        if self.command_available(program) {
            Ok(())
        } else {
            Err(XtaskError::environment(format!(
                "required command `{program}` not found"
            ))
            .with_hint(hint))
        }
    }

    /// Print a process invocation in a stable format.
    pub fn print_command(&self, invocation: &Invocation) {
        println!("+ {invocation}");
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.current_dir(&invocation.cwd).args(&invocation.args);
        cmd
    }
}

impl CommandExecutor for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> XtaskResult<ProcessOutput> {
        self.print_command(invocation);
        debug!(cwd = %invocation.cwd.display(), "spawning {}", invocation.program);

        let mut child = self
            .command(invocation)
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| launch_error(invocation, &err))?;

        let mut stderr = String::new();
        if let Some(pipe) = child.stderr.take() {
            // Toolchains on Windows do not always emit UTF-8.
            for chunk in BufReader::new(pipe).split(b'\n') {
                let chunk = chunk.map_err(|err| {
                    XtaskError::io(format!(
                        "failed to read stderr of `{}`: {err}",
                        invocation.program
                    ))
                })?;
                let line = String::from_utf8_lossy(&chunk);
                let line = line.trim_end_matches('\r');
                eprintln!("{line}");
                stderr.push_str(&line);
                stderr.push('\n');
            }
        }

        let status = child.wait().map_err(|err| {
            XtaskError::process_launch(format!(
                "failed to wait for `{}`: {err}",
                invocation.program
            ))
        })?;
        debug!(code = ?status.code(), "{} finished", invocation.program);

        Ok(ProcessOutput {
            code: status.code(),
            stdout: String::new(),
            stderr,
        })
    }

    fn capture(&self, invocation: &Invocation) -> XtaskResult<ProcessOutput> {
        self.print_command(invocation);
        let output = self
            .command(invocation)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| launch_error(invocation, &err))?;
        debug!(code = ?output.status.code(), "{} finished", invocation.program);

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn launch_error(invocation: &Invocation, err: &std::io::Error) -> XtaskError {
    XtaskError::process_launch(format!("failed to start `{}`: {err}", invocation.program))
        .with_operation(invocation.to_string())
        .with_hint(install_hint(&invocation.program))
}

/// Remediation hint for a toolchain that could not be launched.
pub fn install_hint(program: &str) -> String {
    match program {
        "cmake" => "install CMake 3.x and make sure `cmake` is on PATH".to_string(),
        "swift" => "install Xcode or the Swift toolchain (`xcode-select --install`)".to_string(),
        "go" => "install Go and make sure `go` and `$GOPATH/bin` are on PATH".to_string(),
        other => format!("make sure `{other}` is installed and on PATH"),
    }
}

fn version_flag(program: &str) -> &'static str {
    match program {
        "go" => "version",
        _ => "--version",
    }
}

/// Return the last `max_lines` lines of `text`.
pub fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
