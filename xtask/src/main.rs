//! `cargo xtask` entrypoint.

use std::process::ExitCode;
use xtask::runtime::env::EnvHelper;
use xtask::runtime::logging;

fn main() -> ExitCode {
    logging::init(&EnvHelper);
    xtask::exit_code(xtask::execute_from_env())
}
