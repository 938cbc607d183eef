//! Entry point for the `mysqlctl` binary.
//!
//! Delegates to [`mysqlctl::run`], which loads configuration, parses the
//! command, and drives the requested lifecycle operation.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    mysqlctl::run(std::env::args_os(), &mut stdout, &mut stderr)
}
