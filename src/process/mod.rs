//! External process execution
//!
//! Every tool brewbot drives (git, cmake, make, uname) goes through the
//! [`ProcessRunner`] trait so the refresher and build pipeline can be
//! exercised without the real toolchain installed.

mod runner;
#[cfg(test)]
pub(crate) mod scripted;

pub use runner::{CommandOutput, Invocation, ProcessRunner, SystemRunner};

/// Max number of output lines to include in log messages for failed commands.
const LOG_TAIL_LINES: usize = 20;

/// Join stdout and stderr into a single diagnostic transcript.
pub(crate) fn combine_output(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => {
            let mut combined = String::with_capacity(stdout.len() + stderr.len() + 1);
            combined.push_str(stdout);
            if !stdout.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(stderr);
            combined
        }
    }
}

/// Last [`LOG_TAIL_LINES`] lines of command output, for log messages
pub(crate) fn output_tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let total = lines.len();
    let tail = if total > LOG_TAIL_LINES {
        &lines[total - LOG_TAIL_LINES..]
    } else {
        &lines[..]
    };
    tail.join("\n")
}
