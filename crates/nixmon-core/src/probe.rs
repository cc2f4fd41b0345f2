//! Host probe: run one host's configured command and capture the revision
//! it reports.
//!
//! The probe spawns the argv as an external process with stdin closed and
//! stdout piped, waits for it under the configured timeout, and reads only
//! the first line of stdout as the candidate revision. No retries happen
//! here; the external scheduler re-runs the whole monitor on its own
//! cadence.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// Result of probing one host, produced exactly once per host per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// First stdout line, trimmed. Treated as an opaque revision token and
    /// never truncated before the metadata lookup.
    Revision(String),
    /// The process outlived the timeout and was killed.
    TimedOut,
    /// The process could not be started or exited non-zero.
    ExecutionFailed(String),
    /// Zero exit but empty stdout or a blank first line.
    MalformedOutput,
}

/// Run `argv` and extract the revision from its first stdout line.
///
/// `timeout` of `None` waits indefinitely; production callers should always
/// pass one. The spawned process is killed when the timeout fires, not left
/// running in the background.
pub async fn fetch_revision(argv: &[String], timeout: Option<Duration>) -> ProbeOutcome {
    let (program, args) = match argv.split_first() {
        Some(parts) => parts,
        None => return ProbeOutcome::ExecutionFailed("empty argv".to_string()),
    };

    debug!(command = %argv.join(" "), "starting probe");
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            return ProbeOutcome::ExecutionFailed(format!("cannot start {program}: {err}"))
        }
    };

    // Dropping the wait future on timeout kills the child (kill_on_drop).
    let waited = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(waited) => waited,
            Err(_elapsed) => {
                debug!(command = %argv.join(" "), "probe timed out");
                return ProbeOutcome::TimedOut;
            }
        },
        None => child.wait_with_output().await,
    };

    let output = match waited {
        Ok(output) => output,
        Err(err) => return ProbeOutcome::ExecutionFailed(format!("cannot wait for probe: {err}")),
    };
    if !output.status.success() {
        return ProbeOutcome::ExecutionFailed(format!("probe exited with {}", output.status));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match stdout.lines().next().map(str::trim).filter(|line| !line.is_empty()) {
        Some(token) => ProbeOutcome::Revision(token.to_string()),
        None => ProbeOutcome::MalformedOutput,
    }
}
