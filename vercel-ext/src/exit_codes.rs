//! Process exit codes for the `vercel-ext` binaries.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use crate::error::VercelError;

/// Command succeeded, or the user declined a prompt in `vercel-pull-envs`.
pub const OK: i32 = 0;
/// Any failure without a more specific code.
pub const FAILURE: i32 = 1;
/// Added to the signal number of a child killed by a signal.
pub const SIGNAL_BASE: i32 = 128;

/// Exit code for an orchestrator failure.
///
/// A Vercel CLI run that exited non-zero passes its own code through.
pub fn for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<VercelError>() {
        Some(VercelError::NonNormalExit { exit, .. }) => {
            exit.exit_code().filter(|code| *code != 0).unwrap_or(FAILURE)
        }
        _ => FAILURE,
    }
}

/// Exit code mirroring a finished child.
pub fn for_status(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|signal| SIGNAL_BASE + signal))
        .unwrap_or(FAILURE)
}

/// One-line description for the user, prefixed with the error name when the
/// failure came from the runner.
pub fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<VercelError>() {
        Some(vercel) => format!("{}: {err:#}", vercel.name()),
        None => format!("{err:#}"),
    }
}
