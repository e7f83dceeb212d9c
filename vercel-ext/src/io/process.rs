//! Child processes with ordered output capture and timeout escalation.

use std::io::Write;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{Signal, kill, killpg};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, instrument, warn};

use crate::core::output::{CapturedOutput, Channel};
use crate::error::VercelError;

const READ_CHUNK: usize = 8192;

/// How long pipes may stay open after the child exits. Descendants that
/// inherited them are not waited for beyond this.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// How a captured child is supervised.
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Grace period before SIGTERM.
    pub timeout: Option<Duration>,
    /// Delay between SIGTERM and SIGKILL.
    pub kill_timeout: Option<Duration>,
    /// Mirror stdout and stderr to ours as they arrive.
    pub echo_output: bool,
    /// Mirror stderr only.
    pub echo_stderr: bool,
    /// Spawn the child as leader of a new process group and signal the whole
    /// group on timeout. Must stay off when the child reads the terminal,
    /// or it leaves the foreground group.
    pub own_process_group: bool,
}

/// Finished child with everything it wrote.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub output: CapturedOutput,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Name of the terminating signal (e.g. `SIGTERM`).
    pub fn signal_name(&self) -> Option<String> {
        self.status.signal().map(signal_name)
    }
}

pub fn signal_name(raw: i32) -> String {
    Signal::try_from(raw)
        .map(|signal| signal.as_str().to_string())
        .unwrap_or_else(|_| format!("SIG{raw}"))
}

/// Pending stage of the SIGTERM / SIGKILL escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escalation {
    Terminate(Instant),
    Kill(Instant),
    Done,
}

impl Escalation {
    fn new(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) => Self::Terminate(Instant::now() + timeout),
            None => Self::Done,
        }
    }

    fn deadline(self) -> Option<Instant> {
        match self {
            Self::Terminate(at) | Self::Kill(at) => Some(at),
            Self::Done => None,
        }
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Run `cmd` to completion, capturing stdout and stderr in arrival order.
///
/// When `options.timeout` elapses the child gets SIGTERM, then SIGKILL after
/// `options.kill_timeout`. Pipes are drained until EOF, or for at most
/// [`DRAIN_GRACE`] once the child has exited.
#[instrument(skip_all, fields(timeout_ms = ?options.timeout.map(|t| t.as_millis())))]
pub async fn run_captured(
    mut cmd: Command,
    stdin: Stdio,
    options: &CaptureOptions,
) -> Result<CommandOutput, VercelError> {
    cmd.stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if options.own_process_group {
        cmd.process_group(0);
    }

    debug!("spawning child process");
    let bin = PathBuf::from(cmd.as_std().get_program());
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            error!(err = %source, bin = %bin.display(), "failed to spawn command");
            return Err(VercelError::Spawn { bin, source });
        }
    };

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout was not piped"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr was not piped"))?;

    let mut output = CapturedOutput::default();
    let mut out_buf = [0u8; READ_CHUNK];
    let mut err_buf = [0u8; READ_CHUNK];
    let (mut out_open, mut err_open) = (true, true);
    let mut status = None;
    let mut escalation = Escalation::new(options.timeout);
    let mut timed_out = false;
    let mut drain_deadline = None;

    while status.is_none() || out_open || err_open {
        tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => {
                let n = read?;
                if n == 0 {
                    out_open = false;
                } else {
                    output.push(Channel::Stdout, &out_buf[..n]);
                    if options.echo_output {
                        mirror(&mut std::io::stdout(), &out_buf[..n]);
                    }
                }
            }
            read = stderr.read(&mut err_buf), if err_open => {
                let n = read?;
                if n == 0 {
                    err_open = false;
                } else {
                    output.push(Channel::Stderr, &err_buf[..n]);
                    if options.echo_output || options.echo_stderr {
                        mirror(&mut std::io::stderr(), &err_buf[..n]);
                    }
                }
            }
            exited = child.wait(), if status.is_none() => {
                status = Some(exited?);
                escalation = Escalation::Done;
                drain_deadline = Some(Instant::now() + DRAIN_GRACE);
            }
            () = wait_deadline(escalation.deadline()), if status.is_none() => {
                timed_out = true;
                escalation = escalate(&mut child, escalation, options);
            }
            () = wait_deadline(drain_deadline), if status.is_some() => {
                debug!(out_open, err_open, "pipes still held after exit, stop reading");
                (out_open, err_open) = (false, false);
            }
        }
    }

    let status = status.ok_or_else(|| std::io::Error::other("child was not reaped"))?;
    output.finalize();
    debug!(exit_code = ?status.code(), signal = ?status.signal(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        output,
        timed_out,
    })
}

fn escalate(child: &mut Child, stage: Escalation, options: &CaptureOptions) -> Escalation {
    match stage {
        Escalation::Terminate(_) => {
            warn!(group = options.own_process_group, "command timed out, sending SIGTERM");
            signal_child(child, Signal::SIGTERM, options.own_process_group);
            match options.kill_timeout {
                Some(delay) => Escalation::Kill(Instant::now() + delay),
                None => Escalation::Done,
            }
        }
        Escalation::Kill(_) => {
            warn!(group = options.own_process_group, "command ignored SIGTERM, sending SIGKILL");
            if options.own_process_group {
                signal_child(child, Signal::SIGKILL, true);
            } else if let Err(err) = child.start_kill() {
                warn!(err = %err, "failed to send SIGKILL");
            }
            Escalation::Done
        }
        Escalation::Done => Escalation::Done,
    }
}

/// Signal the child, or the process group it leads.
fn signal_child(child: &Child, signal: Signal, group: bool) {
    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    let pid = Pid::from_raw(pid);
    let sent = if group {
        killpg(pid, signal)
    } else {
        kill(pid, signal)
    };
    if let Err(err) = sent {
        warn!(err = %err, signal = signal.as_str(), "failed to signal command");
    }
}

fn mirror<W: Write>(out: &mut W, bytes: &[u8]) {
    if let Err(err) = out.write_all(bytes).and_then(|()| out.flush()) {
        warn!(err = %err, "failed to mirror child output");
    }
}
