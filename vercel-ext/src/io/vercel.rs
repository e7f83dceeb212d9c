//! Vercel CLI runner.
//!
//! [`Vercel`] holds the credentials and scope for every call, builds a
//! [`RunInvocation`] per call and classifies the finished child. It never
//! retries; that decision belongs to the caller.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::core::classifier::{ProcessOutcome, classify};
use crate::core::output::Channel;
use crate::core::teams::{TeamDirectory, parse_team_list};
use crate::core::types::{ProjectScope, RunInvocation, RunMode, RunOutput, TeamScope};
use crate::error::VercelError;
use crate::io::{bin_path, input};
use crate::io::process::{CaptureOptions, run_captured};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(1);

/// Variables never inherited by the child.
pub const SCRUBBED_ENV: [&str; 5] = [
    "VERCEL_ACCESS_TOKEN",
    "VERCEL_ORG_ID",
    "VERCEL_ORG_SLUG",
    "VERCEL_PROJECT_ID",
    "VERCEL_PROJECT_SLUG",
];

const YES_WARNING: &str =
    "Warning: Passing --yes or -y as a parameter is bad form. Use the run mode YES instead.";

/// Construction options for [`Vercel`].
#[derive(Debug, Clone)]
pub struct VercelOptions {
    /// Executable to run; resolved from `node_modules` when `None`.
    pub bin: Option<PathBuf>,
    pub token: Option<String>,
    pub team: Option<TeamScope>,
    pub project: Option<ProjectScope>,
    /// Pass `--debug` and mirror the child's stderr.
    pub debug: bool,
    /// `None` disables escalation.
    pub timeout: Option<Duration>,
    pub kill_timeout: Option<Duration>,
    /// Apply the timeout to interactive runs as well.
    pub timeout_when_interactive: bool,
}

impl Default for VercelOptions {
    fn default() -> Self {
        Self {
            bin: None,
            token: None,
            team: None,
            project: None,
            debug: false,
            timeout: Some(DEFAULT_TIMEOUT),
            kill_timeout: Some(DEFAULT_KILL_TIMEOUT),
            timeout_when_interactive: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Vercel {
    bin: PathBuf,
    token: Option<String>,
    team: Option<TeamScope>,
    project: Option<ProjectScope>,
    debug: bool,
    timeout: Option<Duration>,
    kill_timeout: Option<Duration>,
    timeout_when_interactive: bool,
}

/// True for `--yes`, `--yes=…` and short flag clusters containing `y`.
pub fn is_yes_flag(arg: &str) -> bool {
    if arg == "--yes" || arg.starts_with("--yes=") {
        return true;
    }
    arg.strip_prefix('-')
        .and_then(|rest| rest.split('-').next())
        .is_some_and(|cluster| cluster.contains('y'))
}

/// Warning for a `--yes`/`-y` argument that [`RunMode::AutoYes`] already adds.
pub fn redundant_yes_warning<S: AsRef<str>>(mode: RunMode, args: &[S]) -> Option<&'static str> {
    (mode == RunMode::AutoYes && args.iter().any(|arg| is_yes_flag(arg.as_ref())))
        .then_some(YES_WARNING)
}

impl Vercel {
    /// Build a runner, resolving the binary from the working directory when
    /// `options.bin` is unset.
    pub fn new(options: VercelOptions) -> Result<Self, VercelError> {
        let bin = match options.bin {
            Some(bin) => bin,
            None => bin_path::resolve_from(&std::env::current_dir()?)?,
        };
        Ok(Self {
            bin,
            token: options.token.filter(|token| !token.is_empty()),
            team: options.team,
            project: options.project,
            debug: options.debug,
            timeout: options.timeout,
            kill_timeout: options.kill_timeout,
            timeout_when_interactive: options.timeout_when_interactive,
        })
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    pub fn team(&self) -> Option<&TeamScope> {
        self.team.as_ref()
    }

    pub fn project(&self) -> Option<&ProjectScope> {
        self.project.as_ref()
    }

    /// Replace the team and project identity.
    pub fn set_scope(&mut self, team: Option<TeamScope>, project: Option<ProjectScope>) {
        debug!(?team, ?project, "scope updated");
        self.team = team;
        self.project = project;
    }

    /// Arguments placed before every subcommand.
    pub fn pre_args(&self) -> Vec<String> {
        let mut args = vec!["--no-color".to_string()];
        if let Some(token) = &self.token {
            args.push(format!("--token={token}"));
        }
        if let Some(TeamScope::Slug(slug)) = &self.team {
            args.push(format!("--scope={slug}"));
        }
        if self.debug {
            args.push("--debug".to_string());
        }
        args
    }

    /// Resolve everything about one call.
    pub fn invocation<S: AsRef<str>>(&self, mode: RunMode, args: &[S]) -> RunInvocation {
        let mut all_args = self.pre_args();
        all_args.extend(args.iter().map(|arg| arg.as_ref().to_string()));
        if let Some(warning) = redundant_yes_warning(mode, args) {
            eprintln!("{warning}");
        }
        if mode == RunMode::AutoYes {
            all_args.push("--yes".to_string());
        }

        let mut env_set = Vec::new();
        if let Some(TeamScope::Id(id)) = &self.team {
            env_set.push(("VERCEL_ORG_ID".to_string(), id.clone()));
        }
        if let Some(ProjectScope::Id(id)) = &self.project {
            env_set.push(("VERCEL_PROJECT_ID".to_string(), id.clone()));
        }

        let supervised = mode != RunMode::Interactive || self.timeout_when_interactive;
        RunInvocation {
            mode,
            args: all_args,
            env_remove: SCRUBBED_ENV.iter().map(|name| (*name).to_string()).collect(),
            env_set,
            timeout: self.timeout.filter(|_| supervised),
            kill_timeout: self.kill_timeout,
        }
    }

    /// Run one subcommand.
    pub async fn run<S: AsRef<str>>(
        &self,
        mode: RunMode,
        args: &[S],
    ) -> Result<RunOutput, VercelError> {
        self.run_invocation(&self.invocation(mode, args)).await
    }

    #[instrument(skip_all, fields(mode = ?invocation.mode))]
    pub async fn run_invocation(
        &self,
        invocation: &RunInvocation,
    ) -> Result<RunOutput, VercelError> {
        let interactive = invocation.is_interactive();
        if self.debug {
            eprintln!(
                "Running command {} {}",
                self.bin.display(),
                invocation.args.join(" ")
            );
        }
        info!(bin = %self.bin.display(), args = ?redacted(&invocation.args), "running vercel");

        let mut cmd = Command::new(&self.bin);
        cmd.args(&invocation.args);
        for name in &invocation.env_remove {
            cmd.env_remove(name);
        }
        for (name, value) in &invocation.env_set {
            cmd.env(name, value);
        }

        // Interactive children read our stdin directly; keep prompts off it.
        let _stdin = if interactive {
            input::acquire().await
        } else {
            None
        };
        let stdin = if interactive {
            Stdio::inherit()
        } else {
            Stdio::null()
        };
        let options = CaptureOptions {
            timeout: invocation.timeout,
            kill_timeout: invocation.kill_timeout,
            echo_output: interactive,
            echo_stderr: self.debug,
            own_process_group: !interactive,
        };
        let finished = run_captured(cmd, stdin, &options).await?;
        if finished.timed_out {
            warn!(timeout = ?invocation.timeout, "vercel timed out");
        }

        let outcome = ProcessOutcome {
            stdout: finished.output.joined(Channel::Stdout),
            stderr: finished.output.joined(Channel::Stderr),
            version: finished.output.version().map(str::to_string),
            exit_code: finished.exit_code(),
            signal: finished.signal_name(),
        };
        classify(outcome, interactive)
    }

    pub async fn version(&self, mode: RunMode) -> Result<String, VercelError> {
        required(self.run(mode, &["--version"]).await?, "version")
    }

    pub async fn current_user(&self, mode: RunMode) -> Result<String, VercelError> {
        required(self.run(mode, &["whoami"]).await?, "user")
    }

    /// Log in. Always interactive.
    pub async fn login(&self) -> Result<RunOutput, VercelError> {
        self.run(RunMode::Interactive, &["login"]).await
    }

    pub async fn list_teams(&self, mode: RunMode) -> Result<TeamDirectory, VercelError> {
        let output = required(self.run(mode, &["teams", "ls"]).await?, "teams")?;
        parse_team_list(&output)
    }

    /// Link the working directory. `project_slug` overrides the configured
    /// slug; it is ignored when the project is identified by ID.
    pub async fn link(
        &self,
        mode: RunMode,
        project_slug: Option<&str>,
    ) -> Result<RunOutput, VercelError> {
        let mut args = vec!["link".to_string()];
        let slug = match (&self.project, project_slug) {
            (Some(ProjectScope::Id(_)), _) => None,
            (_, Some(slug)) => Some(slug),
            (Some(ProjectScope::Slug(slug)), None) => Some(slug.as_str()),
            (None, None) => None,
        };
        if let Some(slug) = slug {
            args.push(format!("--project={slug}"));
        }
        self.run(mode, &args).await
    }

    pub async fn pull_environment(
        &self,
        mode: RunMode,
        environment: Option<&str>,
        project_path: Option<&Path>,
    ) -> Result<RunOutput, VercelError> {
        let mut args = vec!["pull".to_string()];
        if let Some(environment) = environment.filter(|env| !env.is_empty()) {
            args.push(format!("--environment={environment}"));
        }
        if let Some(path) = project_path {
            args.push(path.display().to_string());
        }
        self.run(mode, &args).await
    }

    /// Whether the working directory is linked to a project.
    pub async fn is_linked(&self) -> Result<bool, VercelError> {
        match self.run(RunMode::NonInteractive, &["env", "ls"]).await {
            Ok(_) => Ok(true),
            Err(VercelError::NonNormalExit { exit, .. })
                if exit
                    .stderr()
                    .is_some_and(|stderr| stderr.contains("Run `vercel link`")) =>
            {
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

/// Stdout of a command that must print something.
fn required(output: RunOutput, what: &'static str) -> Result<String, VercelError> {
    output
        .result
        .filter(|result| !result.is_empty())
        .ok_or(VercelError::NoOutput { what })
}

fn redacted(args: &[String]) -> Vec<&str> {
    args.iter()
        .map(|arg| {
            if arg.starts_with("--token=") {
                "--token=***"
            } else {
                arg.as_str()
            }
        })
        .collect()
}
