//! Shared deterministic types for the runner core.
//!
//! These types define the contracts between the prompt engine, the runner
//! and the orchestrator. They hold no I/O handles.

use std::time::Duration;

/// How a Vercel CLI invocation interacts with the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Child inherits standard input; output is shown live.
    Interactive,
    /// `--yes` is appended so the CLI never asks.
    AutoYes,
    /// Standard input is not connected; output is only captured.
    NonInteractive,
}

/// Team identity handed to the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamScope {
    /// Injected as `VERCEL_ORG_ID`.
    Id(String),
    /// Passed as `--scope=<slug>`.
    Slug(String),
}

/// Project identity handed to the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectScope {
    /// Injected as `VERCEL_PROJECT_ID`.
    Id(String),
    /// Passed as `--project=<slug>` when linking.
    Slug(String),
}

/// One normalized `teamConfiguration` entry: either an ID pair or a slug pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeConfig {
    Ids { team_id: String, project_id: String },
    Slugs {
        team_slug: String,
        project_slug: String,
    },
}

impl ScopeConfig {
    pub fn team_scope(&self) -> TeamScope {
        match self {
            Self::Ids { team_id, .. } => TeamScope::Id(team_id.clone()),
            Self::Slugs { team_slug, .. } => TeamScope::Slug(team_slug.clone()),
        }
    }

    pub fn project_scope(&self) -> ProjectScope {
        match self {
            Self::Ids { project_id, .. } => ProjectScope::Id(project_id.clone()),
            Self::Slugs { project_slug, .. } => ProjectScope::Slug(project_slug.clone()),
        }
    }
}

/// Fully resolved parameters of one CLI call. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInvocation {
    pub mode: RunMode,
    /// Complete argument list (pre-arguments first).
    pub args: Vec<String>,
    /// Variables stripped from the inherited environment.
    pub env_remove: Vec<String>,
    /// Variables injected after stripping.
    pub env_set: Vec<(String, String)>,
    /// Grace period before SIGTERM; `None` disables escalation.
    pub timeout: Option<Duration>,
    /// Delay between SIGTERM and SIGKILL; `None` never sends SIGKILL.
    pub kill_timeout: Option<Duration>,
}

impl RunInvocation {
    pub fn is_interactive(&self) -> bool {
        self.mode == RunMode::Interactive
    }
}

/// Result of a successful CLI call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOutput {
    /// Joined stdout, one trailing line terminator trimmed.
    pub result: Option<String>,
    /// Joined stderr of a non-interactive run (interactive runs already
    /// showed it live).
    pub stderr: Option<String>,
    /// Version parsed from the `Vercel CLI <version>` banner.
    pub version: Option<String>,
}
