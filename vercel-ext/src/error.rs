//! Error taxonomy shared by the prompt engine, the runner and the parsers.
//!
//! Every failure is a single [`VercelError`] value whose variant is the
//! failure kind. Variants produced from a finished child process carry an
//! [`ExitMetadata`] that is readable through accessors but never part of the
//! serialized error.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};

/// Base URL the Vercel CLI uses for documentation reference codes.
pub const REFERENCE_BASE_URL: &str = "https://err.sh/vercel/";

/// Stable discriminant for [`VercelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Aborted,
    NonNormalExit,
    SingleCode,
    MultiCode,
    MalformedOutput,
    NoOutput,
    BinaryNotFound,
    Spawn,
    Io,
}

/// Read-only facts about a finished child process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExitMetadata {
    stdout: Option<String>,
    stderr: Option<String>,
    version: Option<String>,
    exit_code: Option<i32>,
    signal: Option<String>,
}

impl ExitMetadata {
    pub(crate) fn new(
        stdout: Option<String>,
        stderr: Option<String>,
        version: Option<String>,
        exit_code: Option<i32>,
        signal: Option<String>,
    ) -> Self {
        Self {
            stdout,
            stderr,
            version,
            exit_code,
            signal,
        }
    }

    pub fn stdout(&self) -> Option<&str> {
        self.stdout.as_deref()
    }

    /// Stderr of the run as captured, banner removed.
    pub fn stderr(&self) -> Option<&str> {
        self.stderr.as_deref()
    }

    /// Version parsed from the `Vercel CLI <version>` banner.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Signal name (e.g. `SIGTERM`) when the child was terminated by one.
    pub fn signal(&self) -> Option<&str> {
        self.signal.as_deref()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VercelError {
    /// Prompt countdown expired or the input stream ended.
    #[error("{reason}")]
    Timeout { reason: String },

    /// The user declined a prompt that gated further progress.
    #[error("Aborted by user")]
    Aborted,

    /// Child exited nonzero or by signal without recognizable reference codes.
    #[error("{message}")]
    NonNormalExit { message: String, exit: ExitMetadata },

    /// Child reported exactly one reference code.
    #[error("{message}")]
    SingleCode {
        code: String,
        message: String,
        exit: ExitMetadata,
    },

    /// Child reported two or more reference codes.
    #[error("{message}")]
    MultiCode {
        codes: Vec<String>,
        message: String,
        exit: ExitMetadata,
    },

    /// Structured tool output broke its expected shape.
    #[error("Unexpected output - {reason}\n{output}")]
    MalformedOutput { reason: String, output: String },

    /// A command that must print something printed nothing.
    #[error("No {what} found")]
    NoOutput { what: &'static str },

    #[error("Vercel package not found: {reason}")]
    BinaryNotFound { reason: String },

    #[error("failed to spawn {}: {source}", .bin.display())]
    Spawn {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VercelError {
    pub fn timeout() -> Self {
        Self::Timeout {
            reason: "Confirmation prompt timed out".to_string(),
        }
    }

    pub fn input_ended() -> Self {
        Self::Timeout {
            reason: "Input stream has ended, no further input will be provided.".to_string(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>, output: impl Into<String>) -> Self {
        Self::MalformedOutput {
            reason: reason.into(),
            output: output.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Aborted => ErrorKind::Aborted,
            Self::NonNormalExit { .. } => ErrorKind::NonNormalExit,
            Self::SingleCode { .. } => ErrorKind::SingleCode,
            Self::MultiCode { .. } => ErrorKind::MultiCode,
            Self::MalformedOutput { .. } => ErrorKind::MalformedOutput,
            Self::NoOutput { .. } => ErrorKind::NoOutput,
            Self::BinaryNotFound { .. } => ErrorKind::BinaryNotFound,
            Self::Spawn { .. } => ErrorKind::Spawn,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Exit metadata for errors produced by a finished child process.
    pub fn exit(&self) -> Option<&ExitMetadata> {
        match self {
            Self::NonNormalExit { exit, .. }
            | Self::SingleCode { exit, .. }
            | Self::MultiCode { exit, .. } => Some(exit),
            _ => None,
        }
    }

    /// Reference codes in encounter order (empty for codeless kinds).
    pub fn codes(&self) -> &[String] {
        match self {
            Self::SingleCode { code, .. } => std::slice::from_ref(code),
            Self::MultiCode { codes, .. } => codes,
            _ => &[],
        }
    }

    /// True when the child reported `code` among its reference codes.
    pub fn is_vercel_code(&self, code: &str) -> bool {
        self.codes().iter().any(|c| c == code)
    }

    /// Failure produced by the child process itself (as opposed to prompt,
    /// parsing or plumbing failures).
    pub fn is_run_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NonNormalExit | ErrorKind::SingleCode | ErrorKind::MultiCode
        )
    }

    /// Human-readable error name, e.g. `NoCredentialsFoundError`.
    pub fn name(&self) -> String {
        match self {
            Self::Timeout { .. } => "TimeoutError".to_string(),
            Self::Aborted => "AbortedError".to_string(),
            Self::NonNormalExit { exit, .. } => {
                let mut parts = Vec::new();
                if let Some(code) = exit.exit_code() {
                    parts.push(format!("exitCode={code}"));
                }
                if let Some(signal) = exit.signal() {
                    parts.push(format!("signal={signal}"));
                }
                if parts.is_empty() {
                    "NonNormalExitError".to_string()
                } else {
                    format!("NonNormalExitError({})", parts.join(", "))
                }
            }
            Self::SingleCode { code, .. } => code_to_error_name(code),
            Self::MultiCode { .. } => "VercelMultiError".to_string(),
            Self::MalformedOutput { .. } => "MalformedOutputError".to_string(),
            Self::NoOutput { .. } => "NoOutputError".to_string(),
            Self::BinaryNotFound { .. } => "VercelNotFoundError".to_string(),
            Self::Spawn { .. } | Self::Io(_) => "Error".to_string(),
        }
    }
}

/// `no-credentials-found` becomes `NoCredentialsFoundError`; codes outside
/// the kebab-case shape fall back to `VercelError[<code>]`.
fn code_to_error_name(code: &str) -> String {
    static KEBAB_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:-[a-z0-9]+)*$").unwrap());
    if !KEBAB_RE.is_match(code) {
        return format!("VercelError[{code}]");
    }
    let mut name: String = code
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    name.push_str("Error");
    name
}

impl Serialize for VercelError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("VercelError", 4)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("name", &self.name())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("codes", self.codes())?;
        state.end()
    }
}
