//! Deterministic classification of finished Vercel CLI runs.
//!
//! - Exit code 0 without a signal is success.
//! - Otherwise stderr is scanned for `https://err.sh/vercel/<code>` reference
//!   tokens; one code gives [`VercelError::SingleCode`], several give
//!   [`VercelError::MultiCode`].
//! - Anything else (including every signal death) is
//!   [`VercelError::NonNormalExit`].

use std::sync::LazyLock;

use regex::Regex;

use crate::core::escape::strip_ansi;
use crate::core::types::RunOutput;
use crate::error::{ExitMetadata, REFERENCE_BASE_URL, VercelError};

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Learn More:\s*)?https://err\.sh/vercel/(\S+)").unwrap()
});

static ERROR_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\AError:\s*").unwrap());

/// Facts about one finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub version: Option<String>,
    pub exit_code: Option<i32>,
    pub signal: Option<String>,
}

impl ProcessOutcome {
    pub fn succeeded(&self) -> bool {
        self.signal.is_none() && self.exit_code == Some(0)
    }

    fn into_exit(self) -> ExitMetadata {
        ExitMetadata::new(
            self.stdout,
            self.stderr,
            self.version,
            self.exit_code,
            self.signal,
        )
    }
}

/// Reference codes found in stderr, plus stderr with their tokens removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceScan {
    pub codes: Vec<String>,
    pub excised: String,
}

/// Find reference tokens bounded by whitespace or the string edges.
///
/// The whitespace before a token (a `\r\n` pair counts as one) is removed
/// with it; the whitespace after it stays. Returns `None` without codes.
pub fn scan_reference_codes(stderr: &str) -> Option<ReferenceScan> {
    let mut codes = Vec::new();
    let mut excised = String::with_capacity(stderr.len());
    let mut cursor = 0;

    for caps in REFERENCE_RE.captures_iter(stderr) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let end = whole.end();
        let start = if token_boundary(stderr, whole.start()) {
            whole.start()
        } else {
            // `Learn More:` glued to earlier text; the URL alone may still qualify.
            let url_start = code.start() - REFERENCE_BASE_URL.len();
            if caps.get(1).is_none() || !token_boundary(stderr, url_start) {
                continue;
            }
            url_start
        };
        let cut_from = start - preceding_whitespace_len(&stderr[..start]);
        if cut_from < cursor {
            continue;
        }
        excised.push_str(&stderr[cursor..cut_from]);
        cursor = end;
        codes.push(code.as_str().to_string());
    }

    if codes.is_empty() {
        return None;
    }
    excised.push_str(&stderr[cursor..]);
    Some(ReferenceScan { codes, excised })
}

fn token_boundary(text: &str, at: usize) -> bool {
    text[..at].chars().next_back().is_none_or(char::is_whitespace)
}

fn preceding_whitespace_len(before: &str) -> usize {
    if before.ends_with("\r\n") {
        return 2;
    }
    before
        .chars()
        .next_back()
        .filter(|c| c.is_whitespace())
        .map_or(0, char::len_utf8)
}

/// Strip ANSI sequences and a leading `Error:` label.
pub fn clean_message(stderr: &str) -> String {
    let stripped = strip_ansi(stderr);
    ERROR_PREFIX_RE.replace(&stripped, "").into_owned()
}

fn reference_url(code: &str) -> String {
    format!("{REFERENCE_BASE_URL}{code}")
}

fn non_normal_message(outcome: &ProcessOutcome, interactive: bool) -> String {
    if !interactive
        && let Some(stderr) = outcome.stderr.as_deref()
    {
        let cleaned = clean_message(stderr);
        if !cleaned.is_empty() {
            return cleaned;
        }
    }
    match (outcome.exit_code, outcome.signal.as_deref()) {
        (Some(code), Some(signal)) => {
            format!("Command failed with exit code {code} and signal '{signal}'")
        }
        (Some(code), None) => format!("Command failed with exit code {code}."),
        (None, Some(signal)) => format!("Command failed with signal '{signal}'."),
        (None, None) => "Command failed for unknown reasons.".to_string(),
    }
}

fn coded_message(excised: &str, codes: &[String], interactive: bool) -> String {
    let urls: Vec<String> = codes.iter().map(|code| reference_url(code)).collect();
    let see = format!("See: {}", urls.join(" "));
    let cleaned = if interactive {
        String::new()
    } else {
        clean_message(excised)
    };
    if cleaned.is_empty() {
        see
    } else {
        format!("{cleaned}\n{see}")
    }
}

/// Turn a finished run into its output or its classified failure.
///
/// Interactive runs already showed stderr live, so it is neither repeated in
/// messages nor returned on success.
pub fn classify(outcome: ProcessOutcome, interactive: bool) -> Result<RunOutput, VercelError> {
    if outcome.succeeded() {
        return Ok(RunOutput {
            result: outcome.stdout,
            stderr: if interactive { None } else { outcome.stderr },
            version: outcome.version,
        });
    }

    let scan = if outcome.signal.is_none() {
        outcome.stderr.as_deref().and_then(scan_reference_codes)
    } else {
        None
    };

    match scan {
        None => Err(VercelError::NonNormalExit {
            message: non_normal_message(&outcome, interactive),
            exit: outcome.into_exit(),
        }),
        Some(ReferenceScan { mut codes, excised }) => {
            let message = coded_message(&excised, &codes, interactive);
            let exit = outcome.into_exit();
            if codes.len() == 1 {
                Err(VercelError::SingleCode {
                    code: codes.remove(0),
                    message,
                    exit,
                })
            } else {
                Err(VercelError::MultiCode {
                    codes,
                    message,
                    exit,
                })
            }
        }
    }
}
