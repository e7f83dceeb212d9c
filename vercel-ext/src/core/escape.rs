//! ANSI escape sequence matching.
//!
//! One pattern serves two jobs: recognizing a complete sequence at the front
//! of raw keyboard input, and stripping color codes from diagnostic text.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use regex::bytes::Regex as BytesRegex;

/// Everything after the introducer byte (ESC or CSI). SS3 keys (`ESC O A`)
/// come first so `O` is not taken as a final byte.
const ANSI_BODY: &str = r"(?:O[A-Za-z]|[\[\]()#;?]*(?:(?:(?:(?:;[-a-zA-Z0-9/#&.:=?%@~_]+)*|[a-zA-Z0-9]+(?:;[-a-zA-Z0-9/#&.:=?%@~_]*)*)?\x07)|(?:(?:[0-9]{1,4}(?:;[0-9]{0,4})*)?[0-9A-PR-TZcf-ntqry=><~])))";

static LEADING_ESCAPE_RE: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(&format!(r"(?-u)\A[\x1B\x9B]{ANSI_BODY}")).unwrap());

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"[\x1B\x{{9B}}]{ANSI_BODY}")).unwrap());

/// Length of the escape sequence starting at `input[0]`, if there is one.
pub fn leading_escape_len(input: &[u8]) -> Option<usize> {
    LEADING_ESCAPE_RE.find(input).map(|m| m.end())
}

/// Remove every ANSI escape sequence from `text`.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_RE.replace_all(text, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_keys_are_complete_sequences() {
        assert_eq!(leading_escape_len(b"\x1b[A"), Some(3));
        assert_eq!(leading_escape_len(b"\x1b[1;5Cy"), Some(6));
        assert_eq!(leading_escape_len(b"\x1bOB"), Some(3));
        assert_eq!(leading_escape_len(b"\x1bODn"), Some(3));
    }

    #[test]
    fn sequence_must_start_at_front() {
        assert_eq!(leading_escape_len(b"y\x1b[A"), None);
        assert_eq!(leading_escape_len(b"\x1bx"), None);
        assert_eq!(leading_escape_len(b"\x1b"), None);
    }

    #[test]
    fn strip_removes_colors_and_keeps_text() {
        assert_eq!(
            strip_ansi("\x1b[31mError:\x1b[39m bad token"),
            "Error: bad token"
        );
        assert!(matches!(strip_ansi("plain"), Cow::Borrowed("plain")));
        assert_eq!(strip_ansi("\u{9b}1mbold"), "bold");
    }
}
