//! Captured child output: ordered chunks, banner extraction and joining.

use std::sync::LazyLock;

use regex::bytes::Regex;

/// Output channel of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

static BANNER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s-u)\AVercel CLI ([^\r\n]*)\r?(?:\n(.*))?\z").unwrap()
});

/// Ordered record of everything a child wrote.
#[derive(Debug, Default)]
pub struct CapturedOutput {
    chunks: Vec<(Channel, Vec<u8>)>,
    version: Option<String>,
    finalized: bool,
}

impl CapturedOutput {
    pub fn push(&mut self, channel: Channel, data: &[u8]) {
        if !data.is_empty() {
            self.chunks.push((channel, data.to_vec()));
        }
    }

    pub fn chunks(&self) -> &[(Channel, Vec<u8>)] {
        &self.chunks
    }

    /// Pull the `Vercel CLI <version>` banner out of the first stderr chunk.
    ///
    /// The remainder of that chunk replaces it; an empty remainder drops the
    /// chunk. Safe to call more than once.
    pub fn finalize(&mut self) -> Option<&str> {
        if !self.finalized {
            self.finalized = true;
            self.extract_banner();
        }
        self.version.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn extract_banner(&mut self) {
        let Some(index) = self
            .chunks
            .iter()
            .position(|(channel, _)| *channel == Channel::Stderr)
        else {
            return;
        };
        let (version, rest) = {
            let Some(caps) = BANNER_RE.captures(&self.chunks[index].1) else {
                return;
            };
            let version = String::from_utf8_lossy(&caps[1]).into_owned();
            let rest = caps.get(2).map(|m| m.as_bytes().to_vec()).unwrap_or_default();
            (version, rest)
        };
        self.version = Some(version);
        if rest.is_empty() {
            self.chunks.remove(index);
        } else {
            self.chunks[index].1 = rest;
        }
    }

    /// Concatenate one channel, trimming a single trailing line terminator.
    /// `None` when the channel produced nothing.
    pub fn joined(&self, channel: Channel) -> Option<String> {
        let mut bytes = Vec::new();
        let mut seen = false;
        for (chunk_channel, data) in &self.chunks {
            if *chunk_channel == channel {
                seen = true;
                bytes.extend_from_slice(data);
            }
        }
        if !seen {
            return None;
        }
        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if text.ends_with('\n') {
            text.pop();
            if text.ends_with('\r') {
                text.pop();
            }
        }
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_keep_arrival_order() {
        let mut output = CapturedOutput::default();
        output.push(Channel::Stdout, b"a");
        output.push(Channel::Stderr, b"b");
        output.push(Channel::Stdout, b"c\n");
        assert_eq!(output.chunks().len(), 3);
        assert_eq!(output.joined(Channel::Stdout).as_deref(), Some("ac"));
        assert_eq!(output.joined(Channel::Stderr).as_deref(), Some("b"));
    }

    #[test]
    fn silent_channel_joins_to_none() {
        let mut output = CapturedOutput::default();
        output.push(Channel::Stdout, b"x");
        output.push(Channel::Stderr, b"");
        assert_eq!(output.joined(Channel::Stderr), None);
    }

    #[test]
    fn only_one_terminator_is_trimmed() {
        let mut output = CapturedOutput::default();
        output.push(Channel::Stdout, b"line\r\n\r\n");
        assert_eq!(output.joined(Channel::Stdout).as_deref(), Some("line\r\n"));
    }

    #[test]
    fn banner_with_trailing_text_keeps_remainder() {
        let mut output = CapturedOutput::default();
        output.push(Channel::Stdout, b"out");
        output.push(Channel::Stderr, b"Vercel CLI 32.5.0\r\nError: nope\n");
        assert_eq!(output.finalize(), Some("32.5.0"));
        assert_eq!(output.joined(Channel::Stderr).as_deref(), Some("Error: nope"));
        assert_eq!(output.finalize(), Some("32.5.0"));
        assert_eq!(output.chunks().len(), 2);
    }

    #[test]
    fn banner_only_chunk_is_dropped() {
        let mut output = CapturedOutput::default();
        output.push(Channel::Stderr, b"Vercel CLI 28.0.1\n");
        output.push(Channel::Stdout, b"user\n");
        assert_eq!(output.finalize(), Some("28.0.1"));
        assert_eq!(output.joined(Channel::Stderr), None);
        assert_eq!(output.joined(Channel::Stdout).as_deref(), Some("user"));
    }

    #[test]
    fn no_banner_leaves_chunks_untouched() {
        let mut output = CapturedOutput::default();
        output.push(Channel::Stderr, b"something else\n");
        assert_eq!(output.finalize(), None);
        assert_eq!(output.chunks()[0].1, b"something else\n".to_vec());
    }
}
