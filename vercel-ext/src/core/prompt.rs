//! Pure rendering and key decoding for the yes/no confirmation prompt.
//!
//! The async session in [`crate::io::confirm`] owns timing and terminal
//! state; everything that can be decided from bytes alone lives here.

use std::collections::VecDeque;
use std::fmt::Write as _;

use crate::core::escape;

const ESC: u8 = 0x1b;
const CTRL_C: u8 = 0x03;
const BACKSPACE: u8 = 0x08;

/// State of the countdown line above the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownLine {
    /// Prompt has no timeout.
    Hidden,
    /// Seconds left, right-aligned to the width of `total`.
    Remaining { total: u64, remaining: u64 },
    /// Answered or timed out: the line is kept but blank.
    Cleared,
}

/// Suffix naming the accepted answers, capitalizing the default.
pub fn choices(default: Option<bool>) -> &'static str {
    match default {
        Some(true) => "[Y/n]",
        Some(false) => "[y/N]",
        None => "[y/n]",
    }
}

/// Render the prompt into display lines.
pub fn render_prompt(text: &str, default: Option<bool>, countdown: CountdownLine) -> Vec<String> {
    let mut full = String::new();
    match countdown {
        CountdownLine::Hidden => {}
        CountdownLine::Remaining { total, remaining } => {
            let width = total.to_string().len();
            let _ = writeln!(full, "[Automatic abort in {remaining:>width$} seconds]");
        }
        CountdownLine::Cleared => full.push('\n'),
    }
    let _ = write!(full, "{text} {} ", choices(default));
    full.split('\n').map(str::to_string).collect()
}

/// Message shown after a rejected key.
pub fn usage_hint(default: Option<bool>) -> String {
    let mut hint = "Please enter 'y' or 'n'".to_string();
    if let Some(value) = default {
        let _ = write!(
            hint,
            " or press enter to accept the default of '{}'",
            if value { 'y' } else { 'n' }
        );
    }
    hint
}

/// Visible echo for one input byte.
///
/// Control bytes use caret notation, except backspace through carriage
/// return which are never echoed. Bytes above DEL only show up on a terminal.
pub fn echo_for(byte: u8, output_is_terminal: bool) -> Option<String> {
    match byte {
        0x08..=0x0d => None,
        0x00..=0x1f => Some(format!("^{}", char::from(byte + 0x40))),
        0x7f => Some("^?".to_string()),
        0x20..=0x7e => Some(char::from(byte).to_string()),
        _ if output_is_terminal => Some(format!("\\x{byte:02x}")),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    AwaitingByte,
    /// ESC seen, waiting for the rest of the sequence.
    ParsingEscape,
    /// Last ESC did not start a sequence; the next byte is taken literally.
    EscapeRejected,
}

/// Outcome of decoding buffered input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Bytes consumed with no visible effect.
    Ignored,
    /// An escape sequence is incomplete.
    NeedMore,
    /// Not an answer. `echo` is shown before the usage hint.
    Invalid { echo: Option<String> },
    /// Prompt resolved. `echo` is printed before the final newline.
    Answer { value: bool, echo: String },
    /// Ctrl-C.
    Interrupt { echo: String },
}

/// Byte-at-a-time decoder for prompt input.
#[derive(Debug)]
pub struct KeyDecoder {
    default: Option<bool>,
    output_is_terminal: bool,
    state: DecodeState,
}

impl KeyDecoder {
    pub fn new(default: Option<bool>, output_is_terminal: bool) -> Self {
        Self {
            default,
            output_is_terminal,
            state: DecodeState::AwaitingByte,
        }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Decode from the front of `pending`, removing what was consumed.
    ///
    /// Returns `None` when `pending` is empty. Bytes after an answer stay in
    /// `pending` for the next reader.
    pub fn decode(&mut self, pending: &mut VecDeque<u8>) -> Option<KeyAction> {
        let &byte = pending.front()?;

        let escape_start = match self.state {
            DecodeState::ParsingEscape => true,
            DecodeState::AwaitingByte => byte == ESC,
            DecodeState::EscapeRejected => false,
        };
        if escape_start {
            if pending.len() < 2 {
                self.state = DecodeState::ParsingEscape;
                return Some(KeyAction::NeedMore);
            }
            match escape::leading_escape_len(pending.make_contiguous()) {
                Some(len) => {
                    pending.drain(..len);
                    self.state = DecodeState::AwaitingByte;
                }
                None => {
                    pending.pop_front();
                    self.state = DecodeState::EscapeRejected;
                }
            }
            return Some(KeyAction::Ignored);
        }

        pending.pop_front();
        self.state = DecodeState::AwaitingByte;
        Some(self.classify(byte))
    }

    fn classify(&self, byte: u8) -> KeyAction {
        match byte {
            BACKSPACE => KeyAction::Ignored,
            CTRL_C => KeyAction::Interrupt {
                echo: "^C".to_string(),
            },
            b'y' | b'Y' | b'n' | b'N' => KeyAction::Answer {
                value: byte.eq_ignore_ascii_case(&b'y'),
                echo: char::from(byte).to_string(),
            },
            b'\r' | b'\n' => match self.default {
                Some(value) => KeyAction::Answer {
                    value,
                    echo: if value { "y" } else { "n" }.to_string(),
                },
                None => KeyAction::Invalid { echo: None },
            },
            _ => KeyAction::Invalid {
                echo: echo_for(byte, self.output_is_terminal),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut KeyDecoder, input: &[u8]) -> (Vec<KeyAction>, VecDeque<u8>) {
        let mut pending: VecDeque<u8> = input.iter().copied().collect();
        let mut actions = Vec::new();
        while let Some(action) = decoder.decode(&mut pending) {
            let stop = matches!(
                action,
                KeyAction::Answer { .. } | KeyAction::Interrupt { .. } | KeyAction::NeedMore
            );
            actions.push(action);
            if stop {
                break;
            }
        }
        (actions, pending)
    }

    #[test]
    fn render_without_countdown_is_single_line() {
        assert_eq!(
            render_prompt("Link project?", Some(false), CountdownLine::Hidden),
            vec!["Link project? [y/N] "]
        );
    }

    #[test]
    fn render_pads_remaining_to_total_width() {
        assert_eq!(
            render_prompt(
                "Retry?",
                None,
                CountdownLine::Remaining {
                    total: 30,
                    remaining: 7
                }
            ),
            vec!["[Automatic abort in  7 seconds]", "Retry? [y/n] "]
        );
    }

    #[test]
    fn cleared_countdown_keeps_blank_line() {
        assert_eq!(
            render_prompt("Go?", Some(true), CountdownLine::Cleared),
            vec!["", "Go? [Y/n] "]
        );
    }

    #[test]
    fn usage_hint_mentions_default() {
        assert_eq!(usage_hint(None), "Please enter 'y' or 'n'");
        assert_eq!(
            usage_hint(Some(false)),
            "Please enter 'y' or 'n' or press enter to accept the default of 'n'"
        );
    }

    #[test]
    fn echo_uses_caret_notation() {
        assert_eq!(echo_for(0x00, true).as_deref(), Some("^@"));
        assert_eq!(echo_for(0x1b, false).as_deref(), Some("^["));
        assert_eq!(echo_for(0x1f, false).as_deref(), Some("^_"));
        assert_eq!(echo_for(0x7f, false).as_deref(), Some("^?"));
        assert_eq!(echo_for(0x09, true), None);
        assert_eq!(echo_for(b'q', false).as_deref(), Some("q"));
        assert_eq!(echo_for(0xc3, true).as_deref(), Some("\\xc3"));
        assert_eq!(echo_for(0xc3, false), None);
    }

    #[test]
    fn letters_answer_and_echo_themselves() {
        let mut decoder = KeyDecoder::new(None, true);
        let (actions, _) = decode_all(&mut decoder, b"Y");
        assert_eq!(
            actions,
            vec![KeyAction::Answer {
                value: true,
                echo: "Y".to_string()
            }]
        );

        let (actions, _) = decode_all(&mut decoder, b"n");
        assert_eq!(
            actions,
            vec![KeyAction::Answer {
                value: false,
                echo: "n".to_string()
            }]
        );
    }

    #[test]
    fn enter_uses_default_or_is_invalid() {
        let mut with_default = KeyDecoder::new(Some(false), true);
        let (actions, _) = decode_all(&mut with_default, b"\r");
        assert_eq!(
            actions,
            vec![KeyAction::Answer {
                value: false,
                echo: "n".to_string()
            }]
        );

        let mut without = KeyDecoder::new(None, true);
        let (actions, _) = decode_all(&mut without, b"\n");
        assert_eq!(actions, vec![KeyAction::Invalid { echo: None }]);
    }

    #[test]
    fn bytes_after_answer_stay_buffered() {
        let mut decoder = KeyDecoder::new(None, false);
        let (actions, rest) = decode_all(&mut decoder, b"xyrest");
        assert_eq!(
            actions,
            vec![
                KeyAction::Invalid {
                    echo: Some("x".to_string())
                },
                KeyAction::Answer {
                    value: true,
                    echo: "y".to_string()
                },
            ]
        );
        assert_eq!(rest, b"rest".to_vec());
    }

    #[test]
    fn arrow_keys_are_swallowed() {
        let mut decoder = KeyDecoder::new(None, true);
        let (actions, _) = decode_all(&mut decoder, b"\x1b[A\x1b[1;5Dy");
        assert_eq!(
            actions,
            vec![
                KeyAction::Ignored,
                KeyAction::Ignored,
                KeyAction::Answer {
                    value: true,
                    echo: "y".to_string()
                },
            ]
        );
    }

    #[test]
    fn lone_escape_waits_for_more() {
        let mut decoder = KeyDecoder::new(None, true);
        let (actions, rest) = decode_all(&mut decoder, b"\x1b");
        assert_eq!(actions, vec![KeyAction::NeedMore]);
        assert_eq!(decoder.state(), DecodeState::ParsingEscape);
        assert_eq!(rest, b"\x1b".to_vec());
    }

    #[test]
    fn rejected_escape_takes_next_byte_literally() {
        let mut decoder = KeyDecoder::new(None, true);
        let (actions, _) = decode_all(&mut decoder, b"\x1bY");
        assert_eq!(
            actions,
            vec![
                KeyAction::Ignored,
                KeyAction::Answer {
                    value: true,
                    echo: "Y".to_string()
                },
            ]
        );

        let mut decoder = KeyDecoder::new(None, true);
        let (actions, _) = decode_all(&mut decoder, b"\x1b\x1bx");
        assert_eq!(actions[0], KeyAction::Ignored);
        assert_eq!(
            actions[1],
            KeyAction::Invalid {
                echo: Some("^[".to_string())
            }
        );
        assert_eq!(decoder.state(), DecodeState::AwaitingByte);
    }

    #[test]
    fn backspace_ignored_and_ctrl_c_interrupts() {
        let mut decoder = KeyDecoder::new(Some(true), true);
        let (actions, _) = decode_all(&mut decoder, b"\x08\x03y");
        assert_eq!(
            actions,
            vec![
                KeyAction::Ignored,
                KeyAction::Interrupt {
                    echo: "^C".to_string()
                },
            ]
        );
    }
}
