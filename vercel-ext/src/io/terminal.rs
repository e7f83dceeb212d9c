//! Terminal mode, prompt drawing and interrupt delivery.

use std::io::{self, Write};

use crossterm::cursor::{MoveToColumn, MoveUp, RestorePosition, SavePosition};
use crossterm::queue;
use crossterm::terminal::{self as term, Clear, ClearType};
use nix::sys::signal::{Signal, raise};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, warn};

/// Terminal operations the prompt needs from its host process.
pub trait TerminalControl {
    fn is_raw(&self) -> io::Result<bool>;
    fn set_raw(&self, enabled: bool) -> io::Result<()>;
    /// Deliver SIGINT to the current process.
    fn raise_interrupt(&self) -> io::Result<()>;
}

/// Controls the real controlling terminal.
pub struct ProcessTerminal;

impl TerminalControl for ProcessTerminal {
    fn is_raw(&self) -> io::Result<bool> {
        term::is_raw_mode_enabled()
    }

    fn set_raw(&self, enabled: bool) -> io::Result<()> {
        if enabled {
            term::enable_raw_mode()
        } else {
            term::disable_raw_mode()
        }
    }

    fn raise_interrupt(&self) -> io::Result<()> {
        raise(Signal::SIGINT).map_err(io::Error::from)
    }
}

/// Keeps the terminal raw while alive and restores the prior mode on drop.
pub struct RawModeGuard<'a, T: TerminalControl + ?Sized> {
    terminal: &'a T,
    restore: bool,
}

impl<'a, T: TerminalControl + ?Sized> RawModeGuard<'a, T> {
    /// Enter raw mode when `input_is_terminal` and the terminal is not raw yet.
    pub fn acquire(terminal: &'a T, input_is_terminal: bool) -> io::Result<Self> {
        let restore = input_is_terminal && !terminal.is_raw()?;
        if restore {
            terminal.set_raw(true)?;
            debug!("raw mode enabled");
        }
        Ok(Self { terminal, restore })
    }

    /// Re-apply raw mode after the process was resumed.
    pub fn reassert(&self) -> io::Result<()> {
        if self.restore {
            self.terminal.set_raw(false)?;
            self.terminal.set_raw(true)?;
        }
        Ok(())
    }

    /// Restore the original mode now.
    pub fn release(mut self) {
        self.restore_mode();
    }

    fn restore_mode(&mut self) {
        if std::mem::take(&mut self.restore)
            && let Err(err) = self.terminal.set_raw(false)
        {
            warn!(err = %err, "failed to restore terminal mode");
        }
    }
}

impl<T: TerminalControl + ?Sized> Drop for RawModeGuard<'_, T> {
    fn drop(&mut self) {
        self.restore_mode();
    }
}

/// Listener for SIGCONT, if one can be installed.
pub fn resume_listener() -> Option<tokio::signal::unix::Signal> {
    match signal(SignalKind::from_raw(Signal::SIGCONT as i32)) {
        Ok(listener) => Some(listener),
        Err(err) => {
            warn!(err = %err, "cannot listen for SIGCONT");
            None
        }
    }
}

/// Line separator for prompt output. Raw mode disables output post-processing,
/// so terminals need an explicit carriage return.
pub fn line_break(output_is_terminal: bool) -> &'static str {
    if output_is_terminal { "\r\n" } else { "\n" }
}

/// Write prompt `lines` to `out`.
///
/// An update on a terminal rewrites the previously drawn lines in place and
/// leaves the cursor where it was. Updates on other outputs are skipped.
pub fn draw_prompt<W: Write>(
    out: &mut W,
    lines: &[String],
    output_is_terminal: bool,
    is_update: bool,
) -> io::Result<()> {
    if is_update && !output_is_terminal {
        return Ok(());
    }
    if is_update {
        queue!(out, SavePosition, MoveToColumn(0))?;
        for _ in 1..lines.len() {
            queue!(out, MoveUp(1), Clear(ClearType::CurrentLine))?;
        }
    }
    out.write_all(lines.join(line_break(output_is_terminal)).as_bytes())?;
    if is_update {
        queue!(out, RestorePosition)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTerminal;

    fn lines() -> Vec<String> {
        vec!["[Automatic abort in 5 seconds]".to_string(), "Go? [y/n] ".to_string()]
    }

    #[test]
    fn first_draw_writes_plain_lines() {
        let mut out = Vec::new();
        draw_prompt(&mut out, &lines(), false, false).expect("draw");
        assert_eq!(out, b"[Automatic abort in 5 seconds]\nGo? [y/n] ");

        let mut tty = Vec::new();
        draw_prompt(&mut tty, &lines(), true, false).expect("draw");
        assert_eq!(tty, b"[Automatic abort in 5 seconds]\r\nGo? [y/n] ");
    }

    #[test]
    fn update_on_terminal_rewrites_in_place() {
        let mut out = Vec::new();
        draw_prompt(&mut out, &lines(), true, true).expect("draw");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("\x1b7\x1b[1G\x1b[1A\x1b[2K"));
        assert!(text.ends_with("Go? [y/n] \x1b8"));
    }

    #[test]
    fn update_on_pipe_is_skipped() {
        let mut out = Vec::new();
        draw_prompt(&mut out, &lines(), false, true).expect("draw");
        assert!(out.is_empty());
    }

    #[test]
    fn guard_restores_only_what_it_changed() {
        let terminal = RecordingTerminal::default();
        {
            let _guard = RawModeGuard::acquire(&terminal, true).expect("guard");
            assert!(terminal.is_raw().expect("raw"));
        }
        assert!(!terminal.is_raw().expect("raw"));

        let already_raw = RecordingTerminal::raw();
        drop(RawModeGuard::acquire(&already_raw, true).expect("guard"));
        assert!(already_raw.is_raw().expect("raw"));

        let piped = RecordingTerminal::default();
        drop(RawModeGuard::acquire(&piped, false).expect("guard"));
        assert_eq!(piped.mode_changes(), 0);
    }

    #[test]
    fn reassert_cycles_mode_only_for_an_owned_raw_mode() {
        let terminal = RecordingTerminal::default();
        let guard = RawModeGuard::acquire(&terminal, true).expect("guard");
        assert_eq!(terminal.mode_changes(), 1);
        guard.reassert().expect("reassert");
        assert_eq!(terminal.mode_changes(), 3);
        assert!(terminal.is_raw().expect("raw"));

        let already_raw = RecordingTerminal::raw();
        let guard = RawModeGuard::acquire(&already_raw, true).expect("guard");
        guard.reassert().expect("reassert");
        assert_eq!(already_raw.mode_changes(), 0);
        assert!(already_raw.is_raw().expect("raw"));
    }
}
