//! Interactive yes/no confirmation with an optional countdown.
//!
//! The session suspends on three events: new input, a one-second tick and
//! SIGCONT. Byte decoding and rendering come from [`crate::core::prompt`].

use std::future::Future;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, instrument};

use crate::core::prompt::{
    CountdownLine, DecodeState, KeyAction, KeyDecoder, render_prompt, usage_hint,
};
use crate::error::VercelError;
use crate::io::input::{self, InputStream};
use crate::io::terminal::{
    ProcessTerminal, RawModeGuard, TerminalControl, draw_prompt, line_break, resume_listener,
};

const TICK: Duration = Duration::from_secs(1);

/// A yes/no question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirm {
    prompt: String,
    default: Option<bool>,
    timeout_secs: Option<u64>,
}

impl Confirm {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            default: None,
            timeout_secs: None,
        }
    }

    /// Answer used when the user presses enter.
    pub fn default_response(mut self, value: bool) -> Self {
        self.default = Some(value);
        self
    }

    /// Fail with a timeout after this many seconds without an answer.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Ask on stderr, reading the shared stdin.
    pub async fn ask(&self) -> Result<bool, VercelError> {
        let Some(mut stdin) = input::acquire().await else {
            return Err(VercelError::input_ended());
        };
        let mut stderr = io::stderr();
        let output_is_terminal = stderr.is_terminal();
        self.ask_with(&mut *stdin, &mut stderr, output_is_terminal, &ProcessTerminal)
            .await
    }

    /// Ask using explicit streams and terminal control.
    #[instrument(skip_all, fields(timeout_secs = ?self.timeout_secs))]
    pub async fn ask_with<R, W, T>(
        &self,
        input: &mut InputStream<R>,
        output: &mut W,
        output_is_terminal: bool,
        terminal: &T,
    ) -> Result<bool, VercelError>
    where
        R: AsyncRead + Unpin,
        W: Write,
        T: TerminalControl + ?Sized,
    {
        let raw = RawModeGuard::acquire(terminal, input.is_terminal())?;
        let mut session = Session {
            confirm: self,
            output,
            output_is_terminal,
            lines: Vec::new(),
        };

        let initial = match self.timeout_secs {
            None => CountdownLine::Hidden,
            Some(0) => CountdownLine::Cleared,
            Some(total) => CountdownLine::Remaining {
                total,
                remaining: total,
            },
        };
        session.draw(initial, false)?;
        if self.timeout_secs == Some(0) {
            return Err(session.time_out()?);
        }

        let mut ticker = self.timeout_secs.map(|_| {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let mut remaining = self.timeout_secs.map_or(0, |total| total - 1);
        let mut resume = if input.is_terminal() {
            resume_listener()
        } else {
            None
        };
        let mut decoder = KeyDecoder::new(self.default, output_is_terminal);

        loop {
            while let Some(action) = decoder.decode(input.pending_mut()) {
                match action {
                    KeyAction::Ignored => {}
                    KeyAction::NeedMore => break,
                    KeyAction::Invalid { echo } => session.reject(echo.as_deref())?,
                    KeyAction::Answer { value, echo } => {
                        session.finish(&echo)?;
                        debug!(value, "prompt answered");
                        return Ok(value);
                    }
                    KeyAction::Interrupt { echo } => {
                        session.write(&echo)?;
                        raw.release();
                        terminal.raise_interrupt()?;
                        return Ok(false);
                    }
                }
            }

            tokio::select! {
                filled = input.fill() => {
                    if !filled? {
                        session.write("INPUT STREAM GONE\n")?;
                        if decoder.state() == DecodeState::ParsingEscape {
                            return Err(VercelError::Timeout {
                                reason: "Unexpected end of input stream".to_string(),
                            });
                        }
                        return Err(VercelError::input_ended());
                    }
                }
                () = next_tick(&mut ticker) => {
                    if let Some(total) = self.timeout_secs {
                        session.draw(CountdownLine::Remaining { total, remaining }, true)?;
                    }
                    if remaining == 0 {
                        return Err(session.time_out()?);
                    }
                    remaining -= 1;
                }
                () = next_resume(&mut resume) => {
                    debug!("resumed, re-entering raw mode");
                    raw.reassert()?;
                }
            }
        }
    }
}

struct Session<'a, W> {
    confirm: &'a Confirm,
    output: &'a mut W,
    output_is_terminal: bool,
    lines: Vec<String>,
}

impl<W: Write> Session<'_, W> {
    fn draw(&mut self, countdown: CountdownLine, is_update: bool) -> io::Result<()> {
        self.lines = render_prompt(&self.confirm.prompt, self.confirm.default, countdown);
        draw_prompt(self.output, &self.lines, self.output_is_terminal, is_update)
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        let text = text.replace('\n', line_break(self.output_is_terminal));
        self.output.write_all(text.as_bytes())?;
        self.output.flush()
    }

    fn cleared(&self) -> CountdownLine {
        match self.confirm.timeout_secs {
            Some(_) => CountdownLine::Cleared,
            None => CountdownLine::Hidden,
        }
    }

    fn reject(&mut self, echo: Option<&str>) -> io::Result<()> {
        if let Some(echo) = echo {
            self.write(echo)?;
        }
        self.write(&format!("\n{}\n", usage_hint(self.confirm.default)))?;
        draw_prompt(self.output, &self.lines, self.output_is_terminal, false)
    }

    fn finish(&mut self, echo: &str) -> io::Result<()> {
        self.write(echo)?;
        self.draw(self.cleared(), true)?;
        self.write("\n")
    }

    fn time_out(&mut self) -> io::Result<VercelError> {
        self.write("TIME OUT\n")?;
        Ok(VercelError::timeout())
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_resume(resume: &mut Option<tokio::signal::unix::Signal>) {
    match resume {
        Some(listener) => {
            if listener.recv().await.is_none() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending().await,
    }
}

/// Source of answers for the orchestrator.
pub trait Confirmer {
    /// Whether a question could be answered right now.
    fn can_prompt(&self) -> impl Future<Output = bool>;

    fn confirm(&self, request: &Confirm) -> impl Future<Output = Result<bool, VercelError>>;
}

/// Asks the user on the controlling terminal.
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn can_prompt(&self) -> impl Future<Output = bool> {
        input::is_readable()
    }

    fn confirm(&self, request: &Confirm) -> impl Future<Output = Result<bool, VercelError>> {
        request.ask()
    }
}
