//! Fakes shared by unit and integration tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use crate::error::VercelError;
use crate::io::bin_path::PACKAGE_MANIFEST;
use crate::io::confirm::{Confirm, Confirmer};
use crate::io::terminal::TerminalControl;
use crate::io::vercel::VercelOptions;

/// In-memory terminal that records mode changes and interrupts.
#[derive(Debug, Default)]
pub struct RecordingTerminal {
    raw: Cell<bool>,
    mode_changes: Cell<usize>,
    interrupts: Cell<usize>,
}

impl RecordingTerminal {
    /// A terminal that starts in raw mode.
    pub fn raw() -> Self {
        Self {
            raw: Cell::new(true),
            ..Self::default()
        }
    }

    pub fn mode_changes(&self) -> usize {
        self.mode_changes.get()
    }

    pub fn interrupts(&self) -> usize {
        self.interrupts.get()
    }
}

impl TerminalControl for RecordingTerminal {
    fn is_raw(&self) -> io::Result<bool> {
        Ok(self.raw.get())
    }

    fn set_raw(&self, enabled: bool) -> io::Result<()> {
        self.raw.set(enabled);
        self.mode_changes.set(self.mode_changes.get() + 1);
        Ok(())
    }

    fn raise_interrupt(&self) -> io::Result<()> {
        self.interrupts.set(self.interrupts.get() + 1);
        Ok(())
    }
}

/// Answers prompts from a queue and records what was asked.
///
/// An exhausted queue behaves like closed input.
#[derive(Debug)]
pub struct ScriptedConfirmer {
    answers: RefCell<VecDeque<bool>>,
    asked: RefCell<Vec<String>>,
    can_prompt: bool,
}

impl ScriptedConfirmer {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().copied().collect()),
            asked: RefCell::new(Vec::new()),
            can_prompt: true,
        }
    }

    /// A confirmer for runs without a user, such as `/dev/null` input.
    pub fn unattended() -> Self {
        Self {
            can_prompt: false,
            ..Self::new(&[])
        }
    }

    /// Prompt texts in the order they were asked.
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }
}

impl Confirmer for ScriptedConfirmer {
    async fn can_prompt(&self) -> bool {
        self.can_prompt
    }

    async fn confirm(&self, request: &Confirm) -> Result<bool, VercelError> {
        self.asked.borrow_mut().push(request.prompt().to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(VercelError::input_ended)
    }
}

/// A project directory with a fake `vercel` package whose binary is a shell
/// script. Every call appends its arguments to `calls.log`.
pub struct FakeVercel {
    dir: TempDir,
    bin: PathBuf,
}

impl FakeVercel {
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest = dir.path().join(PACKAGE_MANIFEST);
        let package_dir = manifest.parent().expect("package dir").to_path_buf();
        fs::create_dir_all(package_dir.join("bin")).expect("create package");
        fs::write(&manifest, r#"{"name":"vercel","bin":{"vercel":"bin/vercel"}}"#)
            .expect("write manifest");

        let bin = package_dir.join("bin/vercel");
        let log = dir.path().join("calls.log");
        let script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{}'\n{body}\n",
            log.display()
        );
        fs::write(&bin, script).expect("write script");
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).expect("chmod");
        Self { dir, bin }
    }

    /// Project root containing `node_modules/vercel`.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    /// Runner options pointing at the fake with short timeouts.
    pub fn options(&self) -> VercelOptions {
        VercelOptions {
            bin: Some(self.bin.clone()),
            timeout: Some(Duration::from_secs(5)),
            kill_timeout: Some(Duration::from_millis(200)),
            ..VercelOptions::default()
        }
    }

    /// Argument lines of every call so far.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("calls.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
