//! Process-wide standard input shared by prompts and interactive runs.
//!
//! Entry points call [`init`] before anything reads stdin and [`dispose`]
//! when done. Holders take the stream through an async lock, so at most one
//! prompt or interactive child uses it at a time. Bytes read but not
//! consumed stay buffered for the next holder.

use std::collections::VecDeque;
use std::io::{self, IsTerminal};
use std::os::fd::AsFd;
use std::os::unix::fs::FileTypeExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt, Stdin};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

const READ_CHUNK: usize = 1024;

/// Byte stream with a pushback buffer.
#[derive(Debug)]
pub struct InputStream<R> {
    reader: R,
    pending: VecDeque<u8>,
    ended: bool,
    is_terminal: bool,
}

impl<R: AsyncRead + Unpin> InputStream<R> {
    pub fn new(reader: R, is_terminal: bool) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
            ended: false,
            is_terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.is_terminal
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Bytes read from the source but not consumed yet.
    pub fn pending_mut(&mut self) -> &mut VecDeque<u8> {
        &mut self.pending
    }

    /// Wait for more bytes. Returns `false` once the source has ended.
    ///
    /// Cancel safe: dropping the future loses no data.
    pub async fn fill(&mut self) -> io::Result<bool> {
        if self.ended {
            return Ok(false);
        }
        let mut chunk = [0u8; READ_CHUNK];
        let read = self.reader.read(&mut chunk).await?;
        if read == 0 {
            self.ended = true;
            return Ok(false);
        }
        self.pending.extend(&chunk[..read]);
        Ok(true)
    }
}

pub type StdinStream = InputStream<Stdin>;
pub type SharedStdin = Arc<Mutex<StdinStream>>;

static STDIN: StdMutex<Option<SharedStdin>> = StdMutex::new(None);
static READABLE: AtomicBool = AtomicBool::new(false);

/// Set up the shared stdin. Repeated calls are no-ops.
pub fn init() {
    let mut slot = STDIN.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return;
    }
    let is_terminal = io::stdin().is_terminal();
    let readable = probe_readable();
    READABLE.store(readable, Ordering::Relaxed);
    debug!(is_terminal, readable, "shared stdin initialized");
    *slot = Some(Arc::new(Mutex::new(InputStream::new(
        tokio::io::stdin(),
        is_terminal,
    ))));
}

/// Release the shared stdin.
///
/// A read already in flight on the blocking pool cannot be cancelled;
/// entry points exit the process right after this.
pub fn dispose() {
    let mut slot = STDIN.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.take().is_some() {
        debug!("shared stdin disposed");
    }
    READABLE.store(false, Ordering::Relaxed);
}

/// Handle to the shared stdin, if [`init`] ran.
pub fn shared() -> Option<SharedStdin> {
    STDIN
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Wait for exclusive use of the shared stdin.
pub async fn acquire() -> Option<OwnedMutexGuard<StdinStream>> {
    Some(shared()?.lock_owned().await)
}

/// True while stdin can still deliver user input.
///
/// A terminal is readable. A character device that is not a terminal (such
/// as `/dev/null`) is not. Pipes and files are readable until they end.
pub async fn is_readable() -> bool {
    if !READABLE.load(Ordering::Relaxed) {
        return false;
    }
    match shared() {
        Some(stdin) => !stdin.lock().await.has_ended(),
        None => false,
    }
}

fn probe_readable() -> bool {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return true;
    }
    let Ok(fd) = stdin.as_fd().try_clone_to_owned() else {
        return false;
    };
    match std::fs::File::from(fd).metadata() {
        Ok(meta) => !meta.file_type().is_char_device(),
        Err(_) => false,
    }
}
