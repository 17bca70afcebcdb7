//! PTY wrapper using portable-pty.
//!
//! Spawns a shell on a pseudo-terminal and bridges the blocking pty file
//! descriptors onto tokio channels:
//!
//! - a reader thread pushes output chunks into an unbounded channel that
//!   closes once the pty reaches EOF,
//! - a writer thread drains an input channel into the pty,
//! - a waiter thread owns the child, services kill requests and publishes
//!   the exit code on a `watch` channel.

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use webterm_core::{TermError, TermResult, DEFAULT_COLS, DEFAULT_ROWS};

const READ_BUF_SIZE: usize = 8192;

/// How often the waiter polls the child between kill requests.
const WAIT_POLL: Duration = Duration::from_millis(20);

/// What to run inside a new pty.
#[derive(Debug, Clone)]
pub struct ShellSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Preferred start directory; see [`resolve_start_dir`].
    pub start_dir: PathBuf,
    /// Value of `TERM` in the child environment.
    pub term: String,
    /// Extra variables layered over the server's own environment.
    pub env: HashMap<String, String>,
}

impl ShellSpec {
    /// A spec that runs `program` with no arguments in the current directory.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            start_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            term: "xterm-256color".to_string(),
            env: HashMap::new(),
        }
    }
}

/// Pick the shell's working directory: `preferred` when it is an existing
/// directory, otherwise the server's own working directory.
pub fn resolve_start_dir(preferred: &Path) -> PathBuf {
    if preferred.is_dir() {
        return preferred.to_path_buf();
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
}

/// A managed PTY instance. Dropping the handle kills the process.
pub struct PtyHandle {
    /// The master for resize operations (Mutex because MasterPty is not Sync).
    master: Mutex<Box<dyn MasterPty + Send>>,
    input_tx: mpsc::UnboundedSender<Vec<u8>>,
    output_rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    exit_rx: watch::Receiver<Option<u32>>,
    kill_tx: Mutex<std_mpsc::Sender<()>>,
    size: Mutex<(u16, u16)>,
    pid: Option<u32>,
}

impl PtyHandle {
    /// Spawn `spec` on a new pty of the given size.
    pub fn spawn(spec: &ShellSpec, cols: u16, rows: u16) -> TermResult<Self> {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(pty_size(cols, rows))
            .map_err(|e| TermError::Spawn(format!("failed to open PTY: {e}")))?;

        let cwd = resolve_start_dir(&spec.start_dir);
        let mut cmd = CommandBuilder::new(&spec.program);
        cmd.args(&spec.args);
        cmd.cwd(&cwd);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd.env("TERM", &spec.term);

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| TermError::Spawn(format!("{}: {e}", spec.program)))?;
        // The child holds its own copy; closing ours lets the reader see EOF.
        drop(pair.slave);

        let pid = child.process_id();

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| TermError::Spawn(format!("failed to clone PTY reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| TermError::Spawn(format!("failed to take PTY writer: {e}")))?;

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = std_mpsc::channel();

        std::thread::Builder::new()
            .name("pty-reader".into())
            .spawn(move || read_loop(reader, output_tx))?;
        std::thread::Builder::new()
            .name("pty-writer".into())
            .spawn(move || write_loop(writer, input_rx))?;
        std::thread::Builder::new()
            .name("pty-waiter".into())
            .spawn(move || {
                let code = wait_loop(child, kill_rx);
                debug!(code, "PTY child exited");
                exit_tx.send_replace(Some(code));
            })?;

        info!(
            program = %spec.program,
            cwd = %cwd.display(),
            pid = ?pid,
            cols,
            rows,
            "PTY spawned"
        );

        Ok(Self {
            master: Mutex::new(pair.master),
            input_tx,
            output_rx: Mutex::new(Some(output_rx)),
            exit_rx,
            kill_tx: Mutex::new(kill_tx),
            size: Mutex::new((cols, rows)),
            pid,
        })
    }

    /// Queue bytes for the pty. After exit the bytes are dropped and logged.
    pub fn write(&self, data: &[u8]) {
        if self.has_exited() || self.input_tx.send(data.to_vec()).is_err() {
            debug!(pid = ?self.pid, len = data.len(), "write after PTY exit ignored");
        }
    }

    /// Resize the PTY. Zero dimensions are raised to 1.
    pub fn resize(&self, cols: u16, rows: u16) -> TermResult<()> {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let master = self
            .master
            .lock()
            .map_err(|_| TermError::Other("PTY master lock poisoned".into()))?;
        master
            .resize(pty_size(cols, rows))
            .map_err(|e| TermError::Other(format!("PTY resize failed: {e}")))?;
        drop(master);
        if let Ok(mut size) = self.size.lock() {
            *size = (cols, rows);
        }
        debug!(cols, rows, "PTY resized");
        Ok(())
    }

    /// Take the output stream. Only the first call returns `Some`.
    ///
    /// The receiver yields raw chunks in order and ends once the pty reaches EOF.
    pub fn take_output(&self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.output_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    /// Subscribe to the exit notification. The value turns `Some(code)`
    /// exactly once.
    pub fn exit_watch(&self) -> watch::Receiver<Option<u32>> {
        self.exit_rx.clone()
    }

    /// Wait until the child process has exited and return its exit code.
    pub async fn wait(&self) -> u32 {
        let mut rx = self.exit_rx.clone();
        let code = match rx.wait_for(Option::is_some).await {
            Ok(code) => *code,
            Err(_) => None,
        };
        code.unwrap_or(u32::MAX)
    }

    pub fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    /// Terminate the child: SIGHUP first, SIGKILL if it is still alive
    /// shortly after. Safe to call any number of times; the exit watch
    /// always fires afterwards.
    pub fn kill(&self) {
        if self.has_exited() {
            return;
        }
        match self.kill_tx.lock() {
            Ok(tx) => {
                if tx.send(()).is_err() {
                    debug!(pid = ?self.pid, "PTY waiter already gone");
                }
            }
            Err(_) => warn!(pid = ?self.pid, "PTY kill lock poisoned"),
        }
    }

    /// Current terminal size as `(cols, rows)`.
    pub fn size(&self) -> (u16, u16) {
        self.size
            .lock()
            .map(|s| *s)
            .unwrap_or((DEFAULT_COLS, DEFAULT_ROWS))
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        self.kill();
    }
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Reap the child, killing it when asked or when the handle goes away.
///
/// `Child::kill` on unix sends SIGHUP, gives the process a short grace
/// period and then sends SIGKILL, so a shell that ignores hangups still dies.
fn wait_loop(mut child: Box<dyn Child + Send + Sync>, kill_rx: std_mpsc::Receiver<()>) -> u32 {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.exit_code(),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "wait on PTY child failed");
                return u32::MAX;
            }
        }
        match kill_rx.recv_timeout(WAIT_POLL) {
            Ok(()) => {
                if let Err(e) = ChildKiller::kill(&mut *child) {
                    debug!(error = %e, "PTY kill failed (already gone?)");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                if let Err(e) = ChildKiller::kill(&mut *child) {
                    debug!(error = %e, "PTY kill on drop failed");
                }
                return match child.wait() {
                    Ok(status) => status.exit_code(),
                    Err(_) => u32::MAX,
                };
            }
        }
    }
}

fn read_loop(mut reader: Box<dyn Read + Send>, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            // EIO once the slave side is gone
            Err(e) => {
                debug!(error = %e, "PTY read ended");
                break;
            }
        }
    }
}

fn write_loop(mut writer: Box<dyn Write + Send>, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(data) = rx.blocking_recv() {
        if let Err(e) = writer.write_all(&data).and_then(|()| writer.flush()) {
            debug!(error = %e, "PTY write failed, dropping further input");
            break;
        }
    }
}
