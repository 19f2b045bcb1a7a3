//! Subprocess execution with combined output capture.
//!
//! Provides [`run_combined`], which spawns a prepared
//! [`tokio::process::Command`], collects stdout and stderr into a single
//! buffer in arrival order, and enforces a timeout and a cancellation token.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Maximum combined output kept (10 MiB).
///
/// Only the last `MAX_OUTPUT_BYTES` are kept, since the result line comes
/// at the end. Reading continues past the limit so the child never blocks
/// on a full pipe.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// How long to keep reading buffered output after killing a child.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// How long to wait for a killed child to be reaped.
const REAP_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8 * 1024;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

/// Result of [`run_combined`].
#[derive(Debug)]
pub struct CapturedRun {
    pub outcome: RunOutcome,
    /// Tail of the interleaved stdout and stderr, at most [`MAX_OUTPUT_BYTES`].
    pub output: Vec<u8>,
    /// True when earlier output was discarded to respect the limit.
    pub truncated: bool,
    pub duration: Duration,
}

impl CapturedRun {
    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Spawn `cmd`, capture its combined output, and wait for it to exit.
///
/// The child is killed when `timeout` elapses or `cancel` fires; output
/// read up to that point is kept. Stdin is closed. Returns `Err` only if
/// the process cannot be spawned or waited on.
pub async fn run_combined(
    cmd: &mut Command,
    timeout: Duration,
    cancel: &CancellationToken,
) -> std::io::Result<CapturedRun> {
    // `kill_on_drop(true)` ensures the child dies if this future is dropped.
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn()?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut output = OutputTail::default();

    let outcome = tokio::select! {
        status = async {
            drain(&mut stdout, &mut stderr, &mut output).await;
            child.wait().await
        } => RunOutcome::Exited(status?),
        () = tokio::time::sleep(timeout) => RunOutcome::TimedOut,
        () = cancel.cancelled() => RunOutcome::Cancelled,
    };

    if !matches!(outcome, RunOutcome::Exited(_)) {
        let _ = child.start_kill();
        let _ = tokio::time::timeout(REAP_GRACE, child.wait()).await;
        let _ = tokio::time::timeout(
            DRAIN_GRACE,
            drain(&mut stdout, &mut stderr, &mut output),
        )
        .await;
    }

    let (output, truncated) = output.finish();
    Ok(CapturedRun {
        outcome,
        output,
        truncated,
        duration: start.elapsed(),
    })
}

/// Keeps the last [`MAX_OUTPUT_BYTES`] of a byte stream.
///
/// The buffer grows to twice the limit before the front is dropped, so
/// trimming costs amortised constant time per byte.
#[derive(Debug, Default)]
struct OutputTail {
    buf: Vec<u8>,
    truncated: bool,
}

impl OutputTail {
    fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > 2 * MAX_OUTPUT_BYTES {
            self.trim();
        }
    }

    fn trim(&mut self) {
        if self.buf.len() > MAX_OUTPUT_BYTES {
            let excess = self.buf.len() - MAX_OUTPUT_BYTES;
            self.buf.drain(..excess);
            self.truncated = true;
        }
    }

    fn finish(mut self) -> (Vec<u8>, bool) {
        self.trim();
        (self.buf, self.truncated)
    }
}

/// Read both streams into `output` until each reaches EOF.
async fn drain<O, E>(stdout: &mut Option<O>, stderr: &mut Option<E>, output: &mut OutputTail)
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_buf = [0u8; READ_CHUNK];
    let mut err_buf = [0u8; READ_CHUNK];

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            res = read_chunk(stdout, &mut out_buf) => absorb(res, stdout, &out_buf, output),
            res = read_chunk(stderr, &mut err_buf) => absorb(res, stderr, &err_buf, output),
        }
    }
}

/// Read from `stream`, or never resolve if it is already closed.
async fn read_chunk<R: AsyncRead + Unpin>(
    stream: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match stream.as_mut() {
        Some(s) => s.read(buf).await,
        None => std::future::pending().await,
    }
}

fn absorb<R>(
    res: std::io::Result<usize>,
    stream: &mut Option<R>,
    buf: &[u8],
    output: &mut OutputTail,
) {
    match res {
        Ok(0) | Err(_) => *stream = None,
        Ok(n) => output.push(&buf[..n]),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
