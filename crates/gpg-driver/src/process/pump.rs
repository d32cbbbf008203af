//! The readiness loop.
//!
//! One task, one `select!`, every pipe of the child in it. Each iteration
//! services whichever pipe is ready and goes back to waiting; no read or
//! write is ever awaited outside the `select!`. That is what keeps gpg from
//! blocking on a full stdout while we block on a full stdin, or from
//! waiting on the command fd while we are still feeding it data.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use zeroize::{Zeroize, Zeroizing};

use super::{AbortSignal, Control, LineBuffer, SpawnedProcess, StatusHandler};
use crate::error::GpgError;
use crate::status::parse_line;

/// Size of each read from a pipe.
const READ_CHUNK: usize = 64 * 1024;

/// Captured stderr beyond this is dropped (the pipe is still drained).
const MAX_STDERR: usize = 1024 * 1024;

/// stdout is not read while this much output waits for the sink.
const SINK_HIGH_WATER: usize = 256 * 1024;

/// How long pipes may stay open after the child has exited.
const EXIT_DRAIN_LIMIT: Duration = Duration::from_secs(5);

/// Default delay between `SIGTERM` and `SIGKILL`.
pub(crate) const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// Data fed to one of the child's input pipes.
pub enum Input {
    /// An in-memory buffer.
    Bytes(Vec<u8>),
    /// A streaming source; `path` names it in errors.
    Reader {
        /// The source.
        reader: Box<dyn AsyncRead + Send + Unpin>,
        /// Where it comes from.
        path: PathBuf,
    },
}

impl std::fmt::Debug for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Reader { path, .. } => write!(f, "Reader({})", path.display()),
        }
    }
}

/// Where the child's stdout goes.
pub enum Output {
    /// Collected into [`PumpOutput::stdout`].
    Memory,
    /// Streamed to a writer; `path` names it in errors.
    Writer {
        /// The destination.
        writer: Box<dyn AsyncWrite + Send + Unpin>,
        /// Where it goes.
        path: PathBuf,
    },
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::Writer { path, .. } => write!(f, "Writer({})", path.display()),
        }
    }
}

/// Everything the loop observed. Never a verdict: see [`crate::classify`].
#[derive(Debug, Default)]
pub struct PumpOutput {
    /// How the child exited, if it was reaped.
    pub exit_status: Option<ExitStatus>,
    /// stdout, when the output was [`Output::Memory`].
    pub stdout: Vec<u8>,
    /// Captured stderr (lossy UTF-8, bounded).
    pub stderr: String,
    /// Whether stderr was cut off.
    pub stderr_truncated: bool,
    /// The caller's abort handle fired, or the deadline passed.
    pub aborted: bool,
    /// The deadline (not the handle) caused the abort.
    pub timed_out: bool,
    /// The status handler stopped the run.
    pub fatal: bool,
    /// The (redacted) command line.
    pub command: String,
}

impl PumpOutput {
    /// The exit code, if the child exited normally.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.and_then(|s| s.code())
    }

    /// Whether the child exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_status.is_some_and(|s| s.success())
    }
}

/// Why the loop stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Aborted,
    TimedOut,
    Fatal,
}

/// Pending bytes for one input pipe, refilled from its source.
struct Feed {
    buf: Vec<u8>,
    pos: usize,
    scratch: Vec<u8>,
    reader: Option<Box<dyn AsyncRead + Send + Unpin>>,
    path: PathBuf,
}

impl Feed {
    fn new(input: Input) -> Self {
        match input {
            Input::Bytes(buf) => Self {
                buf,
                pos: 0,
                scratch: Vec::new(),
                reader: None,
                path: PathBuf::new(),
            },
            Input::Reader { reader, path } => Self {
                buf: Vec::new(),
                pos: 0,
                scratch: vec![0; READ_CHUNK],
                reader: Some(reader),
                path,
            },
        }
    }

    fn empty() -> Self {
        Self::new(Input::Bytes(Vec::new()))
    }

    fn exhausted(&self) -> bool {
        self.pos >= self.buf.len() && self.reader.is_none()
    }
}

// Inputs carry plaintext and key-generation parameters.
impl Drop for Feed {
    fn drop(&mut self) {
        self.buf.zeroize();
        self.scratch.zeroize();
    }
}

/// Outcome of one step on an input pipe.
enum FeedStep {
    Wrote(usize),
    Refilled,
    SourceEof,
}

/// Writes pending bytes, or refills them from the source when there are
/// none. State is only updated after an await completes, so dropping the
/// future at any point loses nothing.
async fn feed_step<W: AsyncWrite + Unpin>(
    pipe: Option<&mut W>,
    feed: &mut Feed,
) -> Result<FeedStep, FeedError> {
    let Some(pipe) = pipe else {
        return std::future::pending().await;
    };

    if feed.pos < feed.buf.len() {
        let n = pipe
            .write(&feed.buf[feed.pos..])
            .await
            .map_err(FeedError::Pipe)?;
        feed.pos += n;
        return Ok(FeedStep::Wrote(n));
    }

    let Some(reader) = feed.reader.as_mut() else {
        return std::future::pending().await;
    };
    let n = reader
        .read(&mut feed.scratch)
        .await
        .map_err(FeedError::Source)?;
    if n == 0 {
        feed.reader = None;
        return Ok(FeedStep::SourceEof);
    }
    feed.buf.clear();
    feed.buf.extend_from_slice(&feed.scratch[..n]);
    feed.pos = 0;
    Ok(FeedStep::Refilled)
}

enum FeedError {
    Pipe(io::Error),
    Source(io::Error),
}

/// Destination for stdout.
struct Sink {
    memory: Vec<u8>,
    pending: Vec<u8>,
    writer: Option<Box<dyn AsyncWrite + Send + Unpin>>,
    path: PathBuf,
}

impl Sink {
    fn new(output: Output) -> Self {
        match output {
            Output::Memory => Self {
                memory: Vec::new(),
                pending: Vec::new(),
                writer: None,
                path: PathBuf::new(),
            },
            Output::Writer { writer, path } => Self {
                memory: Vec::new(),
                pending: Vec::new(),
                writer: Some(writer),
                path,
            },
        }
    }

    fn accept(&mut self, bytes: &[u8]) {
        if self.writer.is_some() {
            self.pending.extend_from_slice(bytes);
        } else {
            self.memory.extend_from_slice(bytes);
        }
    }

    fn has_room(&self) -> bool {
        self.pending.len() < SINK_HIGH_WATER
    }

    fn error(&self, err: &io::Error) -> GpgError {
        GpgError::file_access(self.path.clone(), err)
    }

    async fn finish(&mut self) -> io::Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(&self.pending).await?;
            self.pending.clear();
            writer.flush().await?;
        }
        Ok(())
    }
}

async fn read_some<R: AsyncRead + Unpin>(reader: Option<&mut R>, buf: &mut [u8]) -> io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn write_some<W: AsyncWrite + Unpin>(writer: Option<&mut W>, buf: &[u8]) -> io::Result<usize> {
    match writer {
        Some(writer) => writer.write(buf).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn wait_abort(signal: Option<&mut AbortSignal>) {
    match signal {
        Some(signal) => signal.aborted().await,
        None => std::future::pending().await,
    }
}

/// Drives one spawned gpg process to completion.
///
/// # Example
///
/// ```rust,no_run
/// use gpg_driver::process::{Channels, Control, InvocationSpec, Pump, StatusHandler, spawn};
/// use gpg_driver::status::StatusEvent;
///
/// struct Print;
///
/// impl StatusHandler for Print {
///     fn on_status(&mut self, event: &StatusEvent) -> Control {
///         println!("{event}");
///         Control::Continue
///     }
/// }
///
/// # async fn demo() -> Result<(), gpg_driver::GpgError> {
/// let spec = InvocationSpec::new("gpg")
///     .with_args(["--version"])
///     .with_channels(Channels::DATA_OUT);
/// let output = Pump::new(spawn(&spec)?).run(&mut Print).await?;
/// println!("{}", String::from_utf8_lossy(&output.stdout));
/// # Ok(())
/// # }
/// ```
pub struct Pump {
    child: Child,
    pid: u32,
    command_line: String,
    status: Option<pipe::Receiver>,
    command: Option<pipe::Sender>,
    extra_in: Option<pipe::Sender>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    stdin_feed: Feed,
    extra_feed: Feed,
    sink: Sink,
    abort: Option<AbortSignal>,
    timeout: Option<Duration>,
    grace: Duration,
}

impl Pump {
    /// Takes ownership of a spawned process and all its pipes.
    #[must_use]
    pub fn new(mut spawned: SpawnedProcess) -> Self {
        let stdin = spawned.child.stdin.take();
        let stdout = spawned.child.stdout.take();
        let stderr = spawned.child.stderr.take();
        Self {
            child: spawned.child,
            pid: spawned.pid,
            command_line: spawned.command_line,
            status: spawned.status,
            command: spawned.command,
            extra_in: spawned.extra_in,
            stdin,
            stdout,
            stderr,
            stdin_feed: Feed::empty(),
            extra_feed: Feed::empty(),
            sink: Sink::new(Output::Memory),
            abort: None,
            timeout: None,
            grace: DEFAULT_GRACE,
        }
    }

    /// Sets what is written to stdin (closed immediately if unset).
    #[must_use]
    pub fn with_stdin(mut self, input: Input) -> Self {
        self.stdin_feed = Feed::new(input);
        self
    }

    /// Sets what is written to the extra input pipe.
    #[must_use]
    pub fn with_extra_input(mut self, input: Input) -> Self {
        self.extra_feed = Feed::new(input);
        self
    }

    /// Sets where stdout goes (memory if unset).
    #[must_use]
    pub fn with_output(mut self, output: Output) -> Self {
        self.sink = Sink::new(output);
        self
    }

    /// Aborts the run when `signal` fires.
    #[must_use]
    pub fn with_abort(mut self, signal: Option<AbortSignal>) -> Self {
        self.abort = signal;
        self
    }

    /// Aborts the run once `timeout` has elapsed.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the delay between `SIGTERM` and `SIGKILL`.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Runs the loop until the child has exited and its output pipes are
    /// drained, or until abort, timeout or a fatal status event.
    ///
    /// A non-zero exit is reported in [`PumpOutput::exit_status`], not as
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns [`GpgError::FileAccess`] if a streaming input source or the
    /// output writer fails. The child is terminated first.
    #[allow(clippy::too_many_lines)]
    pub async fn run<H: StatusHandler>(mut self, handler: &mut H) -> Result<PumpOutput, GpgError> {
        let pid = self.pid;
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut drain_deadline: Option<Instant> = None;

        let mut lines = LineBuffer::new();
        let mut status_buf = vec![0u8; READ_CHUNK];
        let mut stdout_buf = vec![0u8; READ_CHUNK];
        let mut stderr_buf = vec![0u8; READ_CHUNK];
        let mut stderr = Vec::new();
        let mut stderr_truncated = false;

        let mut command_buf: Zeroizing<Vec<u8>> = Zeroizing::new(Vec::new());
        let mut close_command = false;

        let mut exit_status: Option<ExitStatus> = None;
        let mut stop: Option<Stop> = None;
        let mut failure: Option<GpgError> = None;

        if self.abort.as_ref().is_some_and(AbortSignal::is_aborted) {
            stop = Some(Stop::Aborted);
        }

        while stop.is_none() && failure.is_none() {
            // Close input pipes whose data is fully written.
            if self.stdin.is_some() && self.stdin_feed.exhausted() {
                trace!(pid, "closing stdin");
                self.stdin = None;
            }
            if self.extra_in.is_some() && self.extra_feed.exhausted() {
                trace!(pid, "closing extra input");
                self.extra_in = None;
            }
            if self.command.is_some() && close_command && command_buf.is_empty() {
                trace!(pid, "closing command channel");
                self.command = None;
            }

            if exit_status.is_some()
                && self.status.is_none()
                && self.stdout.is_none()
                && self.stderr.is_none()
            {
                break;
            }

            let want_stdout = self.stdout.is_some() && self.sink.has_room();
            let want_sink = self.sink.writer.is_some() && !self.sink.pending.is_empty();
            let want_command = self.command.is_some() && !command_buf.is_empty();
            let want_stdin = self.stdin.is_some();
            let want_extra = self.extra_in.is_some();

            tokio::select! {
                biased;

                () = wait_abort(self.abort.as_mut()) => {
                    debug!(pid, "abort requested");
                    stop = Some(Stop::Aborted);
                },

                () = sleep_until(deadline) => {
                    warn!(pid, "gpg timed out");
                    stop = Some(Stop::TimedOut);
                },

                () = sleep_until(drain_deadline) => {
                    warn!(pid, "pipes still open after exit, giving up on them");
                    break;
                },

                res = read_some(self.status.as_mut(), &mut status_buf), if self.status.is_some() => {
                    let eof = match res {
                        Ok(0) => true,
                        Ok(n) => {
                            lines.push(&status_buf[..n]);
                            false
                        },
                        Err(e) => {
                            warn!(pid, error = %e, "status pipe read failed");
                            true
                        },
                    };

                    let mut pending: Vec<String> = std::iter::from_fn(|| lines.next_line()).collect();
                    if eof {
                        pending.extend(lines.finish());
                        self.status = None;
                    }

                    for line in pending {
                        let Some(event) = parse_line(&line) else {
                            trace!(pid, line = %line, "ignoring non-status line");
                            continue;
                        };
                        trace!(pid, code = %event.code, "status");
                        match handler.on_status(&event) {
                            Control::Continue => {},
                            Control::Reply(reply) => {
                                if self.command.is_some() && !close_command {
                                    command_buf.extend_from_slice(&reply.to_bytes());
                                } else {
                                    debug!(pid, "reply dropped, command channel closed");
                                }
                            },
                            Control::CloseCommand => close_command = true,
                            Control::Fatal => {
                                debug!(pid, code = %event.code, "fatal status event");
                                stop = Some(Stop::Fatal);
                                break;
                            },
                        }
                    }
                },

                res = read_some(self.stderr.as_mut(), &mut stderr_buf), if self.stderr.is_some() => {
                    match res {
                        Ok(0) => self.stderr = None,
                        Ok(n) => {
                            let room = MAX_STDERR.saturating_sub(stderr.len());
                            if n > room {
                                stderr_truncated = true;
                            }
                            stderr.extend_from_slice(&stderr_buf[..n.min(room)]);
                        },
                        Err(e) => {
                            warn!(pid, error = %e, "stderr read failed");
                            self.stderr = None;
                        },
                    }
                },

                res = read_some(self.stdout.as_mut(), &mut stdout_buf), if want_stdout => {
                    match res {
                        Ok(0) => self.stdout = None,
                        Ok(n) => self.sink.accept(&stdout_buf[..n]),
                        Err(e) => {
                            warn!(pid, error = %e, "stdout read failed");
                            self.stdout = None;
                        },
                    }
                },

                res = write_some(self.command.as_mut(), &command_buf), if want_command => {
                    match res {
                        Ok(n) => {
                            command_buf.drain(..n);
                        },
                        Err(e) => {
                            debug!(pid, error = %e, "command channel closed by gpg");
                            command_buf.clear();
                            self.command = None;
                        },
                    }
                },

                res = feed_step(self.stdin.as_mut(), &mut self.stdin_feed), if want_stdin => {
                    match res {
                        Ok(FeedStep::Wrote(n)) => trace!(pid, n, "stdin"),
                        Ok(FeedStep::Refilled | FeedStep::SourceEof) => {},
                        Err(FeedError::Pipe(e)) => {
                            log_input_closed(pid, "stdin", &e);
                            self.stdin = None;
                        },
                        Err(FeedError::Source(e)) => {
                            failure = Some(GpgError::file_access(self.stdin_feed.path.clone(), &e));
                        },
                    }
                },

                res = feed_step(self.extra_in.as_mut(), &mut self.extra_feed), if want_extra => {
                    match res {
                        Ok(_) => {},
                        Err(FeedError::Pipe(e)) => {
                            log_input_closed(pid, "extra input", &e);
                            self.extra_in = None;
                        },
                        Err(FeedError::Source(e)) => {
                            failure = Some(GpgError::file_access(self.extra_feed.path.clone(), &e));
                        },
                    }
                },

                res = write_some(self.sink.writer.as_mut(), &self.sink.pending), if want_sink => {
                    match res {
                        Ok(n) => {
                            self.sink.pending.drain(..n);
                        },
                        Err(e) => failure = Some(self.sink.error(&e)),
                    }
                },

                res = self.child.wait(), if exit_status.is_none() => {
                    match res {
                        Ok(status) => {
                            debug!(pid, ?status, "gpg exited");
                            exit_status = Some(status);
                        },
                        Err(e) => {
                            warn!(pid, error = %e, "wait failed");
                            stop = Some(Stop::Fatal);
                        },
                    }
                    // Nobody is left to read these.
                    self.stdin = None;
                    self.extra_in = None;
                    self.command = None;
                    drain_deadline = Some(Instant::now() + EXIT_DRAIN_LIMIT);
                },
            }
        }

        let mut aborted = false;
        let mut timed_out = false;
        let mut fatal = false;
        if stop.is_some() || failure.is_some() {
            match stop {
                Some(Stop::Aborted) => aborted = true,
                Some(Stop::TimedOut) => {
                    aborted = true;
                    timed_out = true;
                },
                Some(Stop::Fatal) => fatal = true,
                None => {},
            }
            self.close_all();
            if exit_status.is_none() {
                exit_status = terminate(&mut self.child, self.grace).await;
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        if !aborted && !fatal {
            self.sink.finish().await.map_err(|e| self.sink.error(&e))?;
        }

        Ok(PumpOutput {
            exit_status,
            stdout: std::mem::take(&mut self.sink.memory),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            stderr_truncated,
            aborted,
            timed_out,
            fatal,
            command: self.command_line,
        })
    }

    fn close_all(&mut self) {
        self.status = None;
        self.command = None;
        self.extra_in = None;
        self.stdin = None;
        self.stdout = None;
        self.stderr = None;
    }
}

fn log_input_closed(pid: u32, name: &str, err: &io::Error) {
    if err.kind() == io::ErrorKind::BrokenPipe {
        debug!(pid, pipe = name, "gpg stopped reading input");
    } else {
        warn!(pid, pipe = name, error = %err, "input write failed");
    }
}

/// Terminates the child: `SIGTERM`, then `SIGKILL` after `grace`.
///
/// The child is reaped in every case.
async fn terminate(child: &mut Child, grace: Duration) -> Option<ExitStatus> {
    // Already reaped (or exited on its own): its PID may be reused, do not
    // signal it.
    if let Ok(Some(status)) = child.try_wait() {
        return Some(status);
    }

    if let Some(raw) = child.id().and_then(|id| i32::try_from(id).ok()) {
        debug!(pid = raw, "sending SIGTERM to gpg");
        if let Err(e) = kill(Pid::from_raw(raw), Signal::SIGTERM) {
            debug!(pid = raw, error = %e, "SIGTERM failed");
        }
    }

    if let Ok(Ok(status)) = tokio::time::timeout(grace, child.wait()).await {
        return Some(status);
    }

    warn!("gpg ignored SIGTERM, killing");
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill gpg");
    }
    child.wait().await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Arg, Channels, FdRole, InvocationSpec, Reply, spawn};
    use crate::status::{StatusCode, StatusEvent};

    #[derive(Default)]
    struct Recorder {
        events: Vec<StatusEvent>,
        fatal_on: Option<StatusCode>,
    }

    impl StatusHandler for Recorder {
        fn on_status(&mut self, event: &StatusEvent) -> Control {
            self.events.push(event.clone());
            if self.fatal_on.as_ref() == Some(&event.code) {
                return Control::Fatal;
            }
            if event.code == StatusCode::GetLine {
                return Control::Reply(Reply::Line("pong".into()));
            }
            Control::Continue
        }
    }

    fn bash(script: &str) -> InvocationSpec {
        InvocationSpec::new("bash")
            .with_args(["-c", script])
            .with_arg(Arg::Fd(FdRole::Status))
            .with_arg(Arg::Fd(FdRole::Command))
            .with_channels(
                Channels::STATUS | Channels::COMMAND | Channels::DATA_IN | Channels::DATA_OUT,
            )
    }

    #[cfg_attr(miri, ignore)] // Miri can't spawn processes
    #[tokio::test]
    async fn test_echo_stdin_to_stdout() {
        let spec = bash("cat");
        let mut handler = Recorder::default();
        let out = Pump::new(spawn(&spec).unwrap())
            .with_stdin(Input::Bytes(b"hello".to_vec()))
            .run(&mut handler)
            .await
            .unwrap();
        assert_eq!(out.stdout, b"hello");
        assert!(out.success());
        assert!(!out.aborted);
    }

    #[cfg_attr(miri, ignore)] // Miri can't spawn processes
    #[tokio::test]
    async fn test_reply_reaches_command_fd() {
        let spec = bash(
            r#"echo "[GNUPG:] GET_LINE ping" >&"$0"; read -r answer <&"$1"; printf '%s' "$answer""#,
        );
        let mut handler = Recorder::default();
        let out = Pump::new(spawn(&spec).unwrap())
            .run(&mut handler)
            .await
            .unwrap();
        assert_eq!(out.stdout, b"pong");
        assert_eq!(handler.events.len(), 1);
    }

    #[cfg_attr(miri, ignore)] // Miri can't spawn processes
    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let spec = bash("echo oops >&2; exit 3");
        let mut handler = Recorder::default();
        let out = Pump::new(spawn(&spec).unwrap())
            .run(&mut handler)
            .await
            .unwrap();
        assert_eq!(out.exit_code(), Some(3));
        assert_eq!(out.stderr, "oops\n");
    }

    #[cfg_attr(miri, ignore)] // Miri can't spawn processes
    #[tokio::test]
    async fn test_fatal_terminates_child() {
        let spec = bash(r#"echo "[GNUPG:] NODATA 1" >&"$0"; sleep 30"#);
        let mut handler = Recorder {
            fatal_on: Some(StatusCode::NoData),
            ..Recorder::default()
        };
        let started = std::time::Instant::now();
        let out = Pump::new(spawn(&spec).unwrap())
            .run(&mut handler)
            .await
            .unwrap();
        assert!(out.fatal);
        assert!(out.exit_status.is_some());
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[cfg_attr(miri, ignore)] // Miri can't spawn processes
    #[tokio::test]
    async fn test_timeout_aborts() {
        let spec = bash("sleep 30");
        let mut handler = Recorder::default();
        let out = Pump::new(spawn(&spec).unwrap())
            .with_timeout(Some(Duration::from_millis(100)))
            .with_grace(Duration::from_millis(500))
            .run(&mut handler)
            .await
            .unwrap();
        assert!(out.aborted);
        assert!(out.timed_out);
        assert!(out.exit_status.is_some());
    }

    #[cfg_attr(miri, ignore)] // Miri can't spawn processes
    #[tokio::test]
    async fn test_unterminated_status_line_is_flushed() {
        let spec = bash(r#"printf '[GNUPG:] IMPORT_OK 1 ABCD' >&"$0""#);
        let mut handler = Recorder::default();
        Pump::new(spawn(&spec).unwrap())
            .run(&mut handler)
            .await
            .unwrap();
        assert_eq!(handler.events.len(), 1);
        assert_eq!(handler.events[0].code, StatusCode::ImportOk);
    }
}
