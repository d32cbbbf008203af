//! Subprocess orchestration.
//!
//! This module owns the gpg child process for the lifetime of one
//! invocation:
//!
//! - [`InvocationSpec`]: what to run and which extra pipes it needs
//! - [`spawn`]: creates the pipes and starts the child
//! - [`Pump`]: the single readiness loop that feeds and drains every pipe
//!   and routes status lines to a [`StatusHandler`]
//! - [`AbortHandle`]: caller-side cancellation
//!
//! Nothing outside [`Pump::run`] reads or writes the child's pipes.

mod abort;
mod lines;
mod pump;
mod spawner;

use std::ffi::OsString;
use std::ops::BitOr;
use std::os::fd::RawFd;
use std::path::PathBuf;
use std::sync::Arc;

pub use abort::{AbortHandle, AbortSignal};
pub use lines::{LineBuffer, MAX_LINE_LEN};
pub use pump::{Input, Output, Pump, PumpOutput};
use secrecy::{ExposeSecret, SecretString};
pub use spawner::{SpawnedProcess, spawn};
use zeroize::Zeroizing;

use crate::status::StatusEvent;

/// The set of pipes an invocation needs, as a small bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Channels(u8);

impl Channels {
    /// Data written to the child's stdin.
    pub const DATA_IN: Self = Self(1);
    /// Data read from the child's stdout.
    pub const DATA_OUT: Self = Self(1 << 1);
    /// The `--status-fd` pipe.
    pub const STATUS: Self = Self(1 << 2);
    /// The `--command-fd` pipe.
    pub const COMMAND: Self = Self(1 << 3);
    /// An additional input pipe, passed as a special filename.
    pub const EXTRA_IN: Self = Self(1 << 4);

    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `true` if every channel in `other` is also in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Channels {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// An extra pipe whose fd number is only known once it has been created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FdRole {
    /// The status pipe (child writes).
    Status,
    /// The command pipe (child reads).
    Command,
    /// The extra input pipe (child reads).
    ExtraIn,
}

impl FdRole {
    /// The channel this role belongs to.
    #[must_use]
    pub const fn channel(self) -> Channels {
        match self {
            Self::Status => Channels::STATUS,
            Self::Command => Channels::COMMAND,
            Self::ExtraIn => Channels::EXTRA_IN,
        }
    }
}

/// One command-line argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// A literal argument.
    Literal(OsString),
    /// The child-side fd number of a pipe, e.g. `--status-fd 5`.
    Fd(FdRole),
    /// The `-&N` special filename gpg accepts under
    /// `--enable-special-filenames`.
    SpecialFile(FdRole),
}

impl Arg {
    fn render(&self, fd_of: impl Fn(FdRole) -> Option<RawFd>) -> Option<OsString> {
        match self {
            Self::Literal(value) => Some(value.clone()),
            Self::Fd(role) => fd_of(*role).map(|fd| fd.to_string().into()),
            Self::SpecialFile(role) => fd_of(*role).map(|fd| format!("-&{fd}").into()),
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Literal(value.into())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Literal(value.into())
    }
}

impl From<&std::path::Path> for Arg {
    fn from(value: &std::path::Path) -> Self {
        Self::Literal(value.as_os_str().to_owned())
    }
}

/// Everything needed to launch one gpg invocation.
///
/// Built once by the operation layer and never modified afterwards.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    /// Path (or bare name) of the executable.
    pub binary: PathBuf,
    /// Arguments, with fd placeholders.
    pub args: Vec<Arg>,
    /// Pipes to create.
    pub channels: Channels,
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
    /// Exported as `GNUPGHOME` when set.
    pub homedir: Option<PathBuf>,
    /// Additional environment variables, applied last.
    pub env: Vec<(String, String)>,
}

impl InvocationSpec {
    /// Creates a spec for `binary` with no arguments and only stderr.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            channels: Channels::empty(),
            cwd: None,
            homedir: None,
            env: Vec::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds channels to the required set.
    #[must_use]
    pub fn with_channels(mut self, channels: Channels) -> Self {
        self.channels = self.channels | channels;
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Sets the gpg home directory.
    #[must_use]
    pub fn with_homedir(mut self, homedir: impl Into<PathBuf>) -> Self {
        self.homedir = Some(homedir.into());
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Renders the argument list with concrete fd numbers.
    ///
    /// Returns `None` if an argument refers to a pipe that was not created.
    pub(crate) fn render_args(
        &self,
        fd_of: impl Fn(FdRole) -> Option<RawFd> + Copy,
    ) -> Option<Vec<OsString>> {
        self.args.iter().map(|arg| arg.render(fd_of)).collect()
    }
}

/// What the pump should do after a status event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Nothing to send.
    Continue,
    /// Queue a reply on the command channel.
    Reply(Reply),
    /// No further prompts will be answered; close the command channel once
    /// queued replies are written.
    CloseCommand,
    /// Stop all I/O and terminate the child.
    Fatal,
}

/// A line to send on the command channel.
#[derive(Clone)]
pub enum Reply {
    /// A visible answer such as `Y`.
    Line(String),
    /// A passphrase.
    Hidden(Arc<SecretString>),
    /// An empty line: gpg treats it as "no answer" and moves on.
    Decline,
}

impl Reply {
    /// Wire bytes including the trailing newline.
    pub(crate) fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::new());
        match self {
            Self::Line(line) => out.extend_from_slice(line.as_bytes()),
            Self::Hidden(secret) => out.extend_from_slice(secret.expose_secret().as_bytes()),
            Self::Decline => {},
        }
        out.push(b'\n');
        out
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line(line) => f.debug_tuple("Line").field(line).finish(),
            Self::Hidden(_) => f.write_str("Hidden([REDACTED])"),
            Self::Decline => f.write_str("Decline"),
        }
    }
}

impl PartialEq for Reply {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Line(a), Self::Line(b)) => a == b,
            (Self::Hidden(a), Self::Hidden(b)) => a.expose_secret() == b.expose_secret(),
            (Self::Decline, Self::Decline) => true,
            _ => false,
        }
    }
}

impl Eq for Reply {}

/// Receives status events from the pump, in order.
pub trait StatusHandler {
    /// Handles one event and tells the pump what to do next.
    fn on_status(&mut self, event: &StatusEvent) -> Control;
}
