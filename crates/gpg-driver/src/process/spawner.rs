//! Process spawning.
//!
//! Creates the extra pipes an [`InvocationSpec`] asks for and starts the
//! child with them inherited.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::process::Stdio;

use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl};
use nix::unistd::pipe2;
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tracing::debug;

use super::{Channels, FdRole, InvocationSpec};
use crate::error::GpgError;
use crate::log::redact_args;

/// A spawned gpg process with the parent ends of its pipes.
#[derive(Debug)]
pub struct SpawnedProcess {
    /// The child process handle.
    pub child: Child,
    /// The OS process ID.
    pub pid: u32,
    /// Parent end of the status pipe.
    pub status: Option<pipe::Receiver>,
    /// Parent end of the command pipe.
    pub command: Option<pipe::Sender>,
    /// Parent end of the extra input pipe.
    pub extra_in: Option<pipe::Sender>,
    /// The command line, with secrets redacted, for diagnostics.
    pub command_line: String,
}

/// One pipe: the end the parent keeps and the end the child inherits.
struct PipePair {
    parent: OwnedFd,
    child: OwnedFd,
}

impl PipePair {
    /// A pipe the child writes to.
    fn child_writes() -> io::Result<Self> {
        let (read, write) = pipe2(OFlag::O_CLOEXEC)?;
        Ok(Self {
            parent: read,
            child: write,
        })
    }

    /// A pipe the child reads from.
    fn child_reads() -> io::Result<Self> {
        let (read, write) = pipe2(OFlag::O_CLOEXEC)?;
        Ok(Self {
            parent: write,
            child: read,
        })
    }
}

/// Spawn gpg according to its invocation spec.
///
/// Every pipe is created close-on-exec; only the child's ends have the flag
/// cleared, between fork and exec. Their fd numbers are substituted into
/// the argument list, so the child sees exactly the numbers it was told.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns [`GpgError::SubprocessLaunch`] if a pipe cannot be created or
/// the executable cannot be started, and [`GpgError::InvalidArgument`] if
/// an argument refers to a pipe the spec does not request.
pub fn spawn(spec: &InvocationSpec) -> Result<SpawnedProcess, GpgError> {
    let launch_err = |source: io::Error| GpgError::SubprocessLaunch {
        binary: spec.binary.clone(),
        source,
    };

    let status = spec
        .channels
        .contains(Channels::STATUS)
        .then(PipePair::child_writes)
        .transpose()
        .map_err(launch_err)?;
    let command = spec
        .channels
        .contains(Channels::COMMAND)
        .then(PipePair::child_reads)
        .transpose()
        .map_err(launch_err)?;
    let extra_in = spec
        .channels
        .contains(Channels::EXTRA_IN)
        .then(PipePair::child_reads)
        .transpose()
        .map_err(launch_err)?;

    let status_fd = status.as_ref().map(|p| p.child.as_raw_fd());
    let command_fd = command.as_ref().map(|p| p.child.as_raw_fd());
    let extra_fd = extra_in.as_ref().map(|p| p.child.as_raw_fd());
    let fd_of = move |role: FdRole| match role {
        FdRole::Status => status_fd,
        FdRole::Command => command_fd,
        FdRole::ExtraIn => extra_fd,
    };

    let args = spec.render_args(fd_of).ok_or_else(|| {
        GpgError::InvalidArgument("argument refers to a pipe that was not requested".to_string())
    })?;

    let mut display = vec![spec.binary.display().to_string()];
    display.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
    let command_line = redact_args(&display).join(" ");

    let mut cmd = Command::new(&spec.binary);
    cmd.args(&args)
        .stdin(piped_if(spec.channels.contains(Channels::DATA_IN)))
        .stdout(piped_if(spec.channels.contains(Channels::DATA_OUT)))
        .stderr(Stdio::piped())
        .env("LC_ALL", "C")
        .env("LANG", "C")
        .kill_on_drop(true);

    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    if let Some(homedir) = &spec.homedir {
        cmd.env("GNUPGHOME", homedir);
    }
    for (k, v) in &spec.env {
        cmd.env(k, v);
    }

    let inherited: Vec<RawFd> = [status_fd, command_fd, extra_fd]
        .into_iter()
        .flatten()
        .collect();
    // SAFETY: the closure runs between fork and exec and only calls
    // fcntl(2), which is async-signal-safe. It allocates nothing.
    unsafe {
        cmd.pre_exec(move || {
            for fd in &inherited {
                fcntl(*fd, FcntlArg::F_SETFD(FdFlag::empty()))?;
            }
            Ok(())
        });
    }

    let child = cmd.spawn().map_err(launch_err)?;
    let pid = child
        .id()
        .ok_or_else(|| launch_err(io::Error::other("failed to get process ID")))?;

    debug!(pid, command = %command_line, "spawned gpg");

    // Dropping the child ends here leaves the child as the only holder, so
    // EOF on the status pipe means the child closed it or exited.
    Ok(SpawnedProcess {
        child,
        pid,
        status: status
            .map(|p| pipe::Receiver::from_owned_fd(p.parent))
            .transpose()
            .map_err(launch_err)?,
        command: command
            .map(|p| pipe::Sender::from_owned_fd(p.parent))
            .transpose()
            .map_err(launch_err)?,
        extra_in: extra_in
            .map(|p| pipe::Sender::from_owned_fd(p.parent))
            .transpose()
            .map_err(launch_err)?,
        command_line,
    })
}

fn piped_if(wanted: bool) -> Stdio {
    if wanted { Stdio::piped() } else { Stdio::null() }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::error::ErrorKind;
    use crate::process::Arg;

    #[cfg_attr(miri, ignore)] // Miri can't spawn processes
    #[tokio::test]
    async fn test_status_pipe_is_inherited() {
        let spec = InvocationSpec::new("bash")
            .with_args(["-c", "echo '[GNUPG:] HELLO' >&\"$0\""])
            .with_arg(Arg::Fd(FdRole::Status))
            .with_channels(Channels::STATUS);

        let mut spawned = spawn(&spec).unwrap();
        assert!(spawned.pid > 0);

        let mut status = spawned.status.take().unwrap();
        let mut out = String::new();
        status.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "[GNUPG:] HELLO\n");

        assert!(spawned.child.wait().await.unwrap().success());
    }

    #[cfg_attr(miri, ignore)] // Miri can't spawn processes
    #[tokio::test]
    async fn test_locale_is_forced() {
        let spec = InvocationSpec::new("sh")
            .with_args(["-c", "test \"$LC_ALL\" = C && test \"$GNUPGHOME\" = /nowhere"])
            .with_homedir("/nowhere");

        let mut spawned = spawn(&spec).unwrap();
        assert!(spawned.child.wait().await.unwrap().success());
    }

    #[cfg_attr(miri, ignore)] // Miri can't spawn processes
    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let spec = InvocationSpec::new("/nonexistent/gpg-12345");
        let err = spawn(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubprocessLaunch);
    }

    #[tokio::test]
    async fn test_unrequested_pipe_is_rejected() {
        let spec = InvocationSpec::new("sh").with_arg(Arg::Fd(FdRole::Command));
        let err = spawn(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[cfg_attr(miri, ignore)] // Miri can't spawn processes
    #[tokio::test]
    async fn test_command_line_is_redacted() {
        let spec = InvocationSpec::new("true").with_args(["--passphrase", "hunter2"]);
        let mut spawned = spawn(&spec).unwrap();
        assert!(!spawned.command_line.contains("hunter2"));
        spawned.child.wait().await.unwrap();
    }
}
