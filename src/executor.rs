//! Launching external programs.
//!
//! A command-unit of N stages is run by creating N-1 pipes, forking all N
//! children, closing every pipe end in the parent and then waiting for the
//! children in order. Everything a child needs (paths, argv, environment,
//! opened redirection targets) is prepared before `fork`, so the child only
//! rebinds descriptors and calls `execve`.

use crate::command::{Command, CommandUnit, RedirectKind, Redirection, Status};
use crate::env::Environment;
use crate::error::ExecError;
use crate::external;
use crate::io_adapters::{self, LineSource};
use nix::errno::Errno;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::fcntl::OFlag;
use nix::unistd::{ForkResult, Pid, close, dup2, execve, fork, pipe, pipe2};
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Standard stream replaced by a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdin,
    Stdout,
}

impl Stream {
    fn fd(self) -> RawFd {
        match self {
            Stream::Stdin => 0,
            Stream::Stdout => 1,
        }
    }
}

/// An opened redirection target, ready to be bound onto a standard stream.
#[derive(Debug)]
pub struct Opened {
    pub stream: Stream,
    pub file: File,
}

/// Open the target of one redirection in the shell process.
///
/// `>` and `>>` create missing files with mode 0644. A heredoc body is read
/// from `input` and stored in an anonymous temporary file.
pub fn open_redirection(
    redirection: &Redirection,
    input: &mut dyn LineSource,
) -> Result<Opened, ExecError> {
    let target = &redirection.target;
    let open_error = |source| ExecError::Open {
        path: target.into(),
        source,
    };
    let (stream, file) = match redirection.kind {
        RedirectKind::In => (Stream::Stdin, File::open(target).map_err(open_error)?),
        RedirectKind::Out => (
            Stream::Stdout,
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o644)
                .open(target)
                .map_err(open_error)?,
        ),
        RedirectKind::Append => (
            Stream::Stdout,
            OpenOptions::new()
                .append(true)
                .create(true)
                .mode(0o644)
                .open(target)
                .map_err(open_error)?,
        ),
        RedirectKind::Heredoc => {
            let body = io_adapters::collect_heredoc(input, target).map_err(ExecError::Heredoc)?;
            (Stream::Stdin, materialize(&body).map_err(ExecError::Heredoc)?)
        }
    };
    Ok(Opened { stream, file })
}

fn materialize(body: &str) -> std::io::Result<File> {
    let mut file = tempfile::tempfile()?;
    file.write_all(body.as_bytes())?;
    file.seek(SeekFrom::Start(0))?;
    Ok(file)
}

/// Open all redirections of a command, in source order.
pub fn open_all(command: &Command, input: &mut dyn LineSource) -> Result<Vec<Opened>, ExecError> {
    command
        .redirections
        .iter()
        .map(|r| open_redirection(r, input))
        .collect()
}

/// Descriptor rebinding applied in the child just before `execve`.
#[derive(Debug, Clone, Copy)]
struct Binding {
    stream: Stream,
    source: RawFd,
}

/// A stage that resolved to an executable path.
struct Launch {
    path: CString,
    argv: Vec<CString>,
    bindings: Vec<Binding>,
    /// `"<prefix>: <name>: "` for the child's exec failure message.
    failure_prefix: Vec<u8>,
}

fn to_cstrings(words: &[String]) -> Result<Vec<CString>, ExecError> {
    words
        .iter()
        .map(|w| CString::new(w.as_str()).map_err(ExecError::Nul))
        .collect()
}

fn prepare(
    command: &Command,
    env: &Environment,
    prefix: &str,
) -> Result<Option<Launch>, ExecError> {
    let Some(name) = command.name() else {
        return Ok(None);
    };
    let Some(path) = external::resolve(env, name) else {
        eprintln!("{prefix}: {name}: not found");
        return Ok(None);
    };
    tracing::debug!(command = name, path = %path.display(), "resolved");
    Ok(Some(Launch {
        path: path_cstring(&path)?,
        argv: to_cstrings(&command.argv)?,
        bindings: Vec::new(),
        failure_prefix: format!("{prefix}: {name}: ").into_bytes(),
    }))
}

fn path_cstring(path: &Path) -> Result<CString, ExecError> {
    use std::os::unix::ffi::OsStrExt;
    CString::new(path.as_os_str().as_bytes()).map_err(ExecError::Nul)
}

/// How a command-unit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Status of the last stage.
    pub status: Status,
    /// Set when some stage never started its program: it could not be
    /// resolved ([`Status::NotFound`]) or `execve` failed in the child.
    /// Holds the status of the first such stage.
    pub launch_failure: Option<Status>,
}

/// Run a command-unit of one or more stages in the foreground.
///
/// `prefix` starts every diagnostic, e.g. `gosh: 3`. The status is that of
/// the last stage; a stage whose program cannot be resolved is reported, is
/// not forked and has status [`Status::NotFound`]. Launch failures are
/// reported separately from exit statuses, so a program that merely exits
/// with 126 or 127 is not mistaken for one that never ran.
pub fn run_unit(
    unit: &CommandUnit,
    env: &Environment,
    input: &mut dyn LineSource,
    prefix: &str,
) -> Result<Completion, ExecError> {
    let stages = &unit.stages;
    if stages.is_empty() {
        return Ok(Completion {
            status: Status::Success,
            launch_failure: None,
        });
    }

    // Targets first: a bad file aborts the whole unit before anything runs.
    let opened: Vec<Vec<Opened>> = stages
        .iter()
        .map(|stage| open_all(stage, input))
        .collect::<Result<_, _>>()?;

    let mut launches: Vec<Option<Launch>> = stages
        .iter()
        .map(|stage| prepare(stage, env, prefix))
        .collect::<Result<_, _>>()?;

    let pipes: Vec<(OwnedFd, OwnedFd)> = (1..stages.len())
        .map(|_| pipe().map_err(ExecError::Pipe))
        .collect::<Result<_, _>>()?;

    let last = stages.len() - 1;
    for (i, launch) in launches.iter_mut().enumerate() {
        let Some(launch) = launch else { continue };
        if i > 0 {
            launch.bindings.push(Binding {
                stream: Stream::Stdin,
                source: pipes[i - 1].0.as_raw_fd(),
            });
        }
        if i < last {
            launch.bindings.push(Binding {
                stream: Stream::Stdout,
                source: pipes[i].1.as_raw_fd(),
            });
        }
        // Explicit redirections come after the pipe ends and therefore win.
        launch
            .bindings
            .extend(opened[i].iter().map(|o| Binding {
                stream: o.stream,
                source: o.file.as_raw_fd(),
            }));
    }

    let envp = env.snapshot();
    let mut children: Vec<Option<Child>> = Vec::with_capacity(stages.len());
    let mut fork_error = None;
    for launch in &launches {
        let Some(launch) = launch else {
            children.push(None);
            continue;
        };
        match spawn(launch, &pipes, &envp) {
            Ok(child) => children.push(Some(child)),
            Err(e) => {
                fork_error = Some(e);
                break;
            }
        }
    }

    // The parent keeps no pipe end open, or readers would never see EOF.
    drop(pipes);
    drop(opened);

    let mut status = Status::NotFound;
    let mut launch_failure = None;
    let mut wait_error = None;
    for (i, child) in children.into_iter().enumerate() {
        let stage_status = match child {
            Some(mut child) => {
                if let Some(failed) = child.exec_failure() {
                    launch_failure.get_or_insert(failed);
                }
                // Every forked child is reaped, even after a failed wait.
                match wait_for(child.pid) {
                    Ok(s) => s,
                    Err(e) => {
                        wait_error.get_or_insert(e);
                        Status::FAILURE
                    }
                }
            }
            None => {
                launch_failure.get_or_insert(Status::NotFound);
                Status::NotFound
            }
        };
        if i == last {
            status = stage_status;
        }
    }

    match fork_error.or(wait_error) {
        Some(e) => Err(e),
        None => Ok(Completion {
            status,
            launch_failure,
        }),
    }
}

/// A forked stage and the read end of its exec report pipe.
struct Child {
    pid: Pid,
    report: File,
}

impl Child {
    /// Blocks until the child has called `execve` or exited. The report pipe
    /// is close-on-exec, so a successful exec reads as end of file; a failed
    /// one carries the errno written by the child.
    fn exec_failure(&mut self) -> Option<Status> {
        let mut bytes = Vec::new();
        if let Err(e) = self.report.read_to_end(&mut bytes) {
            tracing::warn!(pid = self.pid.as_raw(), "failed to read exec report: {e}");
            return None;
        }
        let errno: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        let errno = Errno::from_raw(i32::from_ne_bytes(errno));
        tracing::debug!(pid = self.pid.as_raw(), %errno, "exec failed");
        Some(exec_failure_status(errno))
    }
}

fn exec_failure_status(errno: Errno) -> Status {
    if errno == Errno::ENOENT {
        Status::NotFound
    } else {
        Status::NotExecutable
    }
}

fn spawn(
    launch: &Launch,
    pipes: &[(OwnedFd, OwnedFd)],
    envp: &[CString],
) -> Result<Child, ExecError> {
    let (report, notify) = pipe2(OFlag::O_CLOEXEC).map_err(ExecError::Pipe)?;
    // SAFETY: the child only calls async-signal-safe functions on data
    // prepared above and always ends in `execve` or `_exit`.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => exec_child(launch, pipes, envp, notify.as_raw_fd()),
        Ok(ForkResult::Parent { child }) => {
            tracing::debug!(pid = child.as_raw(), "forked");
            // Later children must not inherit this write end.
            drop(notify);
            Ok(Child {
                pid: child,
                report: File::from(report),
            })
        }
        Err(e) => Err(ExecError::Fork(e)),
    }
}

fn wait_for(pid: Pid) -> Result<Status, ExecError> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(Status::from_code(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                tracing::debug!(pid = pid.as_raw(), ?signal, "terminated by signal");
                return Ok(Status::Signaled(signal as i32));
            }
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(ExecError::Wait(e)),
        }
    }
}

/// Child side of `fork`: bind descriptors, drop pipe ends, exec. On failure
/// the errno goes to `notify` before the child exits.
fn exec_child(
    launch: &Launch,
    pipes: &[(OwnedFd, OwnedFd)],
    envp: &[CString],
    notify: RawFd,
) -> ! {
    // SAFETY: restoring default dispositions is async-signal-safe.
    unsafe {
        for sig in [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGPIPE] {
            let _ = signal(sig, SigHandler::SigDfl);
        }
    }

    for binding in &launch.bindings {
        let target = binding.stream.fd();
        if binding.source != target {
            if let Err(e) = dup2(binding.source, target) {
                child_exit(&launch.failure_prefix, e, notify, 1);
            }
        }
    }
    for (read, write) in pipes {
        let _ = close(read.as_raw_fd());
        let _ = close(write.as_raw_fd());
    }

    let err = match execve(&launch.path, &launch.argv, envp) {
        Ok(never) => match never {},
        Err(e) => e,
    };
    let code = exec_failure_status(err).code();
    child_exit(&launch.failure_prefix, err, notify, code)
}

fn child_exit(prefix: &[u8], err: Errno, notify: RawFd, code: i32) -> ! {
    let desc = err.desc().as_bytes();
    let errno = (err as i32).to_ne_bytes();
    // SAFETY: raw writes and `_exit` never touch the allocator or the
    // parent's buffered streams.
    unsafe {
        for part in [prefix, desc, b"\n"] {
            nix::libc::write(2, part.as_ptr().cast(), part.len());
        }
        nix::libc::write(notify, errno.as_ptr().cast(), errno.len());
        nix::libc::_exit(code)
    }
}
