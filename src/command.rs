use std::fmt;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Kind of redirection.
///
/// Defines the specific operation mode for an I/O redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// Input redirection (`<`): reads standard input from an existing file.
    In,
    /// Output redirection (`>`): writes standard output to a file, **truncating** it.
    Out,
    /// Output redirection with append (`>>`): writes standard output to the end of a file.
    Append,
    /// Inline heredoc (`<<`): standard input comes from the lines typed up to a delimiter.
    Heredoc,
}

impl RedirectKind {
    /// The operator as it appears on the command line.
    pub fn operator(self) -> &'static str {
        match self {
            RedirectKind::In => "<",
            RedirectKind::Out => ">",
            RedirectKind::Append => ">>",
            RedirectKind::Heredoc => "<<",
        }
    }

    /// Whether this redirection rebinds standard output.
    pub fn is_output(self) -> bool {
        matches!(self, RedirectKind::Out | RedirectKind::Append)
    }
}

/// A request to bind a command's standard input or output to something other
/// than the shell's own stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub kind: RedirectKind,
    /// A path for `<`, `>` and `>>`; the delimiter line for `<<`.
    pub target: String,
}

impl Redirection {
    pub fn new(kind: RedirectKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }
}

/// A simple command: the words to execute plus its redirections, in source order.
///
/// An empty `argv` is a no-op: it produces no process and has no status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub argv: Vec<String>,
    pub redirections: Vec<Redirection>,
}

impl Command {
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    /// Name of the program, `argv[0]`.
    pub fn name(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }
}

/// One or more stages connected by pipes. A single stage means no pipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandUnit {
    pub stages: Vec<Command>,
}

impl CommandUnit {
    pub fn single(command: Command) -> Self {
        Self {
            stages: vec![command],
        }
    }

    pub fn is_pipeline(&self) -> bool {
        self.stages.len() > 1
    }
}

/// Operator joining a unit to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// `;`: always run the next unit.
    Sequential,
    /// `&&`: run the next unit only if this one succeeded.
    And,
    /// `||`: run the next unit only if this one failed.
    Or,
}

impl Connector {
    /// Whether the unit after this connector must be skipped given the status
    /// of the last unit that ran.
    pub fn skips(self, previous: Status) -> bool {
        match self {
            Connector::Sequential => false,
            Connector::And => !previous.is_success(),
            Connector::Or => previous.is_success(),
        }
    }
}

/// Raw text of one command-unit together with the connector that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub unit: String,
    pub connector: Option<Connector>,
}

/// Units evaluated strictly left to right with short-circuiting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandGroup {
    pub links: Vec<Link>,
}

/// Outcome of a command, a pipeline or a built-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// Exit code in `1..=255`.
    Failure(u8),
    /// Illegal argument to a built-in (`exit foo`).
    UsageError,
    /// Resolved target could not be executed.
    NotExecutable,
    /// Command could not be resolved.
    NotFound,
    /// Child was terminated by the given signal number.
    Signaled(i32),
}

impl Status {
    /// Generic failure.
    pub const FAILURE: Status = Status::Failure(1);

    /// Map a raw exit code to a status. Only the low eight bits are significant.
    pub fn from_code(code: ExitCode) -> Self {
        match (code & 0xff) as u8 {
            0 => Status::Success,
            126 => Status::NotExecutable,
            127 => Status::NotFound,
            x => Status::Failure(x),
        }
    }

    /// The conventional numeric exit code for this status.
    pub fn code(self) -> ExitCode {
        match self {
            Status::Success => 0,
            Status::Failure(x) => ExitCode::from(x),
            Status::UsageError => 2,
            Status::NotExecutable => 126,
            Status::NotFound => 127,
            Status::Signaled(signal) => 128 + signal,
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl From<bool> for Status {
    fn from(ok: bool) -> Self {
        if ok { Status::Success } else { Status::FAILURE }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Signaled(signal) => write!(f, "signal {signal}"),
            other => write!(f, "{}", other.code()),
        }
    }
}
