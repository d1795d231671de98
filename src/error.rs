//! Error taxonomy of the shell.
//!
//! Each error carries the text printed to the user; callers decide how the
//! failure feeds into the status of the surrounding command-unit.

use crate::command::Status;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed command-unit. The unit is abandoned and counts as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A redirection operator with nothing after it.
    #[error("syntax error: missing {} after '{operator}'", target_noun(.operator))]
    MissingTarget { operator: &'static str },
    /// `a | | b`, `| b` or `a |`.
    #[error("syntax error: empty command in pipeline (stage {index})")]
    EmptyStage { index: usize },
}

fn target_noun(operator: &str) -> &'static str {
    if operator == "<<" { "delimiter" } else { "filename" }
}

impl ParseError {
    pub fn status(&self) -> Status {
        Status::Failure(2)
    }
}

/// A system call needed to launch a command failed in the parent.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("pipe: {0}")]
    Pipe(#[source] nix::errno::Errno),
    #[error("fork: {0}")]
    Fork(#[source] nix::errno::Errno),
    #[error("{}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("heredoc: {0}")]
    Heredoc(#[source] io::Error),
    #[error("wait: {0}")]
    Wait(#[source] nix::errno::Errno),
    #[error("argument contains a NUL byte")]
    Nul(#[source] std::ffi::NulError),
}

/// Failure of the `cd` built-in. Every variant maps to its own status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CdError {
    #[error("cd: can't cd to {0}")]
    ChangeFailed(String),
    #[error("cd: {0}: Permission denied")]
    PermissionDenied(String),
    #[error("cd: too many arguments")]
    TooManyArguments,
    #[error("cd: {0}: Not a directory")]
    NotADirectory(String),
    #[error("cd: HOME not set")]
    HomeNotSet,
}

impl CdError {
    pub fn status(&self) -> Status {
        match self {
            CdError::ChangeFailed(_) | CdError::HomeNotSet => Status::Failure(1),
            CdError::PermissionDenied(_) => Status::Failure(2),
            CdError::TooManyArguments => Status::Failure(3),
            CdError::NotADirectory(_) => Status::Failure(4),
        }
    }

    /// Whether the unchanged working directory is echoed back to the user.
    pub fn echoes_cwd(&self) -> bool {
        matches!(self, CdError::ChangeFailed(_) | CdError::NotADirectory(_))
    }
}
