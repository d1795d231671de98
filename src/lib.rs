//! A small POSIX-flavoured command shell.
//!
//! An input line is split on `;`, `&&` and `||` into command-units, each unit
//! on `|` into stages, and each stage into argv plus redirections. Single-stage
//! units whose name is a built-in run inside the shell process; everything
//! else is forked and executed in the foreground.
//!
//! The main entry point is [`Interpreter`]. The public modules [`command`],
//! [`env`] and [`io_adapters`] expose the data model, the session environment
//! and the line sources the read-eval loop consumes.

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
mod executor;
mod external;
pub mod io_adapters;
mod interpreter;
mod lexer;
mod parser;
mod pipeline;
mod splitter;

pub use config::{Args, Settings};
/// Just a convenient re-export of the session type.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Flow, Interpreter};
