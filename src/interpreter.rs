use crate::builtin::{self, Context, FAREWELL, Outcome};
use crate::command::{Connector, ExitCode, Status};
use crate::config::Settings;
use crate::env::Environment;
use crate::executor;
use crate::io_adapters::LineSource;
use crate::pipeline;
use crate::splitter;
use nix::sys::signal::{SigHandler, Signal, signal};
use std::io::{self, Write};

pub const WELCOME: &str = "Welcome to the Gates Of Shell. Type 'exit' to quit.\n\n";
const PROMPT: &str = "$ ";

/// Whether the session goes on after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(ExitCode),
}

/// Result of evaluating one command-unit.
enum Step {
    /// Nothing ran; the previous status stays in effect.
    Empty,
    Ran(Status),
    Exit(ExitCode),
}

/// A shell session: the environment, the settings and the running line count.
///
/// Example
/// ```
/// use gosh::{Interpreter, Settings};
/// use gosh::io_adapters::ScriptSource;
/// let mut sh = Interpreter::new(Settings::batch("gosh"));
/// let code = sh.repl(&mut ScriptSource::new(["true && exit 4"])).unwrap();
/// assert_eq!(code, 4);
/// ```
pub struct Interpreter {
    env: Environment,
    settings: Settings,
    line_no: usize,
    last_status: Status,
}

impl Interpreter {
    /// Start a session with a copy of the process environment.
    pub fn new(settings: Settings) -> Self {
        Self::with_env(settings, Environment::new())
    }

    pub fn with_env(settings: Settings, env: Environment) -> Self {
        Self {
            env,
            settings,
            line_no: 0,
            last_status: Status::Success,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Status of the most recent command-unit that ran.
    pub fn last_status(&self) -> Status {
        self.last_status
    }

    /// Read and evaluate lines until end of input or an explicit exit.
    ///
    /// Returns the code the shell should exit with: the one requested by a
    /// built-in or a fatal launch failure, and 0 when input runs out.
    pub fn repl(&mut self, input: &mut dyn LineSource) -> anyhow::Result<ExitCode> {
        if self.settings.interactive {
            ignore_terminal_signals();
            print!("{WELCOME}");
            io::stdout().flush()?;
        }

        if let Some(code) = self.drain(input)? {
            return Ok(code);
        }
        if self.settings.interactive {
            print!("{FAREWELL}");
            io::stdout().flush()?;
        }
        Ok(0)
    }

    /// Evaluate a command string given on the command line.
    ///
    /// Like [`repl`](Self::repl), except that running out of input exits
    /// with the status of the last command-unit that ran.
    pub fn run_command(&mut self, input: &mut dyn LineSource) -> anyhow::Result<ExitCode> {
        match self.drain(input)? {
            Some(code) => Ok(code),
            None => Ok(self.last_status.code()),
        }
    }

    /// Runs lines until one ends the session. `None` means end of input.
    fn drain(&mut self, input: &mut dyn LineSource) -> anyhow::Result<Option<ExitCode>> {
        while let Some(line) = input.read_line(PROMPT)? {
            if let Flow::Exit(code) = self.run_line(&line, input) {
                return Ok(Some(code));
            }
        }
        Ok(None)
    }

    /// Evaluate one input line. `input` supplies heredoc bodies.
    pub fn run_line(&mut self, line: &str, input: &mut dyn LineSource) -> Flow {
        self.line_no += 1;
        for group in splitter::split_line(line) {
            // Status of the last unit that ran in this group.
            let mut last: Option<Status> = None;
            let mut pending: Option<Connector> = None;
            for link in &group.links {
                let skip = matches!((pending, last), (Some(c), Some(s)) if c.skips(s));
                pending = link.connector;
                if skip {
                    tracing::debug!(unit = link.unit.trim(), "skipped by connector");
                    continue;
                }
                match self.run_unit(&link.unit, input) {
                    Step::Empty => {}
                    Step::Ran(status) => {
                        last = Some(status);
                        self.last_status = status;
                    }
                    Step::Exit(code) => return Flow::Exit(code),
                }
            }
        }
        Flow::Continue
    }

    fn prefix(&self) -> String {
        format!("{}: {}", self.settings.program_name, self.line_no)
    }

    fn run_unit(&mut self, text: &str, input: &mut dyn LineSource) -> Step {
        let prefix = self.prefix();
        let unit = match pipeline::parse_unit(text) {
            Ok(unit) => unit,
            Err(e) => {
                eprintln!("{prefix}: {e}");
                return Step::Ran(e.status());
            }
        };

        if let [command] = unit.stages.as_slice() {
            if command.is_empty() {
                if command.redirections.is_empty() {
                    return Step::Empty;
                }
                // `> file` alone still creates the file.
                return match executor::open_all(command, input) {
                    Ok(_) => Step::Ran(Status::Success),
                    Err(e) => {
                        eprintln!("{prefix}: {e}");
                        Step::Ran(Status::FAILURE)
                    }
                };
            }
            if let Some(found) = builtin::lookup(command) {
                let mut ctx = Context {
                    env: &mut self.env,
                    settings: &self.settings,
                    prefix: &prefix,
                };
                let outcome = builtin::run(
                    found,
                    command,
                    &mut ctx,
                    input,
                    &mut io::stdout(),
                    &mut io::stderr(),
                );
                return match outcome {
                    Outcome::Status(status) => Step::Ran(status),
                    Outcome::Exit(code) => Step::Exit(code),
                };
            }
        }

        let done = match executor::run_unit(&unit, &self.env, input, &prefix) {
            Ok(done) => done,
            Err(e) => {
                eprintln!("{prefix}: {e}");
                return Step::Ran(Status::FAILURE);
            }
        };
        tracing::debug!(unit = text.trim(), status = %done.status, "unit finished");
        // A script cannot go on once a program it names failed to start.
        if let Some(failure) = done.launch_failure {
            if !self.settings.interactive {
                return Step::Exit(failure.code());
            }
        }
        Step::Ran(done.status)
    }
}

/// While the shell waits for a foreground job, keyboard interrupts are meant
/// for the job only. Children restore the default handlers before `execve`.
fn ignore_terminal_signals() {
    for sig in [Signal::SIGINT, Signal::SIGQUIT] {
        // SAFETY: installs no handler function, only the ignore disposition.
        if let Err(e) = unsafe { signal(sig, SigHandler::SigIgn) } {
            tracing::warn!("failed to ignore {:?}: {}", sig, e);
        }
    }
}
