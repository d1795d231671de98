use crate::command::{Command, ExitCode, Status};
use crate::config::Settings;
use crate::env::Environment;
use crate::error::CdError;
use crate::executor::{self, Stream};
use crate::io_adapters::LineSource;
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use nix::unistd::AccessFlags;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Printed when the shell terminates on request.
pub const FAREWELL: &str = "\nThe Gates Of Shell have closed. Goodbye.\n";

const DEFAULT_COUNTDOWN: u32 = 5;

static VARIABLE_NAME: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$"));

/// What running a built-in means for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Keep reading input; the built-in finished with this status.
    Status(Status),
    /// Terminate the shell with this exit code.
    Exit(ExitCode),
}

/// Session state a built-in may read or change.
pub struct Context<'a> {
    pub env: &'a mut Environment,
    pub settings: &'a Settings,
    /// Start of every diagnostic, `<program>: <line>`.
    pub prefix: &'a str,
}

/// Built-in commands known to the shell at compile time.
///
/// Arguments are parsed through [`FromArgs`], derived where the usual flag
/// syntax fits and written by hand where a built-in takes raw words such as
/// `-` or negative numbers.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Runs the command in the shell's own process.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<Outcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Env,
    Exit,
    SetEnv,
    UnsetEnv,
    Cd,
    Echo,
    SelfDestruct,
}

const BUILTINS: &[(&str, Builtin)] = &[
    ("env", Builtin::Env),
    ("exit", Builtin::Exit),
    ("quit", Builtin::Exit),
    ("setenv", Builtin::SetEnv),
    ("unsetenv", Builtin::UnsetEnv),
    ("cd", Builtin::Cd),
    ("echo", Builtin::Echo),
    ("self-destruct", Builtin::SelfDestruct),
    ("selfdestr", Builtin::SelfDestruct),
];

/// Find the built-in that handles `command`, if any.
///
/// `echo` is only taken over when its output goes to a file; plain `echo`
/// runs as an external program.
pub fn lookup(command: &Command) -> Option<Builtin> {
    let name = command.name()?;
    let (_, builtin) = BUILTINS.iter().find(|(n, _)| *n == name)?;
    if *builtin == Builtin::Echo && !command.redirections.iter().any(|r| r.kind.is_output()) {
        return None;
    }
    Some(*builtin)
}

/// Run a built-in found by [`lookup`].
///
/// Redirections are opened first, in order; standard output of the built-in
/// is the last output target, if there is one.
pub fn run(
    builtin: Builtin,
    command: &Command,
    ctx: &mut Context<'_>,
    input: &mut dyn LineSource,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Outcome {
    let opened = match executor::open_all(command, input) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = writeln!(stderr, "{}: {e}", ctx.prefix);
            return Outcome::Status(Status::FAILURE);
        }
    };
    let mut target = opened
        .into_iter()
        .rev()
        .find(|o| o.stream == Stream::Stdout)
        .map(|o| o.file);
    let out: &mut dyn Write = match target.as_mut() {
        Some(file) => file,
        None => stdout,
    };

    let name = command.name().unwrap_or_default();
    let args: Vec<&str> = command.args().iter().map(String::as_str).collect();
    tracing::debug!(builtin = ?builtin, name, "dispatching built-in");
    let outcome = match builtin {
        Builtin::Env => invoke::<Env>(name, &args, out, stderr, ctx),
        Builtin::Exit => invoke::<Exit>(name, &args, out, stderr, ctx),
        Builtin::SetEnv => invoke::<SetEnv>(name, &args, out, stderr, ctx),
        Builtin::UnsetEnv => invoke::<UnsetEnv>(name, &args, out, stderr, ctx),
        Builtin::Cd => invoke::<Cd>(name, &args, out, stderr, ctx),
        Builtin::Echo => invoke::<Echo>(name, &args, out, stderr, ctx),
        Builtin::SelfDestruct => invoke::<SelfDestruct>(name, &args, out, stderr, ctx),
    };
    if let Err(e) = out.flush() {
        tracing::warn!("failed to flush built-in output: {}", e);
    }
    outcome
}

fn invoke<T: BuiltinCommand>(
    name: &str,
    args: &[&str],
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    ctx: &mut Context<'_>,
) -> Outcome {
    let result = match T::from_args(&[name], args) {
        Ok(cmd) => cmd.execute(stdout, stderr, ctx),
        Err(EarlyExit { output, status }) => {
            let sink: &mut dyn Write = if status.is_err() {
                &mut *stderr
            } else {
                &mut *stdout
            };
            writeln!(sink, "{}", output.trim_end())
                .map(|()| Outcome::Status(status.is_ok().into()))
                .map_err(Into::into)
        }
    };
    result.unwrap_or_else(|e| {
        let _ = writeln!(stderr, "{}: {name}: {e:#}", ctx.prefix);
        Outcome::Status(Status::FAILURE)
    })
}

#[derive(FromArgs)]
/// Print the environment, one NAME=VALUE pair per line.
pub struct Env {}

impl BuiltinCommand for Env {
    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<Outcome> {
        for (name, value) in ctx.env.sorted() {
            writeln!(stdout, "{name}={value}")?;
        }
        Ok(Outcome::Status(Status::Success))
    }
}

/// Leave the shell. Takes the exit code as a raw word.
pub struct Exit {
    pub code: Option<String>,
}

impl FromArgs for Exit {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Exit {
            code: args.first().map(|s| s.to_string()),
        })
    }
}

/// Decimal exit code folded into `0..=255`.
fn parse_exit_code(arg: &str) -> Option<ExitCode> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(
        arg.bytes()
            .fold(0, |acc, b| (acc * 10 + ExitCode::from(b - b'0')) % 256),
    )
}

impl BuiltinCommand for Exit {
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<Outcome> {
        let code = match self.code.as_deref() {
            None => 0,
            Some(arg) => match parse_exit_code(arg) {
                Some(code) => code,
                None => {
                    writeln!(stderr, "{}: exit: Illegal number: {arg}", ctx.prefix)?;
                    farewell(stdout, ctx.settings)?;
                    return Ok(Outcome::Exit(Status::UsageError.code()));
                }
            },
        };
        farewell(stdout, ctx.settings)?;
        Ok(Outcome::Exit(code))
    }
}

/// The closing banner belongs to interactive sessions only.
fn farewell(stdout: &mut dyn Write, settings: &Settings) -> std::io::Result<()> {
    if settings.interactive {
        write!(stdout, "{FAREWELL}")?;
    }
    Ok(())
}

/// Set an environment variable for this session and the commands it runs.
/// Takes exactly `NAME VALUE`; any other arity is a usage error.
pub struct SetEnv {
    pub words: Vec<String>,
}

impl FromArgs for SetEnv {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(SetEnv {
            words: args.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for SetEnv {
    fn execute(
        self,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<Outcome> {
        let Ok([name, value]) = <[String; 2]>::try_from(self.words) else {
            writeln!(stderr, "{}: setenv: usage: setenv NAME VALUE", ctx.prefix)?;
            return Ok(Outcome::Status(Status::UsageError));
        };
        let valid = VARIABLE_NAME.as_ref().map_err(Clone::clone)?;
        if !valid.is_match(&name) {
            writeln!(stderr, "{}: setenv: {name}: bad variable name", ctx.prefix)?;
            return Ok(Outcome::Status(Status::UsageError));
        }
        ctx.env.set_var(name, value);
        Ok(Outcome::Status(Status::Success))
    }
}

#[derive(FromArgs)]
/// Remove variables from the environment. Unknown names are ignored.
pub struct UnsetEnv {
    #[argh(positional, greedy)]
    /// variable names
    pub names: Vec<String>,
}

impl BuiltinCommand for UnsetEnv {
    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<Outcome> {
        for name in &self.names {
            if !ctx.env.unset_var(name) {
                tracing::debug!(name = name.as_str(), "unsetenv: variable was not set");
            }
        }
        Ok(Outcome::Status(Status::Success))
    }
}

/// Change the working directory. Accepts `-` and `~` as well as paths.
pub struct Cd {
    pub args: Vec<String>,
}

impl FromArgs for Cd {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Cd {
            args: args.iter().map(|s| s.to_string()).collect(),
        })
    }
}

enum Destination {
    Path(PathBuf),
    /// `cd -`: the previous directory, reported back to the user.
    Previous(PathBuf),
    /// `cd -` before any directory change.
    Stay,
}

fn home(env: &Environment) -> Result<PathBuf, CdError> {
    env.get_var("HOME").map(PathBuf::from).ok_or(CdError::HomeNotSet)
}

fn working_dir(env: &Environment) -> PathBuf {
    std::env::current_dir()
        .ok()
        .or_else(|| env.get_var("PWD").map(PathBuf::from))
        .unwrap_or_default()
}

impl Cd {
    fn destination(&self, env: &Environment, cwd: &Path) -> Result<Destination, CdError> {
        match self.args.as_slice() {
            [] => home(env).map(Destination::Path),
            [arg] if arg == "~" => home(env).map(Destination::Path),
            [arg] if arg == "-" => Ok(match env.get_var("OLDPWD") {
                Some(old) => Destination::Previous(PathBuf::from(old)),
                None => Destination::Stay,
            }),
            [arg] if arg.starts_with('/') => Ok(Destination::Path(PathBuf::from(arg))),
            [arg] => Ok(Destination::Path(cwd.join(arg))),
            _ => Err(CdError::TooManyArguments),
        }
    }
}

/// Checks `target` and makes it the working directory, updating `PWD` and
/// `OLDPWD` on success.
fn change_dir(target: &Path, cwd: &Path, env: &mut Environment) -> Result<(), CdError> {
    let shown = || target.display().to_string();
    if !target.is_dir() {
        return Err(CdError::NotADirectory(shown()));
    }
    if nix::unistd::access(target, AccessFlags::X_OK).is_err() {
        return Err(CdError::PermissionDenied(shown()));
    }
    std::env::set_current_dir(target).map_err(|_| CdError::ChangeFailed(shown()))?;

    let new_dir = std::env::current_dir().unwrap_or_else(|_| target.to_path_buf());
    env.set_var("OLDPWD", cwd.to_string_lossy());
    env.set_var("PWD", new_dir.to_string_lossy());
    Ok(())
}

impl BuiltinCommand for Cd {
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<Outcome> {
        let cwd = working_dir(ctx.env);
        let (result, previous) = match self.destination(ctx.env, &cwd) {
            Ok(Destination::Stay) => {
                writeln!(stdout, "{}", cwd.display())?;
                return Ok(Outcome::Status(Status::Success));
            }
            Ok(Destination::Path(target)) => (change_dir(&target, &cwd, ctx.env), false),
            Ok(Destination::Previous(target)) => (change_dir(&target, &cwd, ctx.env), true),
            Err(e) => (Err(e), false),
        };

        let status = match result {
            Ok(()) => {
                if previous {
                    writeln!(stdout, "{}", ctx.env.get_var("PWD").unwrap_or_default())?;
                }
                Status::Success
            }
            Err(e) => {
                writeln!(stderr, "{}: {e}", ctx.prefix)?;
                if previous {
                    writeln!(stdout, "{}", ctx.env.get_var("PWD").unwrap_or_default())?;
                    Status::FAILURE
                } else {
                    if e.echoes_cwd() {
                        writeln!(stdout, "{}", cwd.display())?;
                    }
                    e.status()
                }
            }
        };
        Ok(Outcome::Status(status))
    }
}

/// Write words to a file, separated by spaces and followed by a newline.
///
/// A leading `-n` drops the newline. Every other word, including `--help`
/// and anything else that looks like an option, is printed as is.
pub struct Echo {
    pub no_newline: bool,
    pub words: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        let (no_newline, words) = match args.split_first() {
            Some((&"-n", rest)) => (true, rest),
            _ => (false, args),
        };
        Ok(Echo {
            no_newline,
            words: words.iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// Strips one pair of matching surrounding quotes.
fn unquote(word: &str) -> &str {
    for quote in ['"', '\''] {
        if word.len() >= 2 && word.starts_with(quote) && word.ends_with(quote) {
            return &word[1..word.len() - 1];
        }
    }
    word
}

impl BuiltinCommand for Echo {
    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _ctx: &mut Context<'_>,
    ) -> Result<Outcome> {
        let text = self
            .words
            .iter()
            .map(String::as_str)
            .map(unquote)
            .collect::<Vec<_>>()
            .join(" ");
        if self.no_newline {
            write!(stdout, "{text}")?;
        } else {
            writeln!(stdout, "{text}")?;
        }
        Ok(Outcome::Status(Status::Success))
    }
}

/// Dramatic exit with a countdown.
pub struct SelfDestruct {
    pub seconds: Option<String>,
}

impl FromArgs for SelfDestruct {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(SelfDestruct {
            seconds: args.first().map(|s| s.to_string()),
        })
    }
}

impl SelfDestruct {
    fn countdown(&self) -> u32 {
        self.seconds
            .as_deref()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_COUNTDOWN)
    }
}

fn pause(out: &mut dyn Write, delay: Duration) -> std::io::Result<()> {
    out.flush()?;
    std::thread::sleep(delay);
    Ok(())
}

impl BuiltinCommand for SelfDestruct {
    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        ctx: &mut Context<'_>,
    ) -> Result<Outcome> {
        let tick = ctx.settings.countdown_tick;
        writeln!(stdout, "Segmentation fault")?;
        pause(stdout, tick)?;
        writeln!(stdout, "Self destruct mode activated.\n")?;
        pause(stdout, tick * 2)?;
        for n in (1..=self.countdown()).rev() {
            writeln!(stdout, "{n}")?;
            pause(stdout, tick)?;
        }
        farewell(stdout, ctx.settings)?;
        Ok(Outcome::Exit(0))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::io_adapters::ScriptSource;
    use crate::parser::parse_command;
    use std::fs;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    /// Serializes tests that read or change the process working directory.
    pub(crate) fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        let mutex = MUTEX.get_or_init(|| Mutex::new(()));
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    struct Run {
        outcome: Outcome,
        out: String,
        err: String,
    }

    fn run_line(line: &str, env: &mut Environment, settings: &Settings) -> Run {
        let command = parse_command(line).expect("parses");
        let builtin = lookup(&command).expect("is a built-in");
        let mut ctx = Context {
            env,
            settings,
            prefix: "gosh: 1",
        };
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let outcome = run(
            builtin,
            &command,
            &mut ctx,
            &mut ScriptSource::default(),
            &mut out,
            &mut err,
        );
        Run {
            outcome,
            out: String::from_utf8(out).unwrap(),
            err: String::from_utf8(err).unwrap(),
        }
    }

    fn run_batch(line: &str, env: &mut Environment) -> Run {
        run_line(line, env, &Settings::batch("gosh"))
    }

    #[test]
    fn test_lookup_matches_exact_names_only() {
        let lookup_line = |line: &str| lookup(&parse_command(line).unwrap());
        assert_eq!(lookup_line("quit 3"), Some(Builtin::Exit));
        assert_eq!(lookup_line("selfdestr"), Some(Builtin::SelfDestruct));
        assert_eq!(lookup_line("env"), Some(Builtin::Env));
        assert_eq!(lookup_line("envx"), None);
        assert_eq!(lookup_line("ls"), None);
    }

    #[test]
    fn test_echo_is_builtin_only_with_output_redirection() {
        let lookup_line = |line: &str| lookup(&parse_command(line).unwrap());
        assert_eq!(lookup_line("echo hi"), None);
        assert_eq!(lookup_line("echo hi < in"), None);
        assert_eq!(lookup_line("echo hi > out"), Some(Builtin::Echo));
        assert_eq!(lookup_line("echo hi >> out"), Some(Builtin::Echo));
    }

    #[test]
    fn test_env_prints_every_pair() {
        let mut env: Environment = [("B", "2"), ("A", "1")].into_iter().collect();
        let run = run_batch("env", &mut env);
        assert_eq!(run.outcome, Outcome::Status(Status::Success));
        assert_eq!(run.out, "A=1\nB=2\n");
    }

    #[test]
    fn test_env_rejects_unknown_arguments() {
        let run = run_batch("env --bogus", &mut Environment::default());
        assert_eq!(run.outcome, Outcome::Status(Status::FAILURE));
        assert!(run.err.contains("--bogus"));
    }

    #[test]
    fn test_env_output_can_be_redirected() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("env.txt");
        let mut env: Environment = [("ONLY", "one")].into_iter().collect();
        let run = run_batch(&format!("env > {}", target.display()), &mut env);
        assert!(run.out.is_empty());
        assert_eq!(fs::read_to_string(target).unwrap(), "ONLY=one\n");
    }

    #[test]
    fn test_exit_codes() {
        let mut env = Environment::default();
        assert_eq!(run_batch("exit", &mut env).outcome, Outcome::Exit(0));
        assert_eq!(run_batch("quit 3", &mut env).outcome, Outcome::Exit(3));
        assert_eq!(run_batch("exit 256", &mut env).outcome, Outcome::Exit(0));
        assert_eq!(run_batch("exit 300", &mut env).outcome, Outcome::Exit(44));
    }

    #[test]
    fn test_exit_illegal_number() {
        let run = run_batch("exit foo", &mut Environment::default());
        assert_eq!(run.outcome, Outcome::Exit(2));
        assert_eq!(run.err, "gosh: 1: exit: Illegal number: foo\n");
        let run = run_batch("exit -1", &mut Environment::default());
        assert_eq!(run.outcome, Outcome::Exit(2));
        assert!(run.out.is_empty());
    }

    #[test]
    fn test_exit_illegal_number_says_goodbye_when_interactive() {
        let mut settings = Settings::batch("gosh");
        settings.interactive = true;
        let run = run_line("exit foo", &mut Environment::default(), &settings);
        assert_eq!(run.outcome, Outcome::Exit(2));
        assert_eq!(run.err, "gosh: 1: exit: Illegal number: foo\n");
        assert_eq!(run.out, FAREWELL);
    }

    #[test]
    fn test_exit_prints_farewell_only_when_interactive() {
        let mut settings = Settings::batch("gosh");
        assert!(run_line("exit", &mut Environment::default(), &settings).out.is_empty());
        settings.interactive = true;
        let run = run_line("exit", &mut Environment::default(), &settings);
        assert_eq!(run.out, FAREWELL);
    }

    #[test]
    fn test_setenv_and_unsetenv() {
        let mut env = Environment::default();
        let run = run_batch("setenv GREETING hello", &mut env);
        assert_eq!(run.outcome, Outcome::Status(Status::Success));
        assert_eq!(env.get_var("GREETING"), Some("hello"));

        run_batch("setenv GREETING bye", &mut env);
        assert_eq!(env.get_var("GREETING"), Some("bye"));

        assert_eq!(
            run_batch("unsetenv GREETING", &mut env).outcome,
            Outcome::Status(Status::Success)
        );
        assert_eq!(env.get_var("GREETING"), None);
        assert_eq!(
            run_batch("unsetenv GREETING", &mut env).outcome,
            Outcome::Status(Status::Success)
        );
    }

    #[test]
    fn test_setenv_usage_errors() {
        let mut env = Environment::default();
        let run = run_batch("setenv ONLY_NAME", &mut env);
        assert_eq!(run.outcome, Outcome::Status(Status::UsageError));
        assert!(run.err.contains("usage"));

        let run = run_batch("setenv 1BAD value", &mut env);
        assert_eq!(run.outcome, Outcome::Status(Status::UsageError));
        assert!(env.is_empty());
    }

    #[test]
    fn test_setenv_rejects_extra_words() {
        let mut env = Environment::default();
        let run = run_batch("setenv A b c", &mut env);
        assert_eq!(run.outcome, Outcome::Status(Status::UsageError));
        assert_eq!(run.err, "gosh: 1: setenv: usage: setenv NAME VALUE\n");
        assert_eq!(env.get_var("A"), None);

        let run = run_batch("setenv", &mut env);
        assert_eq!(run.outcome, Outcome::Status(Status::UsageError));
        assert!(env.is_empty());
    }

    #[test]
    fn test_echo_writes_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f.txt");
        let mut env = Environment::default();

        run_batch(&format!("echo \"hi\" > {}", target.display()), &mut env);
        assert_eq!(fs::read_to_string(&target).unwrap(), "hi\n");

        run_batch(&format!("echo 'hi' >> {}", target.display()), &mut env);
        run_batch(&format!("echo hi >> {}", target.display()), &mut env);
        assert_eq!(fs::read_to_string(&target).unwrap(), "hi\nhi\nhi\n");
    }

    #[test]
    fn test_echo_no_newline_and_multiple_words() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("n.txt");
        run_batch(
            &format!("echo -n a \"b\" c > {}", target.display()),
            &mut Environment::default(),
        );
        assert_eq!(fs::read_to_string(&target).unwrap(), "a b c");
    }

    #[test]
    fn test_echo_prints_option_like_words_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("o.txt");
        for words in ["help", "--help", "-x", "-5", "a -n b"] {
            let run = run_batch(
                &format!("echo {words} > {}", target.display()),
                &mut Environment::default(),
            );
            assert_eq!(run.outcome, Outcome::Status(Status::Success), "{words}");
            assert!(run.err.is_empty(), "{words}");
            assert_eq!(fs::read_to_string(&target).unwrap(), format!("{words}\n"));
        }
    }

    #[test]
    fn test_echo_only_a_leading_n_is_a_flag() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("n.txt");
        run_batch(
            &format!("echo -n -n x > {}", target.display()),
            &mut Environment::default(),
        );
        assert_eq!(fs::read_to_string(&target).unwrap(), "-n x");
    }

    #[test]
    fn test_echo_last_target_wins_but_all_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        run_batch(
            &format!("echo x > {} > {}", first.display(), second.display()),
            &mut Environment::default(),
        );
        assert_eq!(fs::read_to_string(first).unwrap(), "");
        assert_eq!(fs::read_to_string(second).unwrap(), "x\n");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"hi\""), "hi");
        assert_eq!(unquote("'hi'"), "hi");
        assert_eq!(unquote("\"hi'"), "\"hi'");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("plain"), "plain");
    }

    #[test]
    fn test_cd_to_absolute_path_updates_pwd_and_oldpwd() {
        let _lock = lock_current_dir();
        let orig = std::env::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let canonical = fs::canonicalize(temp.path()).unwrap();
        let mut env = Environment::default();

        let run = run_batch(&format!("cd {}", canonical.display()), &mut env);
        assert_eq!(run.outcome, Outcome::Status(Status::Success));
        assert_eq!(std::env::current_dir().unwrap(), canonical);
        assert_eq!(env.get_var("PWD"), Some(canonical.to_str().unwrap()));
        assert_eq!(env.get_var("OLDPWD"), Some(orig.to_str().unwrap()));

        std::env::set_current_dir(orig).unwrap();
    }

    #[test]
    fn test_cd_relative_path_and_dash() {
        let _lock = lock_current_dir();
        let orig = std::env::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let base = fs::canonicalize(temp.path()).unwrap();
        fs::create_dir(base.join("sub")).unwrap();
        std::env::set_current_dir(&base).unwrap();
        let mut env = Environment::default();

        run_batch("cd sub", &mut env);
        assert_eq!(std::env::current_dir().unwrap(), base.join("sub"));

        let run = run_batch("cd -", &mut env);
        assert_eq!(run.outcome, Outcome::Status(Status::Success));
        assert_eq!(run.out, format!("{}\n", base.display()));
        assert_eq!(std::env::current_dir().unwrap(), base);

        std::env::set_current_dir(orig).unwrap();
    }

    #[test]
    fn test_cd_dash_without_oldpwd_stays() {
        let _lock = lock_current_dir();
        let orig = std::env::current_dir().unwrap();
        let run = run_batch("cd -", &mut Environment::default());
        assert_eq!(run.outcome, Outcome::Status(Status::Success));
        assert_eq!(run.out, format!("{}\n", orig.display()));
        assert_eq!(std::env::current_dir().unwrap(), orig);
    }

    #[test]
    fn test_cd_home_and_tilde() {
        let _lock = lock_current_dir();
        let orig = std::env::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let home = fs::canonicalize(temp.path()).unwrap();
        let mut env: Environment = [("HOME", home.to_str().unwrap())].into_iter().collect();

        run_batch("cd", &mut env);
        assert_eq!(std::env::current_dir().unwrap(), home);
        std::env::set_current_dir(&orig).unwrap();

        run_batch("cd ~", &mut env);
        assert_eq!(std::env::current_dir().unwrap(), home);
        std::env::set_current_dir(&orig).unwrap();

        let run = run_batch("cd", &mut Environment::default());
        assert_eq!(run.outcome, Outcome::Status(Status::Failure(1)));
        assert_eq!(run.err, "gosh: 1: cd: HOME not set\n");
    }

    #[test]
    fn test_cd_error_statuses() {
        let _lock = lock_current_dir();
        let orig = std::env::current_dir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("plain");
        fs::write(&file, "").unwrap();
        let mut env = Environment::default();

        let run = run_batch(&format!("cd {}", file.display()), &mut env);
        assert_eq!(run.outcome, Outcome::Status(Status::Failure(4)));
        assert_eq!(run.out, format!("{}\n", orig.display()));

        let run = run_batch("cd /nonexistent-gosh-dir", &mut env);
        assert_eq!(run.outcome, Outcome::Status(Status::Failure(4)));

        let run = run_batch("cd a b", &mut env);
        assert_eq!(run.outcome, Outcome::Status(Status::Failure(3)));
        assert!(run.out.is_empty());

        assert_eq!(std::env::current_dir().unwrap(), orig);
        assert_eq!(env.get_var("OLDPWD"), None);
    }

    #[test]
    fn test_cd_permission_denied() {
        use std::os::unix::fs::PermissionsExt;
        let _lock = lock_current_dir();
        let temp = tempfile::tempdir().unwrap();
        let locked = temp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o600)).unwrap();

        // root bypasses search permission checks.
        if nix::unistd::access(&locked, AccessFlags::X_OK).is_ok() {
            return;
        }
        let run = run_batch(&format!("cd {}", locked.display()), &mut Environment::default());
        assert_eq!(run.outcome, Outcome::Status(Status::Failure(2)));
        assert!(run.err.ends_with("Permission denied\n"));
    }

    #[test]
    fn test_self_destruct_counts_down_and_exits() {
        let run = run_batch("self-destruct 3", &mut Environment::default());
        assert_eq!(run.outcome, Outcome::Exit(0));
        assert_eq!(
            run.out,
            "Segmentation fault\nSelf destruct mode activated.\n\n3\n2\n1\n"
        );
    }

    #[test]
    fn test_self_destruct_says_goodbye_when_interactive() {
        let mut settings = Settings::batch("gosh");
        settings.interactive = true;
        let run = run_line("selfdestr 1", &mut Environment::default(), &settings);
        assert_eq!(run.outcome, Outcome::Exit(0));
        assert!(run.out.ends_with(&format!("1\n{FAREWELL}")));
    }

    #[test]
    fn test_self_destruct_ignores_bad_countdown() {
        for line in ["selfdestr", "selfdestr 0", "selfdestr soon", "selfdestr -4"] {
            let run = run_batch(line, &mut Environment::default());
            assert!(run.out.contains("5\n4\n3\n2\n1\n"), "{line}");
            assert_eq!(run.outcome, Outcome::Exit(0));
        }
    }
}
