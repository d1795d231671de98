use argh::FromArgs;
use std::io::IsTerminal;
use std::time::Duration;

#[derive(FromArgs, Debug, Default)]
/// A small interactive shell: built-ins, redirections, pipes and `&&`/`||`/`;`.
pub struct Args {
    #[argh(option, short = 'c')]
    /// evaluate COMMAND as one input line, then exit with its status
    pub command: Option<String>,

    #[argh(switch, short = 'i')]
    /// behave interactively even when stdin is not a terminal
    pub interactive: bool,

    #[argh(option, default = "1000")]
    /// milliseconds between steps of the self-destruct countdown
    pub countdown_tick_ms: u64,
}

/// Session-wide settings, fixed at start-up.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Prefix of user-facing diagnostics, normally `argv[0]`.
    pub program_name: String,
    /// Prompts and banners are shown; command-not-found is not fatal.
    pub interactive: bool,
    /// Pause between countdown steps of `self-destruct`.
    pub countdown_tick: Duration,
}

impl Settings {
    /// Combine parsed flags with the state of standard input.
    ///
    /// `-c` always runs non-interactively.
    pub fn from_args(program_name: impl Into<String>, args: &Args) -> Self {
        let interactive = args.command.is_none()
            && (args.interactive || std::io::stdin().is_terminal());
        Self {
            program_name: program_name.into(),
            interactive,
            countdown_tick: Duration::from_millis(args.countdown_tick_ms),
        }
    }

    /// Settings for a scripted, non-interactive session without delays.
    pub fn batch(program_name: impl Into<String>) -> Self {
        Self {
            program_name: program_name.into(),
            interactive: false,
            countdown_tick: Duration::ZERO,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::batch(env!("CARGO_PKG_NAME"))
    }
}
