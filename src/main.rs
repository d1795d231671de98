use gosh::io_adapters::{EditorSource, LineSource, ReaderSource, ScriptSource};
use gosh::{Args, Interpreter, Settings};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() {
    let filter = EnvFilter::try_from_env("GOSH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let args: Args = argh::from_env();
    let program = std::env::args()
        .next()
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
    let settings = Settings::from_args(program, &args);

    let code = match run(&args, settings) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {e:#}", env!("CARGO_PKG_NAME"));
            1
        }
    };
    std::process::exit(code);
}

fn run(args: &Args, settings: Settings) -> anyhow::Result<i32> {
    let interactive = settings.interactive;
    tracing::debug!(interactive, "starting session");
    let mut shell = Interpreter::new(settings);
    if let Some(command) = &args.command {
        return shell.run_command(&mut ScriptSource::new(command.lines()));
    }
    let mut input: Box<dyn LineSource> = if interactive {
        Box::new(EditorSource::new()?)
    } else {
        Box::new(ReaderSource::new(std::io::stdin().lock()))
    };
    shell.repl(input.as_mut())
}
