//! Sources of input lines for the read-eval loop.
//!
//! The loop and the heredoc collector only see [`LineSource`]; whether lines
//! come from a terminal line editor, a pipe or an in-memory script is decided
//! once at start-up.

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::collections::VecDeque;
use std::io::{self, BufRead};

/// Something that yields one line of input at a time.
pub trait LineSource {
    /// Read the next line without its line terminator. `Ok(None)` means end
    /// of input. `prompt` is shown only by interactive sources.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Interactive input through a line editor with in-memory history.
pub struct EditorSource {
    editor: DefaultEditor,
}

impl EditorSource {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = self.editor.add_history_entry(line.as_str()) {
                        tracing::warn!("failed to add history entry: {}", e);
                    }
                }
                Ok(Some(line))
            }
            // Ctrl-C abandons the current line only.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e.to_string())),
        }
    }
}

/// Non-interactive input from any buffered reader, usually stdin.
pub struct ReaderSource<R> {
    reader: R,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

/// Fixed list of lines, used for `-c` and in tests.
#[derive(Debug, Default)]
pub struct ScriptSource {
    lines: VecDeque<String>,
}

impl ScriptSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineSource for ScriptSource {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

/// Reads a heredoc body: every line up to, not including, the one equal to
/// `delimiter`. End of input also ends the body. Each line keeps a trailing
/// newline.
pub fn collect_heredoc(source: &mut dyn LineSource, delimiter: &str) -> io::Result<String> {
    let mut body = String::new();
    while let Some(line) = source.read_line("> ")? {
        if line == delimiter {
            return Ok(body);
        }
        body.push_str(&line);
        body.push('\n');
    }
    tracing::debug!(delimiter, "heredoc ended by end of input");
    Ok(body)
}
