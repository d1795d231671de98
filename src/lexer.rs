//! Lexical analysis of one command-unit.
//!
//! Words are separated by blanks only; there is no quoting. Redirection
//! markers (`<`, `<<`, `>`, `>>`) are recognised anywhere, including glued to
//! the surrounding text: `cat<in>out` lexes as `cat`, `<`, `in`, `>`, `out`.

use crate::command::RedirectKind;

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A run of non-blank, non-marker characters.
    Word(String),
    /// One of `<`, `<<`, `>`, `>>`.
    Redirect(RedirectKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    fn make_tokens(&mut self) -> Vec<Token> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match ch {
                '<' | '>' => {
                    self.finish_word(&mut out);
                    out.push(Token::Redirect(self.read_marker(ch)));
                }
                c if c.is_whitespace() => {
                    if self.state == LexingState::ReadingWord {
                        self.finish_word(&mut out);
                    }
                }
                c => {
                    self.buffer.push(c);
                    self.state = LexingState::ReadingWord;
                }
            }
        }

        self.finish_word(&mut out);
        out
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    /// Completes a marker whose first character was just read, preferring the
    /// two-character form.
    fn read_marker(&mut self, first: char) -> RedirectKind {
        let doubled = self.peek_char() == Some(first);
        if doubled {
            self.read_char();
        }
        match (first, doubled) {
            ('<', false) => RedirectKind::In,
            ('<', true) => RedirectKind::Heredoc,
            (_, false) => RedirectKind::Out,
            (_, true) => RedirectKind::Append,
        }
    }

    fn finish_word(&mut self, out: &mut Vec<Token>) {
        if !self.buffer.is_empty() {
            out.push(Token::Word(std::mem::take(&mut self.buffer)));
        }
        self.state = LexingState::Start;
    }
}

/// Splits a command-unit into words and redirection markers.
pub fn split_into_tokens(unit: &str) -> Vec<Token> {
    LexingFSM::new(unit).make_tokens()
}
