use crate::command::{Command, RedirectKind, Redirection};
use crate::error::ParseError;
use crate::lexer::{self, Token};

/// Builds a [`Command`] from the token stream of one command-unit.
///
/// Words before the first redirection marker form `argv`. From the first
/// marker on, every marker must be followed by a word naming its target.
struct CommandBuilder {
    tokens: Vec<Token>,
    pos: usize,
}

impl CommandBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        CommandBuilder { tokens, pos: 0 }
    }

    fn build(mut self) -> Result<Command, ParseError> {
        let argv = self.parse_words();
        let redirections = self.parse_redirections()?;
        Ok(Command { argv, redirections })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Parse the leading words: the program name and its arguments.
    fn parse_words(&mut self) -> Vec<String> {
        let mut argv = Vec::new();
        while let Some(Token::Word(_)) = self.peek() {
            if let Some(Token::Word(w)) = self.consume() {
                argv.push(w);
            }
        }
        argv
    }

    /// Parse everything from the first marker to the end of the unit.
    fn parse_redirections(&mut self) -> Result<Vec<Redirection>, ParseError> {
        let mut redirections = Vec::new();
        while let Some(token) = self.consume() {
            match token {
                Token::Redirect(kind) => redirections.push(self.parse_redirect(kind)?),
                Token::Word(stray) => {
                    tracing::debug!(word = %stray, "ignoring word after redirection target");
                }
            }
        }
        Ok(redirections)
    }

    /// Parse a redirect target following an already consumed marker.
    fn parse_redirect(&mut self, kind: RedirectKind) -> Result<Redirection, ParseError> {
        match self.peek() {
            Some(Token::Word(target)) => {
                let redirection = Redirection::new(kind, target.clone());
                self.pos += 1;
                Ok(redirection)
            }
            _ => Err(ParseError::MissingTarget {
                operator: kind.operator(),
            }),
        }
    }
}

/// Parses one command-unit (without pipes) into argv and redirections.
///
/// A blank unit yields an empty command, which callers treat as a no-op.
pub fn parse_command(unit: &str) -> Result<Command, ParseError> {
    CommandBuilder::from(lexer::split_into_tokens(unit)).build()
}
