use crate::error::ShellError;
use crate::shell::ast::Command;
use crate::shell::context::ShellContext;
use crate::shell::token::{Token, TokenKind, tokenize};
use anyhow::Result;
use log::debug;

/// Tokenizes and parses one input line, expanding variables from `ctx`.
pub fn parse_command_line(line: &str, ctx: &ShellContext) -> Result<Command> {
    let tokens = tokenize(line, |name| ctx.lookup_var(name));
    let cmd = parse_tokens(tokens)?;
    debug!("parsed {:?} -> {:?}", line, cmd);
    Ok(cmd)
}

/// Parses a token stream into a command tree.
///
/// ```text
/// line     := pipeline (';' line)?
/// pipeline := group ('&')?
/// group    := single ('|' group)?
/// single   := (WORD | redirect)* | '(' line ')' redirect*
/// redirect := ('<' | '>' | '>>') WORD
/// ```
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Command, ShellError> {
    let mut parser = Parser { tokens, pos: 0 };
    let cmd = parser.parse_line()?;
    if let Some(tok) = parser.peek() {
        return Err(unexpected(tok));
    }
    Ok(cmd)
}

fn unexpected(tok: &Token) -> ShellError {
    ShellError::Parse(format!("syntax error near unexpected token `{}`", tok.text))
}

/// Redirections collected for one command. Later ones override earlier ones.
#[derive(Default)]
struct Redirections {
    input_file: Option<String>,
    output_file: Option<String>,
    append: bool,
}

impl Redirections {
    fn wrap(self, child: Command) -> Command {
        if self.input_file.is_none() && self.output_file.is_none() {
            return child;
        }
        Command::Redirect {
            child: Box::new(child),
            input_file: self.input_file,
            output_file: self.output_file,
            append: self.append,
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_line(&mut self) -> Result<Command, ShellError> {
        let left = self.parse_pipeline()?;
        if self.peek_kind() != Some(TokenKind::Sequence) {
            return Ok(left);
        }
        if left.is_empty() {
            return Err(unexpected(&self.tokens[self.pos]));
        }
        self.advance();
        // Trailing ';' (or one closing a group) ends the list
        if matches!(self.peek_kind(), None | Some(TokenKind::RParen)) {
            return Ok(left);
        }
        let right = self.parse_line()?;
        Ok(Command::sequence(left, right))
    }

    fn parse_pipeline(&mut self) -> Result<Command, ShellError> {
        let cmd = self.parse_group()?;
        if self.peek_kind() == Some(TokenKind::Background) {
            if cmd.is_empty() {
                return Err(unexpected(&self.tokens[self.pos]));
            }
            self.advance();
            return Ok(Command::background(cmd));
        }
        Ok(cmd)
    }

    fn parse_group(&mut self) -> Result<Command, ShellError> {
        let left = self.parse_single()?;
        if self.peek_kind() != Some(TokenKind::Pipe) {
            return Ok(left);
        }
        if left.is_empty() {
            return Err(unexpected(&self.tokens[self.pos]));
        }
        self.advance();
        let right = self.parse_group()?;
        if right.is_empty() {
            return Err(ShellError::Parse("missing command after `|`".to_string()));
        }
        Ok(Command::pipe(left, right))
    }

    fn parse_single(&mut self) -> Result<Command, ShellError> {
        if self.peek_kind() == Some(TokenKind::LParen) {
            return self.parse_block();
        }

        let mut argv = Vec::new();
        let mut redirs = Redirections::default();
        loop {
            match self.peek_kind() {
                Some(TokenKind::Word) => {
                    if let Some(tok) = self.advance() {
                        argv.push(tok.text);
                    }
                }
                Some(kind) if is_redirect(kind) => self.parse_redirect(&mut redirs)?,
                _ => break,
            }
        }
        Ok(redirs.wrap(Command::exec(argv)))
    }

    fn parse_block(&mut self) -> Result<Command, ShellError> {
        self.advance(); // (
        let inner = self.parse_line()?;
        if self.peek_kind() != Some(TokenKind::RParen) {
            return Err(ShellError::Parse("unmatched `(`".to_string()));
        }
        self.advance(); // )
        if inner.is_empty() {
            return Err(ShellError::Parse("empty group `()`".to_string()));
        }

        let mut redirs = Redirections::default();
        while let Some(kind) = self.peek_kind() {
            if !is_redirect(kind) {
                break;
            }
            self.parse_redirect(&mut redirs)?;
        }
        Ok(redirs.wrap(inner))
    }

    fn parse_redirect(&mut self, redirs: &mut Redirections) -> Result<(), ShellError> {
        let Some(op) = self.advance() else {
            return Ok(());
        };
        let file = match self.peek_kind() {
            Some(TokenKind::Word) => self.advance().map(|t| t.text).unwrap_or_default(),
            _ => {
                return Err(ShellError::Parse(
                    "missing filename for redirection".to_string(),
                ));
            }
        };
        match op.kind {
            TokenKind::RedirectIn => redirs.input_file = Some(file),
            TokenKind::RedirectOut => {
                redirs.output_file = Some(file);
                redirs.append = false;
            }
            _ => {
                redirs.output_file = Some(file);
                redirs.append = true;
            }
        }
        Ok(())
    }
}

fn is_redirect(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::RedirectIn | TokenKind::RedirectOut | TokenKind::RedirectAppend
    )
}
