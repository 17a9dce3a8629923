// Lexical analysis of one input line

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    RedirectIn,     // <
    RedirectOut,    // >
    RedirectAppend, // >>
    Pipe,           // |
    Sequence,       // ;
    Background,     // &
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
}

impl Token {
    fn new(text: impl Into<String>, kind: TokenKind) -> Self {
        Self { text: text.into(), kind }
    }

    pub fn word(text: impl Into<String>) -> Self {
        Self::new(text, TokenKind::Word)
    }
}

fn is_operator(c: char) -> bool {
    matches!(c, '<' | '>' | '|' | ';' | '&' | '(' | ')')
}

/// Tokenizes `line`, resolving `$NAME` and `$?` through `lookup`.
///
/// Quoted spans are taken verbatim and never expanded. A backslash outside
/// quotes makes the next character part of the current word.
pub fn tokenize<F>(line: &str, lookup: F) -> Vec<Token>
where
    F: Fn(&str) -> Option<String>,
{
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if is_operator(c) {
            chars.next();
            let token = match c {
                '<' => Token::new("<", TokenKind::RedirectIn),
                '>' => {
                    if let Some(&'>') = chars.peek() {
                        chars.next();
                        Token::new(">>", TokenKind::RedirectAppend)
                    } else {
                        Token::new(">", TokenKind::RedirectOut)
                    }
                }
                '|' => Token::new("|", TokenKind::Pipe),
                ';' => Token::new(";", TokenKind::Sequence),
                '&' => Token::new("&", TokenKind::Background),
                '(' => Token::new("(", TokenKind::LParen),
                _ => Token::new(")", TokenKind::RParen),
            };
            tokens.push(token);
            continue;
        }

        // Word: runs until whitespace or an unescaped operator
        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() || is_operator(c) {
                break;
            }
            chars.next();
            match c {
                '"' => {
                    // Unterminated quote consumes to end of input
                    for q in chars.by_ref() {
                        if q == '"' {
                            break;
                        }
                        word.push(q);
                    }
                }
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        word.push(escaped);
                    }
                }
                '$' => {
                    let mut name = String::new();
                    if let Some(&'?') = chars.peek() {
                        chars.next();
                        name.push('?');
                    } else {
                        while let Some(&vc) = chars.peek() {
                            if vc.is_ascii_alphanumeric() || vc == '_' {
                                name.push(vc);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                    }
                    if name.is_empty() {
                        word.push('$');
                    } else if let Some(value) = lookup(&name) {
                        word.push_str(&value);
                    }
                }
                _ => word.push(c),
            }
        }
        tokens.push(Token::word(word));
    }

    tokens
}
