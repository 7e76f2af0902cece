//! S-expression reader
//!
//! Tokens to tagged values. The grammar is the small Kernel-style surface
//! the runtime evaluates:
//!
//! ```text
//! datum   := integer | symbol | literal | '(' datum* ')'
//!          | '(' datum+ '.' datum ')' | quote datum
//! literal := #t | #f | #inert | #ignore | #unit | #undef
//! quote   := '
//! ```
//!
//! Comments run from `;` to end of line. `'x` is sugar for `(quote x)`.
//! The reader allocates through the runtime; a value it returns is not
//! yet a collector root, so enqueue or protect it before running.

use vau_runtime::{Fault, Runtime, Value};

/// Reader errors, with 1-based source positions.
#[derive(Debug)]
pub enum ReadError {
    /// Input ended inside a datum.
    UnexpectedEof { line: usize, col: usize },
    /// A `)` with no open list, or a stray `.`.
    UnexpectedToken { text: String, line: usize, col: usize },
    /// An atom that looks like a number or `#` literal but is not one.
    BadLiteral { text: String, line: usize, col: usize },
    /// Allocation or interning failed.
    Runtime(Fault),
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::UnexpectedEof { line, col } => {
                write!(f, "unexpected end of input at {line}:{col}")
            }
            ReadError::UnexpectedToken { text, line, col } => {
                write!(f, "unexpected {text:?} at {line}:{col}")
            }
            ReadError::BadLiteral { text, line, col } => {
                write!(f, "bad literal {text:?} at {line}:{col}")
            }
            ReadError::Runtime(fault) => write!(f, "reader: {fault}"),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Runtime(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<Fault> for ReadError {
    fn from(fault: Fault) -> ReadError {
        ReadError::Runtime(fault)
    }
}

/// A token with its 1-based source position.
#[derive(Debug, Clone)]
struct Token {
    text: String,
    line: usize,
    col: usize,
}

/// Characters that end an atom.
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | ';' | '\'')
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1usize;
    let mut col = 1usize;
    while let Some(&c) = chars.peek() {
        if c == '\n' {
            chars.next();
            line += 1;
            col = 1;
        } else if c.is_whitespace() {
            chars.next();
            col += 1;
        } else if c == ';' {
            while let Some(&c) = chars.peek() {
                if c == '\n' {
                    break;
                }
                chars.next();
                col += 1;
            }
        } else if matches!(c, '(' | ')' | '\'') {
            tokens.push(Token {
                text: c.to_string(),
                line,
                col,
            });
            chars.next();
            col += 1;
        } else {
            let (start_line, start_col) = (line, col);
            let mut text = String::new();
            while let Some(&c) = chars.peek() {
                if is_delimiter(c) {
                    break;
                }
                text.push(c);
                chars.next();
                col += 1;
            }
            tokens.push(Token {
                text,
                line: start_line,
                col: start_col,
            });
        }
    }
    tokens
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eof_error(&self) -> ReadError {
        let (line, col) = self
            .tokens
            .last()
            .map(|t| (t.line, t.col))
            .unwrap_or((1, 1));
        ReadError::UnexpectedEof { line, col }
    }

    fn parse_datum(&mut self, rt: &mut Runtime) -> Result<Value, ReadError> {
        let Some(token) = self.next() else {
            return Err(self.eof_error());
        };
        match token.text.as_str() {
            "(" => self.parse_list(rt),
            ")" | "." => Err(ReadError::UnexpectedToken {
                text: token.text,
                line: token.line,
                col: token.col,
            }),
            "'" => {
                let datum = self.parse_datum(rt)?;
                let quote = rt.intern("quote")?;
                Ok(rt.list(&[quote, datum])?)
            }
            _ => atom(rt, &token),
        }
    }

    /// Parse the remainder of a list after `(`, including dotted tails.
    fn parse_list(&mut self, rt: &mut Runtime) -> Result<Value, ReadError> {
        let mut items = Vec::new();
        let mut tail = Value::NIL;
        loop {
            let Some(token) = self.peek() else {
                return Err(self.eof_error());
            };
            match token.text.as_str() {
                ")" => {
                    self.next();
                    break;
                }
                "." => {
                    let Some(dot) = self.next() else {
                        return Err(self.eof_error());
                    };
                    if items.is_empty() {
                        return Err(ReadError::UnexpectedToken {
                            text: dot.text,
                            line: dot.line,
                            col: dot.col,
                        });
                    }
                    tail = self.parse_datum(rt)?;
                    match self.next() {
                        Some(t) if t.text == ")" => break,
                        Some(t) => {
                            return Err(ReadError::UnexpectedToken {
                                text: t.text,
                                line: t.line,
                                col: t.col,
                            });
                        }
                        None => return Err(self.eof_error()),
                    }
                }
                _ => items.push(self.parse_datum(rt)?),
            }
        }
        let mut out = tail;
        for item in items.into_iter().rev() {
            out = rt.cons(item, out)?;
        }
        Ok(out)
    }
}

fn atom(rt: &mut Runtime, token: &Token) -> Result<Value, ReadError> {
    let text = token.text.as_str();
    if let Some(rest) = text.strip_prefix('#') {
        return match rest {
            "t" => Ok(Value::TRUE),
            "f" => Ok(Value::FALSE),
            "inert" => Ok(Value::INERT),
            "ignore" => Ok(Value::IGNORE),
            "unit" => Ok(Value::UNIT),
            "undef" => Ok(Value::UNDEF),
            _ => Err(ReadError::BadLiteral {
                text: token.text.clone(),
                line: token.line,
                col: token.col,
            }),
        };
    }
    let mut digits = text.chars();
    let leading_sign = matches!(text.chars().next(), Some('+') | Some('-'));
    if leading_sign {
        digits.next();
    }
    let mut digits = digits.peekable();
    if digits.peek().is_some_and(|c| c.is_ascii_digit()) {
        let numeric = digits.all(|c| c.is_ascii_digit());
        if !numeric {
            return Err(ReadError::BadLiteral {
                text: token.text.clone(),
                line: token.line,
                col: token.col,
            });
        }
        return text.parse::<i64>().map(Value::from_int).map_err(|_| {
            ReadError::BadLiteral {
                text: token.text.clone(),
                line: token.line,
                col: token.col,
            }
        });
    }
    Ok(rt.intern(text)?)
}

/// Read the first datum of `source`. `Ok(None)` when the source holds
/// only whitespace and comments.
pub fn read(rt: &mut Runtime, source: &str) -> Result<Option<Value>, ReadError> {
    let mut parser = Parser {
        tokens: tokenize(source),
        pos: 0,
    };
    if parser.peek().is_none() {
        return Ok(None);
    }
    parser.parse_datum(rt).map(Some)
}

/// Read every datum of `source`, in order.
pub fn read_all(rt: &mut Runtime, source: &str) -> Result<Vec<Value>, ReadError> {
    let mut parser = Parser {
        tokens: tokenize(source),
        pos: 0,
    };
    let mut out = Vec::new();
    while parser.peek().is_some() {
        out.push(parser.parse_datum(rt)?);
    }
    Ok(out)
}
