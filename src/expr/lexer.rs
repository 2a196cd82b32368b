//! Tokenizer for the rule expression language.

use crate::{Error, Result};

/// A lexical token kind.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

/// A token with the byte offset it starts at.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

fn syntax(message: impl Into<String>, position: usize) -> Error {
    Error::Expression {
        message: message.into(),
        position,
    }
}

/// Splits `source` into tokens, terminated by [`TokenKind::Eof`].
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let two = bytes.get(pos + 1).copied();
        let kind = match c {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b'.' if !two.is_some_and(|d| d.is_ascii_digit()) => TokenKind::Dot,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'&' if two == Some(b'&') => {
                pos += 1;
                TokenKind::AndAnd
            }
            b'|' if two == Some(b'|') => {
                pos += 1;
                TokenKind::OrOr
            }
            b'=' if two == Some(b'=') => {
                pos += 1;
                TokenKind::EqEq
            }
            b'!' if two == Some(b'=') => {
                pos += 1;
                TokenKind::NotEq
            }
            b'!' => TokenKind::Bang,
            b'<' if two == Some(b'=') => {
                pos += 1;
                TokenKind::Le
            }
            b'<' => TokenKind::Lt,
            b'>' if two == Some(b'=') => {
                pos += 1;
                TokenKind::Ge
            }
            b'>' => TokenKind::Gt,
            b'"' | b'\'' => {
                let (text, end) = lex_string(source, pos)?;
                tokens.push(Token {
                    kind: TokenKind::Str(text),
                    position: start,
                });
                pos = end;
                continue;
            }
            b'0'..=b'9' | b'.' => {
                let (kind, end) = lex_number(source, pos)?;
                tokens.push(Token {
                    kind,
                    position: start,
                });
                pos = end;
                continue;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let end = bytes[pos..]
                    .iter()
                    .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))
                    .map_or(bytes.len(), |off| pos + off);
                tokens.push(Token {
                    kind: TokenKind::Ident(source[pos..end].to_string()),
                    position: start,
                });
                pos = end;
                continue;
            }
            _ => {
                let shown = source[pos..].chars().next().unwrap_or('?');
                return Err(syntax(format!("unexpected character '{shown}'"), pos));
            }
        };

        tokens.push(Token {
            kind,
            position: start,
        });
        pos += 1;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: source.len(),
    });
    Ok(tokens)
}

fn lex_string(source: &str, start: usize) -> Result<(String, usize)> {
    let quote = source.as_bytes()[start] as char;
    let mut text = String::new();
    let mut chars = source[start + 1..].char_indices();

    while let Some((off, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((text, start + 1 + off + 1)),
            '\\' => {
                let Some((esc_off, esc)) = chars.next() else {
                    break;
                };
                text.push(match esc {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    '\\' | '"' | '\'' => esc,
                    other => {
                        return Err(syntax(
                            format!("unknown escape sequence '\\{other}'"),
                            start + 1 + esc_off,
                        ))
                    }
                });
            }
            c => text.push(c),
        }
    }

    Err(syntax("unterminated string literal", start))
}

fn lex_number(source: &str, start: usize) -> Result<(TokenKind, usize)> {
    let bytes = source.as_bytes();
    let mut end = start;
    let mut is_float = false;

    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' | b'_' => end += 1,
            b'.' if !is_float && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) => {
                is_float = true;
                end += 1;
            }
            b'e' | b'E' if end > start => {
                is_float = true;
                end += 1;
                if matches!(bytes.get(end), Some(b'+' | b'-')) {
                    end += 1;
                }
            }
            _ => break,
        }
    }

    let digits = source[start..end].replace('_', "");
    let kind = if is_float {
        digits
            .parse::<f64>()
            .map(TokenKind::Float)
            .map_err(|_| syntax(format!("invalid number '{digits}'"), start))?
    } else {
        digits
            .parse::<i64>()
            .map(TokenKind::Int)
            .map_err(|_| syntax(format!("integer '{digits}' is out of range"), start))?
    };

    // Host-style suffixes: 10L, 2.5f, 2.5d
    match (bytes.get(end), &kind) {
        (Some(b'L' | b'l'), TokenKind::Int(_)) => end += 1,
        (Some(b'f' | b'F' | b'd' | b'D'), _) => {
            end += 1;
            if let TokenKind::Int(v) = kind {
                #[allow(clippy::cast_precision_loss)]
                return Ok((TokenKind::Float(v as f64), end));
            }
        }
        _ => {}
    }

    if bytes
        .get(end)
        .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_')
    {
        return Err(syntax("invalid suffix on numeric literal", end));
    }
    Ok((kind, end))
}
