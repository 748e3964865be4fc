// SPDX-License-Identifier: MIT

//! Expression tokenizer
//!
//! Turns source text into a flat token stream terminated by [`TokenKind::Eof`].
//! The deny-list is enforced here as well as during property access, so a
//! blocked name never reaches the parser.

use crate::adk::error::ExprError;
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Identifiers and property names that expressions may never resolve
pub static DENY_LIST: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "eval",
        "Function",
        "constructor",
        "__proto__",
        "prototype",
        "__defineGetter__",
        "__defineSetter__",
        "__lookupGetter__",
        "__lookupSetter__",
        "window",
        "document",
        "globalThis",
        "global",
        "self",
        "process",
        "require",
        "module",
        "exports",
        "import",
        "this",
        "arguments",
        "fetch",
        "XMLHttpRequest",
        "WebSocket",
        "setTimeout",
        "setInterval",
        "setImmediate",
        "Reflect",
        "Proxy",
        "Object",
        "localStorage",
        "sessionStorage",
        "indexedDB",
        "location",
        "navigator",
        "alert",
        "Buffer",
        "Deno",
    ]
    .into_iter()
    .collect()
});

/// Check a name against the deny-list
pub fn is_blocked(name: &str) -> bool {
    DENY_LIST.contains(name)
}

/// Token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    String,
    Boolean,
    Null,
    Undefined,
    Identifier,
    Operator,
    LParen,
    RParen,
    Eof,
}

/// Parsed payload of a token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Number(f64),
    Text(String),
    Bool(bool),
}

/// A single token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    /// Source text the token was read from
    pub raw: String,
    /// Byte offset of the token in the source
    pub position: usize,
}

impl Token {
    fn new(kind: TokenKind, value: TokenValue, raw: &str, position: usize) -> Self {
        Self {
            kind,
            value,
            raw: raw.to_string(),
            position,
        }
    }

    fn operator(symbol: &str, raw: &str, position: usize) -> Self {
        Self::new(
            TokenKind::Operator,
            TokenValue::Text(symbol.to_string()),
            raw,
            position,
        )
    }

    /// True if this is the given operator
    pub fn is_op(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Operator && self.value == TokenValue::Text(symbol.to_string())
    }

    /// Operator symbol, if this token is an operator
    pub fn op(&self) -> Option<&str> {
        match (&self.kind, &self.value) {
            (TokenKind::Operator, TokenValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

const THREE_CHAR_OPS: [&str; 2] = ["===", "!=="];
const TWO_CHAR_OPS: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];
const ONE_CHAR_OPS: [char; 9] = ['<', '>', '!', '+', '-', '*', '/', '%', '.'];

/// Tokenize an expression
pub fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_digit() {
            let mut end = pos;
            let mut seen_dot = false;
            while let Some(&(i, d)) = chars.peek() {
                if d.is_ascii_digit() {
                    end = i + 1;
                    chars.next();
                } else if d == '.' && !seen_dot && next_is_digit(source, i) {
                    seen_dot = true;
                    end = i + 1;
                    chars.next();
                } else {
                    break;
                }
            }
            let raw = &source[pos..end];
            let n = raw.parse::<f64>().unwrap_or(f64::NAN);
            tokens.push(Token::new(TokenKind::Number, TokenValue::Number(n), raw, pos));
            continue;
        }

        if c == '"' || c == '\'' {
            chars.next();
            let mut text = String::new();
            let mut closed = None;
            while let Some((i, ch)) = chars.next() {
                if ch == c {
                    closed = Some(i);
                    break;
                }
                if ch == '\\' {
                    match chars.next() {
                        Some((_, 'n')) => text.push('\n'),
                        Some((_, 't')) => text.push('\t'),
                        Some((_, 'r')) => text.push('\r'),
                        Some((_, other)) => text.push(other),
                        None => break,
                    }
                } else {
                    text.push(ch);
                }
            }
            let end = closed.ok_or(ExprError::UnterminatedString { position: pos })?;
            tokens.push(Token::new(
                TokenKind::String,
                TokenValue::Text(text),
                &source[pos..=end],
                pos,
            ));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let mut end = pos;
            while let Some(&(i, ch)) = chars.peek() {
                if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                    end = i + ch.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let word = &source[pos..end];
            tokens.push(keyword_or_identifier(word, pos)?);
            continue;
        }

        if c == '(' || c == ')' {
            chars.next();
            let kind = if c == '(' {
                TokenKind::LParen
            } else {
                TokenKind::RParen
            };
            tokens.push(Token::new(kind, TokenValue::None, &source[pos..pos + 1], pos));
            continue;
        }

        let rest = &source[pos..];
        if let Some(op) = THREE_CHAR_OPS.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(Token::operator(op, op, pos));
            advance(&mut chars, 3);
            continue;
        }
        if let Some(op) = TWO_CHAR_OPS.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(Token::operator(op, op, pos));
            advance(&mut chars, 2);
            continue;
        }
        if ONE_CHAR_OPS.contains(&c) {
            let raw = &source[pos..pos + 1];
            tokens.push(Token::operator(raw, raw, pos));
            chars.next();
            continue;
        }

        return Err(ExprError::UnexpectedCharacter { ch: c, position: pos });
    }

    tokens.push(Token::new(TokenKind::Eof, TokenValue::None, "", source.len()));
    Ok(tokens)
}

fn keyword_or_identifier(word: &str, pos: usize) -> Result<Token, ExprError> {
    let token = match word {
        "true" => Token::new(TokenKind::Boolean, TokenValue::Bool(true), word, pos),
        "false" => Token::new(TokenKind::Boolean, TokenValue::Bool(false), word, pos),
        "null" => Token::new(TokenKind::Null, TokenValue::None, word, pos),
        "undefined" => Token::new(TokenKind::Undefined, TokenValue::None, word, pos),
        "and" => Token::operator("&&", word, pos),
        "or" => Token::operator("||", word, pos),
        "not" => Token::operator("!", word, pos),
        _ if is_blocked(word) => return Err(ExprError::BlockedIdentifier(word.to_string())),
        _ => Token::new(
            TokenKind::Identifier,
            TokenValue::Text(word.to_string()),
            word,
            pos,
        ),
    };
    Ok(token)
}

fn next_is_digit(source: &str, dot_index: usize) -> bool {
    source[dot_index + 1..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
}

fn advance<I: Iterator>(iter: &mut I, n: usize) {
    for _ in 0..n {
        iter.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_numbers_and_operators() {
        let tokens = tokenize("2 + 3.5 * 4").unwrap();
        assert_eq!(tokens[0].value, TokenValue::Number(2.0));
        assert!(tokens[1].is_op("+"));
        assert_eq!(tokens[2].value, TokenValue::Number(3.5));
        assert_eq!(tokens[2].raw, "3.5");
        assert!(tokens[3].is_op("*"));
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_longest_operator_first() {
        let tokens = tokenize("a === b !== c == d <= e").unwrap();
        let ops: Vec<&str> = tokens.iter().filter_map(|t| t.op()).collect();
        assert_eq!(ops, vec!["===", "!==", "==", "<="]);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r#"'it\'s' "a\tb\n" 'q\z'"#).unwrap();
        assert_eq!(tokens[0].value, TokenValue::Text("it's".to_string()));
        assert_eq!(tokens[1].value, TokenValue::Text("a\tb\n".to_string()));
        assert_eq!(tokens[2].value, TokenValue::Text("qz".to_string()));
        assert_eq!(tokens[0].raw, r#"'it\'s'"#);
    }

    #[test]
    fn test_keywords_and_aliases() {
        assert_eq!(
            kinds("true false null undefined"),
            vec![
                TokenKind::Boolean,
                TokenKind::Boolean,
                TokenKind::Null,
                TokenKind::Undefined,
                TokenKind::Eof
            ]
        );
        let tokens = tokenize("a and not b or c").unwrap();
        let ops: Vec<&str> = tokens.iter().filter_map(|t| t.op()).collect();
        assert_eq!(ops, vec!["&&", "!", "||"]);
        assert_eq!(tokens[1].raw, "and");
    }

    #[test]
    fn test_property_access_tokens() {
        assert_eq!(
            kinds("user.name"),
            vec![
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("$ctx._x1"),
            vec![
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_blocked_identifiers() {
        for name in ["window", "constructor", "__proto__", "eval", "process", "document"] {
            let err = tokenize(&format!("x.{}", name)).unwrap_err();
            assert_eq!(err, ExprError::BlockedIdentifier(name.to_string()));
        }
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            tokenize("'open").unwrap_err(),
            ExprError::UnterminatedString { position: 0 }
        );
        assert_eq!(
            tokenize("a # b").unwrap_err(),
            ExprError::UnexpectedCharacter { ch: '#', position: 2 }
        );
        assert!(tokenize("a = b").is_err());
        assert!(tokenize("a[0]").is_err());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(kinds("   "), vec![TokenKind::Eof]);
    }
}
