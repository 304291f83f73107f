//! Arithmetic value expressions
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := NUMBER | 'value' | '(' expr ')'
//! ```
//!
//! `value` is bound to the raw attribute value. It is parsed lazily, so an
//! expression that never mentions it accepts any raw input.

use crate::error::ExpressionError;

use super::engine::{format_number, ExpressionEvaluator};

/// Recursive-descent evaluator over `f64`
#[derive(Debug, Default, Clone, Copy)]
pub struct ArithmeticEvaluator;

impl ArithmeticEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEvaluator for ArithmeticEvaluator {
    fn evaluate(&self, expression: &str, value: &str) -> Result<String, ExpressionError> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            raw: value,
        };
        let result = parser.expr()?;
        if parser.pos < tokens.len() {
            return Err(ExpressionError::UnexpectedChar {
                pos: tokens[parser.pos].offset,
                ch: tokens[parser.pos].first_char(),
            });
        }
        Ok(format_number(result))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Value,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

impl Token {
    fn first_char(&self) -> char {
        match self.kind {
            TokenKind::Number(_) => '0',
            TokenKind::Value => 'v',
            TokenKind::Plus => '+',
            TokenKind::Minus => '-',
            TokenKind::Star => '*',
            TokenKind::Slash => '/',
            TokenKind::Percent => '%',
            TokenKind::LParen => '(',
            TokenKind::RParen => ')',
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, ch) = chars[i];
        let single = match ch {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '%' => Some(TokenKind::Percent),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            _ => None,
        };
        if let Some(kind) = single {
            tokens.push(Token { kind, offset });
            i += 1;
            continue;
        }

        if ch.is_ascii_digit() || ch == '.' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            let literal: String = chars[start..i].iter().map(|(_, c)| c).collect();
            let number = literal
                .parse::<f64>()
                .map_err(|_| ExpressionError::InvalidNumber(literal.clone()))?;
            tokens.push(Token {
                kind: TokenKind::Number(number),
                offset,
            });
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().map(|(_, c)| c).collect();
            if ident != "value" {
                return Err(ExpressionError::UnknownIdentifier(ident));
            }
            tokens.push(Token {
                kind: TokenKind::Value,
                offset,
            });
            continue;
        }

        return Err(ExpressionError::UnexpectedChar { pos: offset, ch });
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    raw: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<&'a TokenKind> {
        let tokens = self.tokens;
        let token = tokens.get(self.pos).map(|t| &t.kind);
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<f64, ExpressionError> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(TokenKind::Plus) => {
                    self.pos += 1;
                    acc += self.term()?;
                }
                Some(TokenKind::Minus) => {
                    self.pos += 1;
                    acc -= self.term()?;
                }
                _ => return Ok(acc),
            }
        }
    }

    fn term(&mut self) -> Result<f64, ExpressionError> {
        let mut acc = self.unary()?;
        loop {
            match self.peek() {
                Some(TokenKind::Star) => {
                    self.pos += 1;
                    acc *= self.unary()?;
                }
                Some(TokenKind::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    acc /= rhs;
                }
                Some(TokenKind::Percent) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    acc %= rhs;
                }
                _ => return Ok(acc),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, ExpressionError> {
        match self.peek() {
            Some(TokenKind::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(TokenKind::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, ExpressionError> {
        let offset = self.tokens.get(self.pos).map(|t| t.offset);
        match self.next().cloned() {
            Some(TokenKind::Number(n)) => Ok(n),
            Some(TokenKind::Value) => {
                let raw = self.raw.trim();
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ExpressionError::NonNumericInput(self.raw.to_string()))
            }
            Some(TokenKind::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(TokenKind::RParen) => Ok(inner),
                    Some(_) => Err(ExpressionError::UnexpectedChar {
                        pos: self.tokens[self.pos - 1].offset,
                        ch: self.tokens[self.pos - 1].first_char(),
                    }),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Some(other) => Err(ExpressionError::UnexpectedChar {
                pos: offset.unwrap_or_default(),
                ch: Token {
                    kind: other,
                    offset: 0,
                }
                .first_char(),
            }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str, value: &str) -> Result<String, ExpressionError> {
        ArithmeticEvaluator::new().evaluate(expr, value)
    }

    #[test]
    fn test_identity_and_scaling() {
        assert_eq!(eval("value", "42").unwrap(), "42");
        assert_eq!(eval("value / 1024", "2048").unwrap(), "2");
        assert_eq!(eval("value * 100", "0.5").unwrap(), "50");
        assert_eq!(eval("value / 4", "10").unwrap(), "2.5");
    }

    #[test]
    fn test_precedence_and_parens() {
        assert_eq!(eval("1 + 2 * 3", "0").unwrap(), "7");
        assert_eq!(eval("(1 + 2) * 3", "0").unwrap(), "9");
        assert_eq!(eval("-value + 10", "4").unwrap(), "6");
        assert_eq!(eval("value % 7", "23").unwrap(), "2");
    }

    #[test]
    fn test_value_not_needed_without_reference() {
        assert_eq!(eval("2 * 21", "not-a-number").unwrap(), "42");
    }

    #[test]
    fn test_errors() {
        assert_eq!(eval("value / 0", "1"), Err(ExpressionError::DivisionByZero));
        assert_eq!(
            eval("value", "abc"),
            Err(ExpressionError::NonNumericInput("abc".to_string()))
        );
        assert_eq!(
            eval("foo + 1", "1"),
            Err(ExpressionError::UnknownIdentifier("foo".to_string()))
        );
        assert_eq!(eval("(value + 1", "1"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(eval("value +", "1"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(
            eval("value $ 2", "1"),
            Err(ExpressionError::UnexpectedChar { pos: 6, ch: '$' })
        );
        assert!(matches!(eval("1..2", "1"), Err(ExpressionError::InvalidNumber(_))));
        assert!(matches!(eval("value 2", "1"), Err(ExpressionError::UnexpectedChar { .. })));
    }
}
