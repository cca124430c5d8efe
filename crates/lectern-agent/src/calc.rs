//! Whitelist arithmetic evaluator for the calculator tool.
//!
//! A hand-written recursive-descent parser over a fixed grammar: numbers,
//! `+ - * / % ^`, parentheses, unary minus, the functions
//! `sqrt sin cos tan log exp abs`, and the constants `pi` and `e`.
//! Anything outside that grammar is a parse error. There is no fallback to
//! a general-purpose evaluator; the whitelist is the security boundary.

use thiserror::Error;

/// Evaluation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    /// Unexpected character or token in the expression.
    #[error("unexpected input at position {position}: {found}")]
    Unexpected {
        /// Byte offset of the offending token.
        position: usize,
        /// What was found there.
        found: String,
    },

    /// An identifier that is neither a whitelisted function nor constant.
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    /// The expression ended before it was complete.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// Result is not a finite number (division by zero, log of a negative).
    #[error("expression did not evaluate to a finite number")]
    NotFinite,
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expression()?;
    parser.expect_end()?;

    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalcError::NotFinite)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokenizer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_digit() || bytes[i] == b'.')
                {
                    i += 1;
                }
                let text = &input[start..i];
                let value = text.parse::<f64>().map_err(|_| CalcError::Unexpected {
                    position: start,
                    found: text.to_string(),
                })?;
                tokens.push(Token::Number(value));
            }
            'a'..='z' | 'A'..='Z' => {
                let start = i;
                while i < bytes.len() && (bytes[i] as char).is_ascii_alphabetic() {
                    i += 1;
                }
                tokens.push(Token::Ident(input[start..i].to_ascii_lowercase()));
            }
            other => {
                return Err(CalcError::Unexpected {
                    position: i,
                    found: other.to_string(),
                });
            }
        }
    }

    Ok(tokens)
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_end(&self) -> Result<(), CalcError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(CalcError::Unexpected {
                position: self.pos,
                found: format!("{token:?}"),
            }),
        }
    }

    /// expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    /// term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    value /= self.unary()?;
                }
                Some(Token::Percent) => {
                    self.advance();
                    value %= self.unary()?;
                }
                _ => return Ok(value),
            }
        }
    }

    /// unary := '-' unary | power
    ///
    /// `^` binds tighter than unary minus, so `-2^2 == -(2^2)`.
    fn unary(&mut self) -> Result<f64, CalcError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            return Ok(-self.unary()?);
        }
        self.power()
    }

    /// power := atom ('^' unary)?   (right-associative)
    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.atom()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    /// atom := number | constant | function '(' expression ')' | '(' expression ')'
    fn atom(&mut self) -> Result<f64, CalcError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expression()?;
                self.expect_rparen()?;
                Ok(value)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "pi" => Ok(std::f64::consts::PI),
                "e" => Ok(std::f64::consts::E),
                "sqrt" | "sin" | "cos" | "tan" | "log" | "exp" | "abs" => {
                    if !matches!(self.advance(), Some(Token::LParen)) {
                        return Err(CalcError::Unexpected {
                            position: self.pos,
                            found: format!("expected '(' after {name}"),
                        });
                    }
                    let arg = self.expression()?;
                    self.expect_rparen()?;
                    Ok(apply_function(&name, arg))
                }
                _ => Err(CalcError::UnknownIdentifier(name)),
            },
            Some(token) => Err(CalcError::Unexpected {
                position: self.pos,
                found: format!("{token:?}"),
            }),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), CalcError> {
        match self.advance() {
            Some(Token::RParen) => Ok(()),
            Some(token) => Err(CalcError::Unexpected {
                position: self.pos,
                found: format!("{token:?}"),
            }),
            None => Err(CalcError::UnexpectedEnd),
        }
    }
}

fn apply_function(name: &str, arg: f64) -> f64 {
    match name {
        "sqrt" => arg.sqrt(),
        "sin" => arg.sin(),
        "cos" => arg.cos(),
        "tan" => arg.tan(),
        "log" => arg.ln(),
        "exp" => arg.exp(),
        "abs" => arg.abs(),
        _ => unreachable!("caller whitelists function names"),
    }
}
